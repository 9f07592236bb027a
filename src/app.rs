use crate::backend::ChatTransport;
use crate::session::{Session, SessionEvent};
use crate::ui;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App<T: ChatTransport + 'static> {
    pub should_quit: bool,
    pub session: Session<T>,
    pub backend_url: String,

    // Pending input
    pub input: String,
    pub cursor: usize, // char index into input

    // Conversation view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, set during render
    pub chat_width: u16,  // inner width, set during render
    /// Keep the newest message in view as the log grows.
    pub follow: bool,

    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl<T: ChatTransport + 'static> App<T> {
    pub fn new(session: Session<T>, backend_url: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            session,
            backend_url: backend_url.into(),
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow: true,
            animation_frame: 0,
        }
    }

    /// Send the pending input. The buffer is only cleared when the session
    /// accepted it; a blank buffer stays as typed.
    pub fn submit_input(&mut self) {
        if self.session.submit(&self.input).is_some() {
            self.input.clear();
            self.cursor = 0;
            self.follow = true;
            self.scroll_to_bottom();
        }
    }

    pub fn apply_session_event(&mut self, event: SessionEvent) {
        self.session.apply(event);
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Conversation scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
        self.follow = self.chat_scroll >= max;
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.page_size());
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.page_size());
    }

    fn page_size(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 { self.chat_height } else { 20 }
    }

    fn max_scroll(&self) -> u16 {
        self.total_chat_lines().saturating_sub(self.visible_height())
    }

    /// Rendered row count of the conversation, using the same wrapping as
    /// `ui::render_chat`.
    pub fn total_chat_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };
        let rows = ui::conversation_lines(
            self.session.messages(),
            self.session.is_busy(),
            self.animation_frame,
            wrap_width,
        )
        .len();
        rows.min(u16::MAX as usize) as u16
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}
