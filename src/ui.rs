use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
};
use crate::app::App;
use crate::backend::ChatTransport;
use crate::session::{ChatMessage, ChatRole, Status};

pub fn render<T: ChatTransport + 'static>(app: &mut App<T>, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Ready => Style::default().fg(Color::Black).bg(Color::Green),
        Status::Warming => Style::default().fg(Color::Black).bg(Color::Yellow),
        Status::Idle => Style::default().fg(Color::White).bg(Color::Red),
    }
}

fn render_header<T: ChatTransport + 'static>(app: &App<T>, frame: &mut Frame, area: Rect) {
    let status = app.session.status();

    let title = Line::from(vec![
        Span::styled(" Relay Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(app.backend_url.clone(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(format!(" {} ", status.as_str()), status_style(status)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Display width of a string in terminal columns
fn display_width(s: &str) -> usize {
    Span::raw(s).width()
}

/// Wrap text to fit within a given width, returning multiple lines.
/// Breaks at word boundaries; a word wider than the pane is split across rows.
pub fn wrap_text_to_width(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = display_width(word);

        if word_len > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            for c in word.chars() {
                let mut buf = [0u8; 4];
                let char_len = display_width(c.encode_utf8(&mut buf));
                if current_len > 0 && current_len + char_len > width {
                    lines.push(std::mem::take(&mut current_line));
                    current_len = 0;
                }
                current_line.push(c);
                current_len += char_len;
            }
        } else if current_len == 0 {
            current_line = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
            current_len = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Every row of the conversation pane, wrapped to `width` columns.
pub fn conversation_lines(
    messages: &[ChatMessage],
    busy: bool,
    animation_frame: u8,
    width: usize,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in messages {
        let (label, color) = match msg.role {
            ChatRole::User => ("You:", Color::Cyan),
            ChatRole::Assistant => ("AI:", Color::Yellow),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for line in msg.text.lines() {
            lines.extend(wrap_text_to_width(line, width).into_iter().map(Line::from));
        }
        lines.push(Line::default());
    }

    if busy {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat<T: ChatTransport + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow {
        app.scroll_to_bottom();
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Conversation ");

    let busy = app.session.is_busy();
    let text = if app.session.messages().is_empty() && !busy {
        Text::from(Span::styled(
            "Type a message and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(conversation_lines(
            app.session.messages(),
            busy,
            app.animation_frame,
            app.chat_width as usize,
        ))
    };

    // Lines are pre-wrapped so the scroll range in App matches what is drawn
    let chat = Paragraph::new(text)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input<T: ChatTransport + 'static>(app: &App<T>, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Message ");

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    let cursor_x = (app.cursor - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_footer(frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = Line::from(vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" ↑/↓ ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" page ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(hints).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
