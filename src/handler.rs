use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::App;
use crate::backend::ChatTransport;
use crate::tui::AppEvent;

const WHEEL_LINES: u16 = 3;

pub fn handle_event<T: ChatTransport + 'static>(app: &mut App<T>, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {
            if app.follow {
                app.scroll_to_bottom();
            }
        }
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Session(event) => app.apply_session_event(event),
    }
}

fn handle_key<T: ChatTransport + 'static>(app: &mut App<T>, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter => app.submit_input(),

        // Editing
        KeyCode::Backspace => app.backspace(),
        KeyCode::Delete => app.delete(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),

        // Conversation scrolling
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.page_up(),
        KeyCode::PageDown => app.page_down(),

        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => app.insert_char(c),
        _ => {}
    }
}

fn handle_mouse<T: ChatTransport + 'static>(app: &mut App<T>, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(WHEEL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(WHEEL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::testing::MockTransport;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[tokio::test]
    async fn test_typing_and_enter_submits() {
        let mock = MockTransport::new();
        let (session, _rx) = Session::new(mock.clone());
        let mut app = App::new(session, "http://localhost:8000");

        for c in "hi".chars() {
            handle_event(&mut app, key(KeyCode::Char(c)));
        }
        assert_eq!(app.input, "hi");

        handle_event(&mut app, key(KeyCode::Enter));
        assert!(app.input.is_empty());
        assert_eq!(app.session.messages().len(), 1);
        assert!(app.session.is_busy());
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_without_typing() {
        let mock = MockTransport::new();
        let (session, _rx) = Session::new(mock);
        let mut app = App::new(session, "http://localhost:8000");

        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
        assert!(app.input.is_empty());
    }

    #[tokio::test]
    async fn test_session_event_routed_to_session() {
        let mock = MockTransport::new();
        let (session, mut rx) = Session::new(mock);
        let mut app = App::new(session, "http://localhost:8000");

        let probe = rx.recv().await.unwrap();
        handle_event(&mut app, AppEvent::Session(probe));
        assert_eq!(app.session.status(), crate::session::Status::Ready);
    }
}
