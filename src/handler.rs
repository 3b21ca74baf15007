use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, InputMode, Message};
use crate::config::TOKEN_ENV_VAR;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Works in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,

        // Back to the input box
        KeyCode::Char('i') | KeyCode::Char('/') | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
            app.cursor = app.input.chars().count();
        }

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => submit_query(app),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Send the typed query. Ignored while a request is already in flight, so a
/// second Enter cannot overlap requests.
fn submit_query(app: &mut App) {
    if app.input.is_empty() || app.query_task.is_some() {
        return;
    }

    let client = match &app.client {
        Some(client) => client.clone(),
        None => {
            app.push_message(Message::error(format!(
                "No API token configured. Set {} or add api_token to the config file.",
                TOKEN_ENV_VAR
            )));
            app.scroll_to_bottom();
            return;
        }
    };

    let query = std::mem::take(&mut app.input);
    app.cursor = 0;
    app.push_message(Message::user(query.clone()));
    app.loading = true;

    // Scroll so "Thinking..." is visible
    app.scroll_to_bottom();

    app.query_task = Some(tokio::spawn(async move { client.ask(&query).await }));
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Role;
    use crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn typing_inserts_at_cursor_utf8() {
        let mut app = App::new(None);
        for c in "prémium".chars() {
            handle_editing_mode(&mut app, key(KeyCode::Char(c)));
        }
        handle_editing_mode(&mut app, key(KeyCode::Home));
        handle_editing_mode(&mut app, key(KeyCode::Right));
        handle_editing_mode(&mut app, key(KeyCode::Char('x')));
        assert_eq!(app.input, "pxrémium");
        assert_eq!(app.cursor, 2);
    }

    #[test]
    fn backspace_removes_multibyte_char() {
        let mut app = App::new(None);
        app.input = "é".to_string();
        app.cursor = 1;
        handle_editing_mode(&mut app, key(KeyCode::Backspace));
        assert_eq!(app.input, "");
        assert_eq!(app.cursor, 0);
    }

    #[test]
    fn submit_without_token_reports_error_in_band() {
        let mut app = App::new(None);
        app.input = "what is covered?".to_string();
        submit_query(&mut app);

        assert_eq!(app.messages.len(), 1);
        assert_eq!(app.messages[0].role, Role::Error);
        // Input preserved so the user can retry after configuring a token
        assert_eq!(app.input, "what is covered?");
    }

    #[tokio::test]
    async fn submit_while_request_in_flight_is_ignored() {
        use crate::client::ChatReply;

        let mut app = App::new(None);
        app.input = "second question".to_string();
        app.query_task = Some(tokio::spawn(async {
            Ok(ChatReply {
                content: String::new(),
                sources: None,
            })
        }));

        submit_query(&mut app);
        assert!(app.messages.is_empty());
        assert_eq!(app.input, "second question");
    }

    #[test]
    fn empty_input_does_not_submit() {
        let mut app = App::new(None);
        submit_query(&mut app);
        assert!(app.messages.is_empty());
        assert!(!app.loading);
    }
}
