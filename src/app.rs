use std::collections::BTreeMap;

use serde_json::Value;

use crate::client::{ChatClient, ChatReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Error,
}

/// One entry in the chat history. Append-only; insertion order is display
/// order.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub sources: Option<BTreeMap<String, Value>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sources: Option<BTreeMap<String, Value>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: Role::Error,
            content: content.into(),
            sources: None,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Chat state
    pub messages: Vec<Message>,
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars
    pub loading: bool,
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat pane, set during render
    pub chat_width: u16,  // inner width, for wrap estimates

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // In-flight request (at most one)
    pub query_task: Option<tokio::task::JoinHandle<anyhow::Result<ChatReply>>>,

    // None when no bearer token could be resolved
    pub client: Option<ChatClient>,
}

impl App {
    pub fn new(client: Option<ChatClient>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            messages: Vec::new(),
            input: String::new(),
            cursor: 0,
            loading: false,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            query_task: None,
            client,
        }
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Resolve a finished in-flight request into a chat message. No-op while
    /// the task is still running.
    pub async fn poll_reply(&mut self) {
        let finished = self
            .query_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(task) = self.query_task.take() {
            self.loading = false;
            match task.await {
                Ok(Ok(reply)) => {
                    self.push_message(Message::assistant(reply.content, reply.sources));
                }
                Ok(Err(e)) => {
                    self.push_message(Message::error(format!("{e:#}")));
                }
                Err(e) => {
                    self.push_message(Message::error(format!("Request task failed: {e}")));
                }
            }
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    /// Scroll the chat pane so the newest message (or the "Thinking..."
    /// indicator) is visible. Line counts are a wrap estimate from the pane
    /// width; the renderer clamps the rest.
    pub fn scroll_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // Role label line
            for line in msg.content.lines() {
                // Character count, not byte length, for UTF-8 content
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            if let Some(sources) = &msg.sources {
                total_lines += 1 + sources.len() as u16;
            }
            total_lines += 1; // Blank line after message
        }

        if self.loading {
            total_lines += 2; // Label + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_insertion_order() {
        let mut app = App::new(None);
        app.push_message(Message::user("what is the excess?"));
        app.push_message(Message::assistant("Normal claims: 5% of claim", None));
        app.push_message(Message::error("connection reset"));

        let roles: Vec<Role> = app.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Error]);
    }

    #[test]
    fn animation_only_advances_while_loading() {
        let mut app = App::new(None);
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.loading = true;
        app.tick_animation();
        app.tick_animation();
        app.tick_animation();
        app.tick_animation();
        assert_eq!(app.animation_frame, 1); // wrapped past 2
    }

    #[test]
    fn scroll_to_bottom_accounts_for_wrapping() {
        let mut app = App::new(None);
        app.chat_width = 10;
        app.chat_height = 5;
        // 25 chars wrap to 3 lines at width 10, plus label and trailing blank.
        app.push_message(Message::user("a".repeat(25)));
        app.push_message(Message::user("b".repeat(25)));

        app.scroll_to_bottom();
        // 2 * (1 + 3 + 1) = 10 total lines, 5 visible
        assert_eq!(app.chat_scroll, 5);
    }

    #[test]
    fn short_history_does_not_scroll() {
        let mut app = App::new(None);
        app.chat_width = 40;
        app.chat_height = 20;
        app.push_message(Message::user("hi"));
        app.scroll_to_bottom();
        assert_eq!(app.chat_scroll, 0);
    }
}
