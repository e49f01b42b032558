//! The session transcript: every committed turn, in conversational order.

use crate::types::{Role, Turn};

/// Append-only conversation history for one chat session.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The full history, oldest first.
    pub fn as_context(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent `max_exchanges` user/assistant exchanges.
    ///
    /// The window always starts on a user turn, since Anthropic and Gemini
    /// reject conversations that open with an assistant message.
    /// `0` means no limit.
    pub fn window(&self, max_exchanges: usize) -> &[Turn] {
        if max_exchanges == 0 {
            return &self.turns;
        }

        let mut users_seen = 0;
        let mut start = 0;
        for (i, turn) in self.turns.iter().enumerate().rev() {
            if turn.role() == Role::User {
                users_seen += 1;
                start = i;
                if users_seen == max_exchanges {
                    break;
                }
            }
        }
        if users_seen == 0 {
            return &self.turns[self.turns.len()..];
        }
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Forget the conversation (`/clear`).
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
