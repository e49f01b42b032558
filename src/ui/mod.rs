//! UI Module - the terminal the chat loop talks to.
//!
//! The chat loop never prints directly; it goes through the `Terminal`
//! trait so the console implementation can own styling and the typewriter
//! effect, and tests can script input and record output.

pub mod console;

use async_trait::async_trait;

use crate::types::ProviderIdentity;

/// One read from the user.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Line(String),
    /// End of input (Ctrl-D or a closed stdin).
    Eof,
    /// Ctrl-C at the prompt.
    Interrupted,
}

/// What the greeting shows when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Banner {
    pub name: String,
    pub provider: ProviderIdentity,
    /// `(shortcut, provider)` pairs for the available providers only.
    pub shortcuts: Vec<(String, ProviderIdentity)>,
}

#[async_trait(?Send)]
pub trait Terminal {
    fn read_line(&mut self) -> InputEvent;

    fn write_banner(&mut self, banner: &Banner);

    /// Start an assistant reply with its speaker label.
    fn begin_reply(&mut self, label: &str);

    /// Render one streamed fragment of the current reply.
    async fn write_fragment(&mut self, text: &str);

    fn end_reply(&mut self);

    /// Something the user should know about but that is not a failure.
    fn write_notice(&mut self, text: &str);

    fn write_error(&mut self, text: &str);

    /// Plain informational output (command results, goodbye).
    fn write_info(&mut self, text: &str);
}
