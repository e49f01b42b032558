//! Command line interface.

use clap::{Parser, Subcommand};

use crate::types::ProviderIdentity;

/// Jarvis - one terminal chat for OpenAI, Anthropic and Gemini
#[derive(Parser, Debug)]
#[command(name = "jarvis", version)]
#[command(about = "Chat with OpenAI, Anthropic and Gemini from one terminal", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Enter API keys, the default provider and model settings
    Setup,
    /// Start a conversation (the default when no command is given)
    Chat {
        /// Provider for messages without a shortcut (openai, anthropic, gemini)
        #[arg(long, short)]
        provider: Option<ProviderIdentity>,
    },
}

impl Cli {
    /// The command to run; bare `jarvis` starts a chat.
    pub fn command(&self) -> Command {
        match &self.command {
            Some(Command::Setup) => Command::Setup,
            Some(Command::Chat { provider }) => Command::Chat {
                provider: *provider,
            },
            None => Command::Chat { provider: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_invocation_chats() {
        let cli = Cli::try_parse_from(["jarvis"]).unwrap();
        assert_eq!(cli.command(), Command::Chat { provider: None });
    }

    #[test]
    fn test_provider_flag_accepts_aliases() {
        let cli = Cli::try_parse_from(["jarvis", "chat", "--provider", "claude"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Chat {
                provider: Some(ProviderIdentity::Anthropic)
            }
        );
        assert!(Cli::try_parse_from(["jarvis", "chat", "-p", "llama"]).is_err());
    }

    #[test]
    fn test_setup_subcommand() {
        let cli = Cli::try_parse_from(["jarvis", "setup"]).unwrap();
        assert_eq!(cli.command(), Command::Setup);
    }
}
