mod chat;
mod cli;
mod config;
mod error;
mod llm;
mod logging;
mod router;
mod setup;
mod transcript;
mod types;
mod ui;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Instrument};

use chat::{ChatSession, CtrlC};
use cli::{Cli, Command};
use config::{AppConfig, ConfigStore};
use llm::Providers;
use types::ProviderIdentity;
use ui::console::ConsoleTerminal;

async fn chat(provider: Option<ProviderIdentity>) -> Result<()> {
    let mut config = AppConfig::load()?;

    if config.available_providers().is_empty() {
        bail!(
            "No providers configured. Run 'jarvis setup' or set one of \
             OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY."
        );
    }

    if let Some(identity) = provider {
        if config.is_available(identity) {
            config.default_provider = Some(identity);
        } else {
            eprintln!(
                "{} has no API key configured; ignoring --provider.",
                identity
            );
        }
    }

    let terminal = ConsoleTerminal::new(&config.ui)?;
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    let span = tracing::info_span!("session", id = %&session_id[..8]);

    let mut session = ChatSession::new(config, Providers::http(), terminal, CtrlC);
    session.run().instrument(span).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging is best effort: a read-only home must not stop the chat.
    match logging::init() {
        Ok(path) => info!(log = %path.display(), "jarvis {} starting", env!("CARGO_PKG_VERSION")),
        Err(e) => eprintln!("[Log] {:#}", e),
    }

    match cli.command() {
        Command::Setup => {
            let mut prompter = setup::ConsolePrompter::new()?;
            let path = AppConfig::config_path()?;
            setup::run(&path, &mut prompter)?;
        }
        Command::Chat { provider } => chat(provider).await?,
    }
    Ok(())
}
