//! Chat Loop - the core of the assistant.
//!
//! The session reads a line, routes it to a provider, streams the reply to
//! the terminal, and commits the exchange to the transcript:
//!
//! ```text
//! AwaitingInput --line--> Dispatching --stream--> Streaming --done--> Rendering
//!      ^                      |                       |                  |
//!      +------ error ---------+------ error/Ctrl-C ---+------------------+
//! ```
//!
//! A turn is committed only when its reply streamed to the end: the user
//! turn and the assistant turn are appended together, so a failed or
//! interrupted request leaves the transcript exactly as it was.

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tracing::{debug, error, info};

use crate::config::{AppConfig, ConfigStore};
use crate::error::ChatError;
use crate::llm::{CompletionRequest, Fragment, Providers};
use crate::router::{self, SHORTCUTS};
use crate::transcript::Transcript;
use crate::types::{ProviderIdentity, Turn};
use crate::ui::{Banner, InputEvent, Terminal};

/// Where the session is in its read/dispatch/stream cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    AwaitingInput,
    Dispatching,
    Streaming,
    Rendering,
    Exited,
}

/// How one routed line ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The reply streamed to completion and the exchange was committed.
    Completed {
        identity: ProviderIdentity,
        reply: String,
    },
    /// Nothing was sent (empty message after a shortcut, or an empty reply).
    Skipped,
    /// Routing or the provider failed; the error was shown to the user.
    Failed(ChatError),
    /// Ctrl-C arrived while waiting for the reply; partial text was dropped.
    Interrupted,
}

/// Source of the signal that cancels an in-flight reply.
pub trait Interrupts {
    /// A future that resolves on the next interrupt.
    fn wait(&mut self) -> BoxFuture<'static, ()>;
}

/// Interrupts delivered as SIGINT / Ctrl-C.
pub struct CtrlC;

impl Interrupts for CtrlC {
    fn wait(&mut self) -> BoxFuture<'static, ()> {
        Box::pin(async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available: never interrupt.
                std::future::pending::<()>().await;
            }
        })
    }
}

enum Flow {
    Continue,
    Exit,
}

const HELP: &str = "\
Prefix a message with a shortcut to pick the provider for that message:
  o: OpenAI    c: Anthropic    g: Gemini
Commands:
  /clear       forget the conversation so far
  /history     show the conversation so far
  /providers   show which providers are configured
  /help        show this help
  exit, quit   leave (Ctrl-C while a reply streams cancels just that reply)";

/// One interactive conversation.
pub struct ChatSession<T: Terminal, I: Interrupts> {
    config: AppConfig,
    providers: Providers,
    transcript: Transcript,
    terminal: T,
    interrupts: I,
    state: ChatState,
}

impl<T: Terminal, I: Interrupts> ChatSession<T, I> {
    pub fn new(config: AppConfig, providers: Providers, terminal: T, interrupts: I) -> Self {
        Self {
            config,
            providers,
            transcript: Transcript::new(),
            terminal,
            interrupts,
            state: ChatState::Idle,
        }
    }

    /// Run until the user leaves.
    pub async fn run(&mut self) {
        if let Some(banner) = self.banner() {
            self.terminal.write_banner(&banner);
        }
        info!("chat session started");

        loop {
            self.state = ChatState::AwaitingInput;
            let flow = match self.terminal.read_line() {
                InputEvent::Line(line) => self.handle_line(&line).await,
                InputEvent::Eof | InputEvent::Interrupted => Flow::Exit,
            };
            if let Flow::Exit = flow {
                break;
            }
        }

        self.state = ChatState::Exited;
        info!(turns = self.transcript.len(), "chat session ended");
        let farewell = format!(
            "{} shutting down. Have a great day!",
            self.config.personality.name
        );
        self.terminal.write_notice(&farewell);
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let input = line.trim();
        if input.is_empty() {
            return Flow::Continue;
        }
        match input.to_lowercase().as_str() {
            "quit" | "exit" | "/quit" | "/exit" => return Flow::Exit,
            "/clear" => {
                self.transcript.clear();
                self.terminal.write_info("[Conversation cleared]");
                return Flow::Continue;
            }
            "/history" => {
                self.show_history();
                return Flow::Continue;
            }
            "/providers" => {
                self.show_providers();
                return Flow::Continue;
            }
            "/help" => {
                self.terminal.write_info(HELP);
                return Flow::Continue;
            }
            _ => {}
        }
        if input.starts_with('/') && !input.contains(char::is_whitespace) {
            self.terminal
                .write_error(&format!("Unknown command {}; try /help", input));
            return Flow::Continue;
        }

        match self.run_turn(input).await {
            TurnOutcome::Completed { identity, reply } => info!(
                provider = %identity,
                chars = reply.len(),
                turns = self.transcript.len(),
                "turn completed"
            ),
            TurnOutcome::Failed(err) => debug!(error = ?err, "turn abandoned"),
            TurnOutcome::Skipped | TurnOutcome::Interrupted => {}
        }
        Flow::Continue
    }

    /// Route, call and stream one message.
    pub async fn run_turn(&mut self, input: &str) -> TurnOutcome {
        self.state = ChatState::Dispatching;
        let selection = match router::select(input, &self.config) {
            Ok(selection) => selection,
            Err(e) => return self.fail(e),
        };
        if let Some(notice) = &selection.fallback_notice {
            self.terminal.write_notice(notice);
        }
        if selection.line.is_empty() {
            return TurnOutcome::Skipped;
        }

        let identity = selection.identity;
        let Some(provider_config) = self.config.provider_config(identity) else {
            return self.fail(ChatError::NoProviderAvailable);
        };
        let provider = self.providers.get(identity);
        debug!(provider = %provider.identity(), model = %provider_config.model, "dispatching turn");

        let user_turn = Turn::user(selection.line);
        let mut context = self
            .transcript
            .window(self.config.history.max_exchanges)
            .to_vec();
        context.push(user_turn.clone());

        let label = self.reply_label(identity);
        self.terminal.begin_reply(&label);

        let mut interrupt = self.interrupts.wait();
        let request = CompletionRequest {
            turns: &context,
            system_prompt: &self.config.personality.system_prompt,
            config: &provider_config,
        };
        let started = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            result = provider.complete(request) => Some(result),
        };
        let mut stream = match started {
            None => return self.interrupted(),
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                self.terminal.end_reply();
                return self.fail(e.into_chat_error(identity));
            }
        };

        self.state = ChatState::Streaming;
        let mut reply = String::new();
        let mut notices = Vec::new();
        let mut fragments = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = &mut interrupt => None,
                item = stream.next() => Some(item),
            };
            match next {
                None => return self.interrupted(),
                Some(None) => break,
                Some(Some(Ok(Fragment::Notice(notice)))) => notices.push(notice),
                Some(Some(Ok(Fragment::Text(text)))) => {
                    let shown = tokio::select! {
                        biased;
                        _ = &mut interrupt => false,
                        _ = self.terminal.write_fragment(&text) => true,
                    };
                    if !shown {
                        return self.interrupted();
                    }
                    fragments += 1;
                    reply.push_str(&text);
                }
                Some(Some(Err(e))) => {
                    self.terminal.end_reply();
                    return self.fail(e.into_chat_error(identity));
                }
            }
        }
        drop(stream);

        self.state = ChatState::Rendering;
        self.terminal.end_reply();
        for notice in &notices {
            self.terminal.write_notice(notice);
        }
        if reply.trim().is_empty() {
            self.terminal
                .write_notice(&format!("{} returned an empty reply.", identity));
            return TurnOutcome::Skipped;
        }

        self.transcript.append(user_turn);
        self.transcript.append(Turn::assistant(identity, reply.clone()));
        debug!(fragments, "reply committed");
        TurnOutcome::Completed { identity, reply }
    }

    fn fail(&mut self, err: ChatError) -> TurnOutcome {
        error!("turn failed: {}", err);
        self.terminal.write_error(&err.to_string());
        TurnOutcome::Failed(err)
    }

    fn interrupted(&mut self) -> TurnOutcome {
        info!("reply interrupted; partial text discarded");
        self.terminal.end_reply();
        self.terminal.write_notice("Interrupted.");
        TurnOutcome::Interrupted
    }

    /// The provider a plain message goes to, if any is available.
    fn session_provider(&self) -> Option<ProviderIdentity> {
        let available = self.config.available_providers();
        match self.config.default_provider() {
            Some(default) if available.contains(&default) => Some(default),
            _ => available.first().copied(),
        }
    }

    /// `Jarvis` for the session provider, `Jarvis (Gemini)` for any other.
    fn reply_label(&self, identity: ProviderIdentity) -> String {
        let name = &self.config.personality.name;
        if self.session_provider() == Some(identity) {
            name.clone()
        } else {
            format!("{} ({})", name, identity)
        }
    }

    fn banner(&self) -> Option<Banner> {
        let provider = self.session_provider()?;
        let shortcuts = SHORTCUTS
            .iter()
            .filter_map(|(letter, target)| {
                let identity: ProviderIdentity = target.parse().ok()?;
                self.config
                    .is_available(identity)
                    .then(|| (letter.to_string(), identity))
            })
            .collect();
        Some(Banner {
            name: self.config.personality.name.clone(),
            provider,
            shortcuts,
        })
    }

    fn show_history(&mut self) {
        if self.transcript.is_empty() {
            self.terminal.write_info("[No conversation yet]");
            return;
        }
        let mut lines = Vec::with_capacity(self.transcript.len());
        for turn in self.transcript.as_context() {
            let speaker = match turn.provider() {
                Some(identity) => format!("{} ({})", self.config.personality.name, identity),
                None => "You".to_string(),
            };
            lines.push(format!(
                "[{}] {}: {}",
                turn.at().format("%H:%M:%S"),
                speaker,
                turn.content()
            ));
        }
        self.terminal.write_info(&lines.join("\n"));
    }

    fn show_providers(&mut self) {
        let default = self.session_provider();
        let mut lines = Vec::new();
        for identity in ProviderIdentity::PRIORITY {
            let status = match self.config.provider_config(identity) {
                Some(cfg) => format!("available, model {}", cfg.model),
                None => "no API key".to_string(),
            };
            let marker = if default == Some(identity) { " (default)" } else { "" };
            lines.push(format!("  {:<10} {}{}", identity.to_string(), status, marker));
        }
        self.terminal.write_info(&lines.join("\n"));
    }
}
