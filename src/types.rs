//! Core data types used throughout jarvis.
//!
//! This module defines the provider identities, conversation turns and the
//! per-provider settings that flow between the router, the adapters and the
//! chat loop.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// --- Provider Identity ---

/// The hosted LLM vendors jarvis can talk to.
///
/// This is a closed set: every place that needs per-vendor behavior matches
/// on it exhaustively, so adding a vendor is a compile error until every
/// match handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderIdentity {
    OpenAi,
    #[serde(alias = "claude")]
    Anthropic,
    Gemini,
}

impl ProviderIdentity {
    /// Fallback priority when neither a shortcut nor the default applies.
    pub const PRIORITY: [ProviderIdentity; 3] = [
        ProviderIdentity::OpenAi,
        ProviderIdentity::Anthropic,
        ProviderIdentity::Gemini,
    ];

    /// The lowercase key used in config files and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            ProviderIdentity::OpenAi => "openai",
            ProviderIdentity::Anthropic => "anthropic",
            ProviderIdentity::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when the config file has no key.
    pub fn default_key_env(self) -> &'static str {
        match self {
            ProviderIdentity::OpenAi => "OPENAI_API_KEY",
            ProviderIdentity::Anthropic => "ANTHROPIC_API_KEY",
            ProviderIdentity::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderIdentity::OpenAi => "OpenAI",
            ProviderIdentity::Anthropic => "Anthropic",
            ProviderIdentity::Gemini => "Gemini",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderIdentity::OpenAi),
            "anthropic" | "claude" => Ok(ProviderIdentity::Anthropic),
            "gemini" | "google" => Ok(ProviderIdentity::Gemini),
            other => Err(format!(
                "unknown provider '{}' (expected openai, anthropic or gemini)",
                other
            )),
        }
    }
}

// --- Turn Roles ---

/// Who said something in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

// --- Turns ---

/// One message in the conversation.
///
/// Fields are private so a turn cannot change after it is built, and the
/// constructors guarantee that `provider` is set exactly for assistant turns.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    role: Role,
    content: String,
    provider: Option<ProviderIdentity>,
    at: DateTime<Local>,
}

impl Turn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, content.into(), None)
    }

    /// Create an assistant turn produced by `provider`.
    pub fn assistant(provider: ProviderIdentity, content: impl Into<String>) -> Self {
        Self::build(Role::Assistant, content.into(), Some(provider))
    }

    fn build(role: Role, content: String, provider: Option<ProviderIdentity>) -> Self {
        Self {
            role,
            content,
            provider,
            at: Local::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The adapter that produced this turn; `None` unless it is an assistant turn.
    pub fn provider(&self) -> Option<ProviderIdentity> {
        self.provider
    }

    pub fn at(&self) -> DateTime<Local> {
        self.at
    }
}

// --- Provider Config ---

/// Resolved settings for one provider, as handed to its adapter.
///
/// The API key is always non-empty: an identity without a key has no
/// `ProviderConfig` at all and is therefore unavailable.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub identity: ProviderIdentity,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_base: Option<String>,
}

// Hand-written so keys never end up in logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("identity", &self.identity)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_base", &self.api_base)
            .finish()
    }
}
