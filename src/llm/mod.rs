//! LLM Client module.
//!
//! This module defines the `LlmProvider` trait that abstracts over the
//! hosted vendors (OpenAI, Anthropic, Gemini), and the `Providers` registry
//! the chat loop uses to find the adapter for a routed identity.
//!
//! Every adapter takes the same `CompletionRequest` (conversation turns,
//! personality prompt, resolved settings) and answers with a lazy stream of
//! text fragments. The stream is single-pass: it is exhausted when the
//! vendor signals completion, and dropping it early closes the connection.

pub mod anthropic;
pub mod gemini;
pub mod openai;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ProviderError;
use crate::types::{ProviderConfig, ProviderIdentity, Turn};

/// One item of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Reply text, in the order the vendor sent it.
    Text(String),
    /// Something the user should know about the reply, e.g. that the vendor
    /// cut it short. Shown after the reply, never stored in the transcript.
    Notice(String),
}

/// The reply as the vendor streams it.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, ProviderError>> + Send>>;

/// Everything an adapter needs for one call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Conversation so far, ending with the new user turn.
    pub turns: &'a [Turn],
    /// The personality prompt, sent in the vendor's system slot.
    pub system_prompt: &'a str,
    pub config: &'a ProviderConfig,
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start a streamed chat completion.
    ///
    /// Errors that happen before the stream exists are returned here; errors
    /// during streaming arrive as the stream's last item.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<FragmentStream, ProviderError>;

    /// Which vendor this adapter talks to.
    fn identity(&self) -> ProviderIdentity;
}

/// One adapter per provider identity.
pub struct Providers {
    openai: Box<dyn LlmProvider>,
    anthropic: Box<dyn LlmProvider>,
    gemini: Box<dyn LlmProvider>,
}

impl Providers {
    pub fn new(
        openai: Box<dyn LlmProvider>,
        anthropic: Box<dyn LlmProvider>,
        gemini: Box<dyn LlmProvider>,
    ) -> Self {
        Self {
            openai,
            anthropic,
            gemini,
        }
    }

    /// The real HTTP adapters, sharing one connection pool.
    pub fn http() -> Self {
        let client = reqwest::Client::new();
        Self::new(
            Box::new(openai::OpenAiProvider::new(client.clone())),
            Box::new(anthropic::AnthropicProvider::new(client.clone())),
            Box::new(gemini::GeminiProvider::new(client)),
        )
    }

    pub fn get(&self, identity: ProviderIdentity) -> &dyn LlmProvider {
        match identity {
            ProviderIdentity::OpenAi => self.openai.as_ref(),
            ProviderIdentity::Anthropic => self.anthropic.as_ref(),
            ProviderIdentity::Gemini => self.gemini.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_each_identity() {
        let providers = Providers::http();
        for id in ProviderIdentity::PRIORITY {
            assert_eq!(providers.get(id).identity(), id);
        }
    }
}
