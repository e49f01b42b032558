//! Anthropic (Claude) LLM provider implementation.
//!
//! This module implements the `LlmProvider` trait for the Anthropic Messages API.
//!
//! Key differences from OpenAI:
//! - the system prompt is a top-level field, not a message
//! - `max_tokens` is mandatory
//! - the stream is made of typed events (`message_start`,
//!   `content_block_delta`, `message_stop`, `error`, `ping`, ...); only
//!   `text_delta` deltas carry reply text

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::sse::{self, SseStep};
use super::{CompletionRequest, FragmentStream, LlmProvider};
use crate::error::ProviderError;
use crate::types::{ProviderIdentity, Role};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic API client.
pub struct AnthropicProvider {
    client: reqwest::Client,
}

// --- API Request Types ---
// These match the Anthropic Messages API format

#[derive(Serialize, Debug)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    stream: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

// --- Streaming Event Types ---

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "error")]
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

// --- Implementation ---

impl AnthropicProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Convert the conversation to Anthropic's message list.
    ///
    /// The personality prompt goes into the top-level `system` field.
    fn build_api_request(request: &CompletionRequest<'_>) -> ApiRequest {
        let system = request.system_prompt.trim();
        let messages = request
            .turns
            .iter()
            .filter_map(|turn| {
                let role = match turn.role() {
                    Role::System => return None,
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                Some(ApiMessage {
                    role,
                    content: turn.content().to_string(),
                })
            })
            .collect();

        ApiRequest {
            model: request.config.model.clone(),
            max_tokens: request.config.max_tokens,
            temperature: request.config.temperature,
            system: if system.is_empty() {
                None
            } else {
                Some(system.to_string())
            },
            messages,
            stream: true,
        }
    }
}

/// Interpret one SSE event; the JSON `type` field mirrors the SSE event name.
fn parse_event(data: &str) -> Result<SseStep, ProviderError> {
    if data.trim().is_empty() {
        return Ok(SseStep::Skip);
    }
    let event: StreamEvent =
        serde_json::from_str(data).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    match event {
        StreamEvent::ContentBlockDelta {
            delta: Delta::Text { text },
        } if !text.is_empty() => Ok(SseStep::Text(text)),
        StreamEvent::MessageStop => Ok(SseStep::Done),
        StreamEvent::Error { error } => {
            warn!("Anthropic stream error: {}", error.message);
            Err(ProviderError::Api(error.message))
        }
        _ => Ok(SseStep::Skip),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<FragmentStream, ProviderError> {
        let api_request = Self::build_api_request(&request);
        let base = request.config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let url = format!("{}/v1/messages", base.trim_end_matches('/'));
        debug!(%url, model = %api_request.model, messages = api_request.messages.len(), "opening Anthropic stream");

        let http = self
            .client
            .post(&url)
            .header("x-api-key", &request.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&api_request);
        let source = sse::open(http)?;
        Ok(sse::fragments(source, |_event, data| parse_event(data)))
    }

    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Anthropic
    }
}
