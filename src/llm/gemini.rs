//! Google Gemini provider.
//!
//! Uses `models/{model}:streamGenerateContent?alt=sse`. Gemini calls the
//! assistant role `model`, takes the personality prompt as
//! `systemInstruction`, and has no end-of-stream marker. The last chunk
//! carries `finishReason` and the server then closes the connection; a close
//! without a finish reason means the reply was cut off.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sse::{self, SseStep};
use super::{CompletionRequest, FragmentStream, LlmProvider};
use crate::error::ProviderError;
use crate::types::{ProviderIdentity, Role};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    client: reqwest::Client,
}

// --- API Request Types ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize, Debug)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

// --- Streaming Response Types ---

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

// --- Implementation ---

impl GeminiProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_api_request(request: &CompletionRequest<'_>) -> ApiRequest {
        let system = request.system_prompt.trim();
        let contents = request
            .turns
            .iter()
            .filter_map(|turn| {
                let role = match turn.role() {
                    Role::System => return None,
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                Some(Content {
                    role,
                    parts: vec![Part {
                        text: Some(turn.content().to_string()),
                    }],
                })
            })
            .collect();

        ApiRequest {
            contents,
            system_instruction: if system.is_empty() {
                None
            } else {
                Some(SystemInstruction {
                    parts: vec![Part {
                        text: Some(system.to_string()),
                    }],
                })
            },
            generation_config: GenerationConfig {
                temperature: request.config.temperature,
                max_output_tokens: request.config.max_tokens,
            },
        }
    }
}

/// Interpret one SSE data payload: all text parts of the first candidate.
fn parse_event(data: &str) -> Result<SseStep, ProviderError> {
    if data.trim().is_empty() {
        return Ok(SseStep::Skip);
    }
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::Api(err.message));
    }
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(SseStep::Skip);
    };
    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    match candidate.finish_reason {
        Some(reason) => Ok(SseStep::Finished {
            text,
            notice: finish_notice(&reason),
        }),
        None if text.is_empty() => Ok(SseStep::Skip),
        None => Ok(SseStep::Text(text)),
    }
}

/// A note for the user when Gemini stopped for anything but a natural end.
fn finish_notice(reason: &str) -> Option<String> {
    match reason {
        "STOP" => None,
        "MAX_TOKENS" => Some("Gemini stopped early: the reply hit the max token limit.".to_string()),
        "SAFETY" => Some("Gemini stopped the reply for safety reasons.".to_string()),
        other => Some(format!("Gemini stopped the reply early ({}).", other)),
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<FragmentStream, ProviderError> {
        let api_request = Self::build_api_request(&request);
        let base = request.config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            base.trim_end_matches('/'),
            request.config.model
        );
        debug!(%url, contents = api_request.contents.len(), "opening Gemini stream");

        let http = self
            .client
            .post(&url)
            .header("x-goog-api-key", &request.config.api_key)
            .json(&api_request);
        let source = sse::open(http)?;
        Ok(sse::fragments(source, |_event, data| parse_event(data)))
    }

    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Gemini
    }
}
