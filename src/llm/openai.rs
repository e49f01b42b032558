//! OpenAI chat-completions provider.
//!
//! Streams `POST {base}/chat/completions` with `stream: true`. Each SSE data
//! line is a JSON chunk whose `choices[0].delta.content` carries the next
//! piece of text; the literal `[DONE]` ends the reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sse::{self, SseStep};
use super::{CompletionRequest, FragmentStream, LlmProvider};
use crate::error::ProviderError;
use crate::types::{ProviderIdentity, Role};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
}

// --- API Request Types (OpenAI format) ---

#[derive(Serialize, Debug)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

// --- Streaming Response Types ---

#[derive(Deserialize, Debug)]
struct StreamResponseChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamError>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamError {
    message: String,
}

// --- Implementation ---

impl OpenAiProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_api_request(request: &CompletionRequest<'_>) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system_prompt.trim().is_empty() {
            messages.push(ApiMessage {
                role: role_name(Role::System),
                content: request.system_prompt.to_string(),
            });
        }
        for turn in request.turns {
            messages.push(ApiMessage {
                role: role_name(turn.role()),
                content: turn.content().to_string(),
            });
        }

        ApiRequest {
            model: request.config.model.clone(),
            messages,
            max_tokens: request.config.max_tokens,
            temperature: request.config.temperature,
            stream: true,
        }
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Interpret one SSE data payload.
fn parse_event(data: &str) -> Result<SseStep, ProviderError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseStep::Done);
    }
    if data.is_empty() {
        return Ok(SseStep::Skip);
    }
    let chunk: StreamResponseChunk =
        serde_json::from_str(data).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    if let Some(err) = chunk.error {
        return Err(ProviderError::Api(err.message));
    }
    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(text) if !text.is_empty() => Ok(SseStep::Text(text)),
        _ => Ok(SseStep::Skip),
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<FragmentStream, ProviderError> {
        let api_request = Self::build_api_request(&request);
        let base = request.config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        debug!(%url, model = %api_request.model, messages = api_request.messages.len(), "opening OpenAI stream");

        let http = self
            .client
            .post(&url)
            .bearer_auth(&request.config.api_key)
            .json(&api_request);
        let source = sse::open(http)?;
        Ok(sse::fragments(source, |_event, data| parse_event(data)))
    }

    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::OpenAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::sse::test_server::{client, serve_once};
    use crate::llm::Fragment;
    use crate::types::{ProviderConfig, Turn};
    use futures_util::StreamExt;

    fn config(api_base: Option<String>) -> ProviderConfig {
        ProviderConfig {
            identity: ProviderIdentity::OpenAi,
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            api_base,
        }
    }

    #[test]
    fn test_request_starts_with_personality() {
        let cfg = config(None);
        let turns = vec![
            Turn::user("hi"),
            Turn::assistant(ProviderIdentity::Gemini, "hello"),
            Turn::user("joke?"),
        ];
        let api = OpenAiProvider::build_api_request(&CompletionRequest {
            turns: &turns,
            system_prompt: "You are Jarvis.",
            config: &cfg,
        });
        let roles: Vec<&str> = api.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(api.messages[0].content, "You are Jarvis.");
        assert_eq!(api.model, "gpt-4o");
        assert_eq!(api.max_tokens, 256);
        assert!(api.stream);
    }

    #[test]
    fn test_parse_event_variants() {
        assert_eq!(parse_event("[DONE]").unwrap(), SseStep::Done);
        assert_eq!(
            parse_event(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap(),
            SseStep::Text("Hi".to_string())
        );
        assert_eq!(
            parse_event(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            SseStep::Skip
        );
        assert_eq!(parse_event(r#"{"choices":[]}"#).unwrap(), SseStep::Skip);
        assert!(matches!(
            parse_event(r#"{"error":{"message":"quota exceeded"}}"#),
            Err(ProviderError::Api(m)) if m == "quota exceeded"
        ));
        assert!(matches!(parse_event("{not json"), Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_streams_against_local_server() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Why did \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"the crab...\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (base, rx) = serve_once("200 OK", "text/event-stream", body).await;
        let cfg = config(Some(format!("{}/v1/", base)));
        let turns = vec![Turn::user("tell me a joke")];
        let provider = OpenAiProvider::new(client());
        let stream = provider
            .complete(CompletionRequest {
                turns: &turns,
                system_prompt: "Be witty.",
                config: &cfg,
            })
            .await
            .unwrap();
        let text: Vec<Fragment> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(
            text,
            vec![
                Fragment::Text("Why did ".to_string()),
                Fragment::Text("the crab...".to_string()),
            ]
        );

        let seen = rx.await.unwrap();
        assert!(seen.head.starts_with("POST /v1/chat/completions "));
        assert!(seen.head.to_lowercase().contains("authorization: bearer sk-test"));
        let sent: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(sent["stream"], true);
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["messages"][1]["content"], "tell me a joke");
    }

    #[tokio::test]
    async fn test_close_without_done_fails_the_reply() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"The answer is \"}}]}\n\n";
        let (base, _rx) = serve_once("200 OK", "text/event-stream", body).await;
        let cfg = config(Some(base));
        let turns = vec![Turn::user("what is it?")];
        let provider = OpenAiProvider::new(client());
        let items: Vec<_> = provider
            .complete(CompletionRequest {
                turns: &turns,
                system_prompt: "",
                config: &cfg,
            })
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_ref().unwrap(),
            &Fragment::Text("The answer is ".to_string())
        );
        assert!(matches!(items[1], Err(ProviderError::Transport(_))));
    }
}
