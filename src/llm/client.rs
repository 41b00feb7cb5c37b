//! Completion endpoint client.
//!
//! Speaks the OpenAI-compatible `/chat/completions` shape: a model name
//! plus an ordered list of role/content messages in, free-form text out.
//! No retries — a failed call ends the turn.

use crate::error::{ChatDbError, ChatResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default request timeout for model calls.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// One role/content message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A completion backend: one blocking call, messages in, text out.
///
/// The production implementation is [`LlmClient`]; tests provide scripted
/// backends.
#[async_trait]
pub trait ChatBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> ChatResult<String>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

/// HTTP client for an OpenAI-compatible completion endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    completions_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    /// Create a client for the endpoint at `base_url` (e.g.
    /// `https://api.openai.com/v1`), using `model` for every call.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatDbError::internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
        })
    }

    /// The model name sent with every request.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> ChatResult<String> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
        };

        debug!(model = %self.model, messages = messages.len(), "Calling completion endpoint");

        let mut request = self.client.post(&self.completions_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(ChatDbError::from)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatDbError::completion(format!(
                "endpoint returned {}: {}",
                status,
                text.chars().take(300).collect::<String>()
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatDbError::completion(format!("invalid response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatDbError::completion("response contained no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = ChatMessage::system("instructions");
        assert_eq!(msg.role, "system");
        assert_eq!(msg.content, "instructions");

        let msg = ChatMessage::user("question");
        assert_eq!(msg.role, "user");
    }

    #[test]
    fn test_completions_url_normalization() {
        let client = LlmClient::new(
            "https://api.example.com/v1/",
            None,
            "test-model",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.completions_url,
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(client.model(), "test-model");
    }

    #[test]
    fn test_response_shape_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hi");
    }
}
