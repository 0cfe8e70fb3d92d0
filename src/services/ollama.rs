// src/services/ollama.rs
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AnalysisErrorKind, ChatMessage};

pub const DEFAULT_HOST: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "NeuralTicker";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (status code: {status})")]
    Status { status: u16, message: String },

    /// A success status whose body carries an `error` field.
    #[error("{0}")]
    Service(String),

    #[error("unexpected chat response: {0}")]
    Decode(String),
}

impl ChatError {
    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            ChatError::Transport(_) => AnalysisErrorKind::Transport,
            ChatError::Status { .. } | ChatError::Service(_) => AnalysisErrorKind::Status,
            ChatError::Decode(_) => AnalysisErrorKind::Decode,
        }
    }
}

/// A chat-completion endpoint: send messages, get one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for a local Ollama server's `/api/chat`.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    host: String,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        OllamaClient {
            client: Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let url = format!("{}/api/chat", self.host);
        info!("Sending {} message(s) to model {} at {}", messages.len(), model, url);

        let resp = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model,
                messages,
                stream: false,
            })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!("Chat endpoint answered HTTP {} ({} bytes)", status, body.len());

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ChatError::Status {
                status: status.as_u16(),
                message,
            });
        }

        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<String, ChatError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| ChatError::Decode(e.to_string()))?;
    if let Some(error) = parsed.error {
        return Err(ChatError::Service(error));
    }
    parsed
        .message
        .map(|m| m.content)
        .ok_or_else(|| ChatError::Decode("response has no message".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn request_is_a_single_non_streaming_call() {
        let messages = vec![ChatMessage::user("hello")];
        let body = serde_json::to_value(ChatRequest {
            model: DEFAULT_MODEL,
            messages: &messages,
            stream: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "NeuralTicker",
                "messages": [{ "role": "user", "content": "hello" }],
                "stream": false
            })
        );
    }

    #[test]
    fn reply_content_is_returned_verbatim() {
        let body = r#"{
            "model": "NeuralTicker",
            "created_at": "2024-06-01T12:00:00Z",
            "message": { "role": "assistant", "content": "  Trend: up.\nHold.  " },
            "done": true
        }"#;
        assert_eq!(parse_reply(body).unwrap(), "  Trend: up.\nHold.  ");
    }

    #[test]
    fn malformed_reply_is_a_decode_error() {
        let err = parse_reply(r#"{"done": true}"#).unwrap_err();
        assert_eq!(err.kind(), AnalysisErrorKind::Decode);
        assert!(parse_reply("not json").is_err());
    }

    #[test]
    fn error_field_in_a_success_body_is_a_service_failure() {
        let err = parse_reply(r#"{"error": "model 'NeuralTicker' not found, try pulling it first"}"#).unwrap_err();
        assert!(matches!(err, ChatError::Service(_)));
        assert_eq!(err.kind(), AnalysisErrorKind::Status);
        assert_eq!(err.to_string(), "model 'NeuralTicker' not found, try pulling it first");
    }

    #[test]
    fn status_error_formats_service_message() {
        let err = ChatError::Status {
            status: 404,
            message: "model 'NeuralTicker' not found".to_string(),
        };
        assert_eq!(err.to_string(), "model 'NeuralTicker' not found (status code: 404)");
        assert_eq!(err.kind(), AnalysisErrorKind::Status);
    }

    #[test]
    fn user_message_has_user_role() {
        assert_eq!(ChatMessage::user("x").role, Role::User);
    }

    #[test]
    fn host_trailing_slash_is_trimmed() {
        assert_eq!(OllamaClient::new("http://127.0.0.1:11434/").host(), "http://127.0.0.1:11434");
    }
}
