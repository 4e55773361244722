//! HTTP chat backend client
//!
//! Posts the user's message batch to the assistant endpoint and returns
//! the raw JSON reply body. Shape validation of the body is left to the
//! session layer, which owns the fallback reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use avatar_agent_config::BackendSettings;
use avatar_agent_core::{BackendError, ChatBackend, Message};

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
}

/// Client for the `getAssistantResponse` chat endpoint
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| BackendError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/getAssistantResponse/chats", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, messages: &[Message]) -> Result<serde_json::Value, BackendError> {
        let url = self.chat_url();
        debug!(url = %url, message_count = messages.len(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { messages })
            .send()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| BackendError::MalformedBody(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let messages = vec![Message::user("hello")];
        let body = serde_json::to_value(ChatRequest {
            messages: &messages,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "messages": [{"role": "user", "content": "hello"}]
            })
        );
    }

    #[test]
    fn test_chat_url_strips_trailing_slash() {
        let backend = HttpChatBackend::new(&BackendSettings {
            base_url: "http://localhost:3000/".to_string(),
            timeout_ms: 1000,
        })
        .unwrap();
        assert_eq!(
            backend.chat_url(),
            "http://localhost:3000/getAssistantResponse/chats"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let backend = HttpChatBackend::new(&BackendSettings {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_ms: 500,
        })
        .unwrap();
        let err = backend.send(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, BackendError::Http(_)));
    }
}
