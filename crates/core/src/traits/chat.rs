//! Chat backend interface

use crate::chat::Message;
use crate::error::BackendError;
use async_trait::async_trait;

/// Conversational backend that accepts a message batch and returns a reply
///
/// The returned value is the raw JSON body of the 2xx response. Callers
/// must treat any body without a string `response` field as a malformed
/// reply; the backend itself does not validate the shape.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send messages and return the parsed response body
    async fn send(&self, messages: &[Message]) -> Result<serde_json::Value, BackendError>;
}
