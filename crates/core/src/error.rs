//! Error types for the seam traits

use thiserror::Error;

/// Chat backend communication errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend returned status {0}")]
    Status(u16),

    #[error("Malformed response body: {0}")]
    MalformedBody(String),
}

/// Speech recognition errors
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// No recognition capability is configured on this platform
    #[error("Speech recognition is not available")]
    Unavailable,

    /// The provider reported a mid-utterance failure
    #[error("Recognition failed: {0}")]
    Platform(String),
}
