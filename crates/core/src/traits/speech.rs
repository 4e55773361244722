//! Speech recognition interface
//!
//! Wraps the platform's speech-to-text capability as single-shot,
//! start/stop controlled transcription. Implementations produce one
//! transcript per utterance; interim results are never surfaced.

use crate::error::RecognitionError;
use async_trait::async_trait;

/// Single-utterance speech recognizer
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture one utterance and return the top transcript of the first
    /// recognized segment. Resolves when the utterance ends naturally or
    /// `stop` is called.
    async fn recognize_once(&self) -> Result<String, RecognitionError>;

    /// Stop an in-progress recognition; the pending `recognize_once`
    /// resolves with whatever was captured so far.
    fn stop(&self);

    /// Fixed recognition locale, set at creation
    fn language(&self) -> &str;
}
