//! Speech and avatar synthesis for the avatar agent
//!
//! The synthesizer converts reply text into spoken audio plus avatar
//! video rendered over the session's media transport. It is bound to
//! exactly one transport at avatar start and must be closed during
//! session teardown.

pub mod events;
pub mod speech_service;

pub use events::{offset_ms, AvatarEvent};
pub use speech_service::{SpeechServiceSynthesizer, SpeechServiceSynthesizerFactory};

use async_trait::async_trait;
use avatar_agent_config::{AvatarSettings, VoiceSettings};
use avatar_agent_transport::MediaTransport;
use std::sync::Arc;
use thiserror::Error;

/// Synthesis errors
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// Invalid credentials or unsupported configuration
    #[error("Failed to create synthesizer: {0}")]
    Creation(String),

    /// The avatar-start operation was rejected
    #[error("Avatar failed to start: {0}")]
    AvatarStart(String),

    /// A speak call was rejected outright
    #[error("Synthesis failed: {0}")]
    Speak(String),
}

/// Readiness of the synthesis engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesizerReadiness {
    NotStarted,
    Started,
    /// Closed engines cannot be restarted; a new session start builds a
    /// fresh synthesizer
    Closed,
}

/// Why a synthesis call was canceled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// Canceled by an engine error; the synthesizer is closed afterwards
    Error,
    /// Stopped deliberately (stop-speaking during teardown)
    Stopped,
}

/// Result of a completed speak call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Speech and avatar synthesized to the media stream
    Completed,
    Canceled {
        reason: CancellationReason,
        error_details: Option<String>,
    },
}

/// Speech-and-avatar synthesis engine
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Start the avatar over the given transport (SDP offer/answer
    /// exchange). Valid once per engine; readiness becomes `Started`.
    async fn start_avatar(&self, transport: Arc<dyn MediaTransport>) -> Result<(), SynthesisError>;

    /// Synthesize `text` through the bound transport
    async fn speak(&self, text: &str) -> Result<SpeakOutcome, SynthesisError>;

    /// Stop any in-progress speech without closing the engine
    async fn stop_speaking(&self) -> Result<(), SynthesisError>;

    /// Release the engine; readiness becomes `Closed`
    async fn close(&self) -> Result<(), SynthesisError>;

    fn readiness(&self) -> SynthesizerReadiness;
}

/// Builds a [`Synthesizer`] for a new session
pub trait SynthesizerFactory: Send + Sync {
    /// Construct an engine bound to the given voice and avatar
    /// configuration. Fails with [`SynthesisError::Creation`]; never
    /// retried.
    fn create_synthesizer(
        &self,
        voice: &VoiceSettings,
        avatar: &AvatarSettings,
    ) -> Result<Arc<dyn Synthesizer>, SynthesisError>;
}
