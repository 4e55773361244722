//! Session orchestration for the avatar agent
//!
//! Owns the session lifecycle state machine and composes the transport,
//! synthesis, recognition and chat-backend seams behind a single
//! controller. At most one session is active at a time, and the
//! controller itself enforces it.

pub mod controller;
pub mod policy;

pub use controller::SessionController;

use avatar_agent_core::{RecognitionError, SessionState};
use avatar_agent_synthesis::SynthesisError;
use avatar_agent_transport::TransportError;
use thiserror::Error;

/// Controller-level errors surfaced to callers
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is not active")]
    NotActive,

    #[error("Cannot start a session while {0}")]
    InvalidState(SessionState),

    /// A concurrent stop ended the session before startup finished
    #[error("Session was stopped while starting")]
    StoppedWhileStarting,

    /// Submissions are serialized; a request is already in flight
    #[error("A request is already being processed")]
    RequestInFlight,

    #[error("Synthesizer is not ready to speak")]
    SynthesizerNotReady,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),
}
