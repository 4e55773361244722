//! Core traits and types for the avatar agent
//!
//! This crate provides foundational types used across all other crates:
//! - Chat message and transcript types
//! - Session lifecycle state
//! - Seam traits for pluggable collaborators (chat backend, speech recognizer)
//! - Error types for those seams

pub mod chat;
pub mod error;
pub mod state;
pub mod traits;

pub use chat::{ChatEntry, ChatHistory, Message, Role};
pub use error::{BackendError, RecognitionError};
pub use state::SessionState;
pub use traits::{ChatBackend, SpeechRecognizer};
