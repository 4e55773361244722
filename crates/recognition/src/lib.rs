//! Speech recognition adapter for the avatar agent
//!
//! Wraps the platform's speech-to-text capability as single-shot,
//! start/stop controlled transcription. The recognizer handle is created
//! lazily on first use and reused across listen cycles.

pub mod adapter;
pub mod http;

pub use adapter::{RecognitionAdapter, RecognizerFactory};
pub use http::HttpSpeechRecognizer;
