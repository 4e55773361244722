//! Seam traits for pluggable collaborators

mod chat;
mod speech;

pub use chat::ChatBackend;
pub use speech::SpeechRecognizer;
