//! Microphone toggle adapter
//!
//! Owns the recognizer lifecycle: the underlying recognizer is created
//! on first use and reused for every capture after that. A toggle while
//! idle starts a single-utterance capture; a toggle while capturing
//! stops it. Final transcripts are forwarded over a channel for the
//! session layer to submit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use avatar_agent_config::RecognitionSettings;
use avatar_agent_core::{RecognitionError, SpeechRecognizer};

/// Deferred recognizer constructor, invoked once on first capture
pub type RecognizerFactory =
    Box<dyn Fn() -> Result<Arc<dyn SpeechRecognizer>, RecognitionError> + Send + Sync>;

/// Toggle-driven capture front end over a [`SpeechRecognizer`]
pub struct RecognitionAdapter {
    factory: RecognizerFactory,
    recognizer: OnceCell<Arc<dyn SpeechRecognizer>>,
    listening: Arc<AtomicBool>,
    transcript_tx: mpsc::Sender<String>,
}

impl RecognitionAdapter {
    /// Builds an adapter that creates an HTTP recognizer from settings
    /// on first use.
    pub fn new(settings: RecognitionSettings, transcript_tx: mpsc::Sender<String>) -> Self {
        Self::with_factory(
            Box::new(move || {
                crate::HttpSpeechRecognizer::new(&settings)
                    .map(|r| Arc::new(r) as Arc<dyn SpeechRecognizer>)
            }),
            transcript_tx,
        )
    }

    pub fn with_factory(factory: RecognizerFactory, transcript_tx: mpsc::Sender<String>) -> Self {
        Self {
            factory,
            recognizer: OnceCell::new(),
            listening: Arc::new(AtomicBool::new(false)),
            transcript_tx,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    fn recognizer(&self) -> Result<Arc<dyn SpeechRecognizer>, RecognitionError> {
        self.recognizer
            .get_or_try_init(|| (self.factory)())
            .cloned()
    }

    /// Starts a capture if idle, stops the in-progress capture otherwise.
    ///
    /// Returns the listening state after the toggle.
    pub fn toggle_listening(&self) -> Result<bool, RecognitionError> {
        let recognizer = self.recognizer()?;

        if self.listening.swap(true, Ordering::SeqCst) {
            recognizer.stop();
            self.listening.store(false, Ordering::SeqCst);
            debug!("stopped listening");
            return Ok(false);
        }

        debug!(language = %recognizer.language(), "started listening");

        let listening = self.listening.clone();
        let tx = self.transcript_tx.clone();
        tokio::spawn(async move {
            match recognizer.recognize_once().await {
                Ok(transcript) => {
                    if transcript.is_empty() {
                        debug!("capture ended without a transcript");
                    } else if tx.send(transcript).await.is_err() {
                        warn!("transcript receiver dropped");
                    }
                }
                Err(e) => warn!(error = %e, "recognition failed"),
            }
            listening.store(false, Ordering::SeqCst);
        });

        Ok(true)
    }
}
