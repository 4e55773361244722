//! HTTP single-shot recognizer
//!
//! Sends a recognize-once request to an external speech-to-text service
//! and returns the top transcript of the first recognized segment.
//! Interim results are never requested.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Notify;

use avatar_agent_config::RecognitionSettings;
use avatar_agent_core::{RecognitionError, SpeechRecognizer};

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    results: Vec<RecognizedSegment>,
}

#[derive(Debug, Deserialize)]
struct RecognizedSegment {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

/// Recognizer backed by an external speech-to-text service
pub struct HttpSpeechRecognizer {
    client: reqwest::Client,
    url: String,
    language: String,
    stop_signal: Notify,
}

impl HttpSpeechRecognizer {
    pub fn new(settings: &RecognitionSettings) -> Result<Self, RecognitionError> {
        let url = settings
            .url
            .clone()
            .ok_or(RecognitionError::Unavailable)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| RecognitionError::Platform(e.to_string()))?;

        Ok(Self {
            client,
            url,
            language: settings.language.clone(),
            stop_signal: Notify::new(),
        })
    }

    async fn request_once(&self) -> Result<String, RecognitionError> {
        let response = self
            .client
            .post(format!("{}/recognize_once", self.url))
            .json(&serde_json::json!({
                "language": self.language,
                "interim_results": false,
                "continuous": false,
            }))
            .send()
            .await
            .map_err(|e| RecognitionError::Platform(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RecognitionError::Platform(format!(
                "service returned status {}",
                response.status()
            )));
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Platform(format!("malformed response: {}", e)))?;

        let transcript = body
            .results
            .first()
            .and_then(|segment| segment.alternatives.first())
            .map(|alt| alt.transcript.clone())
            .unwrap_or_default();

        Ok(transcript)
    }
}

#[async_trait]
impl SpeechRecognizer for HttpSpeechRecognizer {
    async fn recognize_once(&self) -> Result<String, RecognitionError> {
        tokio::select! {
            result = self.request_once() => result,
            // Externally stopped: nothing was captured
            _ = self.stop_signal.notified() => Ok(String::new()),
        }
    }

    fn stop(&self) {
        // Permit semantics: a stop issued before the capture is first
        // polled must still terminate it
        self.stop_signal.notify_one();
    }

    fn language(&self) -> &str {
        &self.language
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_url_is_unavailable() {
        let settings = RecognitionSettings {
            url: None,
            language: "en-US".to_string(),
            timeout_ms: 1000,
        };
        assert!(matches!(
            HttpSpeechRecognizer::new(&settings),
            Err(RecognitionError::Unavailable)
        ));
    }

    #[test]
    fn test_language_fixed_at_creation() {
        let settings = RecognitionSettings {
            url: Some("http://127.0.0.1:8090".to_string()),
            language: "en-US".to_string(),
            timeout_ms: 1000,
        };
        let recognizer = HttpSpeechRecognizer::new(&settings).unwrap();
        assert_eq!(recognizer.language(), "en-US");
    }

    #[tokio::test]
    async fn test_stop_resolves_pending_recognition_empty() {
        let settings = RecognitionSettings {
            // Unroutable address: the request blocks until stopped
            url: Some("http://10.255.255.1:9".to_string()),
            language: "en-US".to_string(),
            timeout_ms: 30_000,
        };
        let recognizer = std::sync::Arc::new(HttpSpeechRecognizer::new(&settings).unwrap());

        let pending = {
            let recognizer = recognizer.clone();
            tokio::spawn(async move { recognizer.recognize_once().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        recognizer.stop();

        // Resolves empty when stopped mid-request; some environments
        // reject the connect outright first, which is also a clean end.
        match pending.await.unwrap() {
            Ok(transcript) => assert!(transcript.is_empty()),
            Err(RecognitionError::Platform(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }
}
