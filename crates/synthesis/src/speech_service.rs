//! Speech service synthesis client
//!
//! Talks to the cloud speech-avatar service over HTTP: avatar start is
//! an SDP offer/answer exchange against the session resource, speak and
//! stop-speaking are operations on that resource. Media itself arrives
//! over the WebRTC transport, not through this client.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use avatar_agent_config::{AvatarSettings, SpeechServiceSettings, VoiceSettings};
use avatar_agent_transport::MediaTransport;

use crate::events::{self, AvatarEvent};
use crate::{
    CancellationReason, SpeakOutcome, SynthesisError, Synthesizer, SynthesizerFactory,
    SynthesizerReadiness,
};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvatarStartRequest<'a> {
    voice: &'a str,
    character: &'a str,
    style: &'a str,
    background_color: &'a str,
    video_crop: VideoCrop,
    sdp_offer: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoCrop {
    top_left_x: u32,
    top_left_y: u32,
    bottom_right_x: u32,
    bottom_right_y: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvatarStartResponse {
    session_id: String,
    sdp_answer: String,
}

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpeakResponse {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub events: Vec<AvatarEvent>,
}

impl SpeakResponse {
    pub(crate) fn into_outcome(self) -> SpeakOutcome {
        for event in &self.events {
            events::log_event(event);
        }

        if self.status == "completed" {
            return SpeakOutcome::Completed;
        }

        let reason = match self.reason.as_deref() {
            Some("error") => CancellationReason::Error,
            _ => CancellationReason::Stopped,
        };
        SpeakOutcome::Canceled {
            reason,
            error_details: self.error_details,
        }
    }
}

/// Synthesis engine backed by the cloud speech-avatar service
pub struct SpeechServiceSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    subscription_key: String,
    voice: VoiceSettings,
    avatar: AvatarSettings,
    readiness: RwLock<SynthesizerReadiness>,
    /// Bound at avatar start; exactly one transport per engine
    transport: RwLock<Option<Arc<dyn MediaTransport>>>,
    session_id: RwLock<Option<String>>,
}

impl SpeechServiceSynthesizer {
    fn sessions_url(&self) -> String {
        format!("{}/cognitiveservices/avatar/sessions", self.endpoint)
    }

    fn session_url(&self, id: &str) -> String {
        format!("{}/{}", self.sessions_url(), id)
    }

    fn bound_session_id(&self) -> Result<String, SynthesisError> {
        self.session_id
            .read()
            .clone()
            .ok_or_else(|| SynthesisError::Speak("avatar session not started".to_string()))
    }
}

#[async_trait]
impl Synthesizer for SpeechServiceSynthesizer {
    async fn start_avatar(&self, transport: Arc<dyn MediaTransport>) -> Result<(), SynthesisError> {
        if *self.readiness.read() != SynthesizerReadiness::NotStarted {
            return Err(SynthesisError::AvatarStart(
                "synthesizer already started or closed".to_string(),
            ));
        }

        let offer = transport
            .create_offer()
            .await
            .map_err(|e| SynthesisError::AvatarStart(e.to_string()))?;

        let request = AvatarStartRequest {
            voice: &self.voice.name,
            character: &self.avatar.character,
            style: &self.avatar.style,
            background_color: &self.avatar.background_color,
            video_crop: VideoCrop {
                top_left_x: self.avatar.crop.top_left_x,
                top_left_y: self.avatar.crop.top_left_y,
                bottom_right_x: self.avatar.crop.bottom_right_x,
                bottom_right_y: self.avatar.crop.bottom_right_y,
            },
            sdp_offer: &offer,
        };

        let response = self
            .client
            .post(self.sessions_url())
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::AvatarStart(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::AvatarStart(format!(
                "service returned status {}",
                response.status()
            )));
        }

        let body: AvatarStartResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::AvatarStart(format!("malformed response: {}", e)))?;

        transport
            .set_remote_answer(&body.sdp_answer)
            .await
            .map_err(|e| SynthesisError::AvatarStart(e.to_string()))?;

        *self.transport.write() = Some(transport);
        *self.session_id.write() = Some(body.session_id.clone());
        *self.readiness.write() = SynthesizerReadiness::Started;

        tracing::info!(session_id = %body.session_id, "Avatar started");
        Ok(())
    }

    async fn speak(&self, text: &str) -> Result<SpeakOutcome, SynthesisError> {
        if *self.readiness.read() != SynthesizerReadiness::Started {
            return Err(SynthesisError::Speak("synthesizer not started".to_string()));
        }
        let session_id = self.bound_session_id()?;

        let response = self
            .client
            .post(format!("{}/speak", self.session_url(&session_id)))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .json(&SpeakRequest { text })
            .send()
            .await
            .map_err(|e| SynthesisError::Speak(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::Speak(format!(
                "service returned status {}",
                response.status()
            )));
        }

        let body: SpeakResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Speak(format!("malformed response: {}", e)))?;

        Ok(body.into_outcome())
    }

    async fn stop_speaking(&self) -> Result<(), SynthesisError> {
        let session_id = self.bound_session_id()?;

        let response = self
            .client
            .post(format!("{}/stop", self.session_url(&session_id)))
            .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
            .send()
            .await
            .map_err(|e| SynthesisError::Speak(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SynthesisError::Speak(format!(
                "service returned status {}",
                response.status()
            )));
        }

        tracing::info!(session_id = %session_id, "Stop speaking request sent");
        Ok(())
    }

    async fn close(&self) -> Result<(), SynthesisError> {
        // Take the id before awaiting; the lock must not be held across
        // the request
        let taken = self.session_id.write().take();

        // Best effort: the session resource expires server-side anyway
        if let Some(session_id) = taken {
            let result = self
                .client
                .delete(self.session_url(&session_id))
                .header("Ocp-Apim-Subscription-Key", &self.subscription_key)
                .send()
                .await;
            if let Err(e) = result {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to delete avatar session");
            }
        }

        *self.transport.write() = None;
        *self.readiness.write() = SynthesizerReadiness::Closed;
        tracing::info!("Synthesizer closed");
        Ok(())
    }

    fn readiness(&self) -> SynthesizerReadiness {
        *self.readiness.read()
    }
}

/// Factory for speech service synthesizers
pub struct SpeechServiceSynthesizerFactory {
    speech: SpeechServiceSettings,
    endpoint_override: Option<String>,
}

impl SpeechServiceSynthesizerFactory {
    pub fn new(speech: SpeechServiceSettings) -> Self {
        Self {
            speech,
            endpoint_override: None,
        }
    }

    /// Point the factory at a non-regional endpoint (tests, private link)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    fn endpoint(&self) -> String {
        self.endpoint_override.clone().unwrap_or_else(|| {
            format!("https://{}.tts.speech.microsoft.com", self.speech.region)
        })
    }
}

impl SynthesizerFactory for SpeechServiceSynthesizerFactory {
    fn create_synthesizer(
        &self,
        voice: &VoiceSettings,
        avatar: &AvatarSettings,
    ) -> Result<Arc<dyn Synthesizer>, SynthesisError> {
        if self.speech.subscription_key.is_empty() {
            return Err(SynthesisError::Creation(
                "missing subscription key".to_string(),
            ));
        }
        if self.speech.region.is_empty() && self.endpoint_override.is_none() {
            return Err(SynthesisError::Creation("missing service region".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SynthesisError::Creation(e.to_string()))?;

        tracing::info!(
            voice = %voice.name,
            character = %avatar.character,
            style = %avatar.style,
            background = %avatar.background_color,
            "Creating avatar synthesizer"
        );

        Ok(Arc::new(SpeechServiceSynthesizer {
            client,
            endpoint: self.endpoint(),
            subscription_key: self.speech.subscription_key.clone(),
            voice: voice.clone(),
            avatar: avatar.clone(),
            readiness: RwLock::new(SynthesizerReadiness::NotStarted),
            transport: RwLock::new(None),
            session_id: RwLock::new(None),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory_with_key() -> SpeechServiceSynthesizerFactory {
        SpeechServiceSynthesizerFactory::new(SpeechServiceSettings {
            region: "westus2".to_string(),
            subscription_key: "test-key".to_string(),
        })
    }

    #[test]
    fn test_missing_credentials_is_creation_error() {
        let factory = SpeechServiceSynthesizerFactory::new(SpeechServiceSettings {
            region: "westus2".to_string(),
            subscription_key: String::new(),
        });

        let result =
            factory.create_synthesizer(&VoiceSettings::default(), &AvatarSettings::default());
        assert!(matches!(result, Err(SynthesisError::Creation(_))));
    }

    #[test]
    fn test_created_synthesizer_is_not_started() {
        let synthesizer = factory_with_key()
            .create_synthesizer(&VoiceSettings::default(), &AvatarSettings::default())
            .unwrap();
        assert_eq!(synthesizer.readiness(), SynthesizerReadiness::NotStarted);
    }

    #[tokio::test]
    async fn test_speak_before_start_is_rejected() {
        let synthesizer = factory_with_key()
            .create_synthesizer(&VoiceSettings::default(), &AvatarSettings::default())
            .unwrap();

        let result = synthesizer.speak("hello").await;
        assert!(matches!(result, Err(SynthesisError::Speak(_))));
    }

    #[tokio::test]
    async fn test_close_moves_readiness_to_closed() {
        let synthesizer = factory_with_key()
            .create_synthesizer(&VoiceSettings::default(), &AvatarSettings::default())
            .unwrap();

        synthesizer.close().await.unwrap();
        assert_eq!(synthesizer.readiness(), SynthesizerReadiness::Closed);
    }

    #[test]
    fn test_canceled_response_maps_reason() {
        let response: SpeakResponse = serde_json::from_str(
            r#"{"status":"canceled","reason":"error","errorDetails":"quota exceeded"}"#,
        )
        .unwrap();

        match response.into_outcome() {
            SpeakOutcome::Canceled {
                reason,
                error_details,
            } => {
                assert_eq!(reason, CancellationReason::Error);
                assert_eq!(error_details.as_deref(), Some("quota exceeded"));
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_completed_response_maps_outcome() {
        let response: SpeakResponse =
            serde_json::from_str(r#"{"status":"completed","events":[{"description":"TurnStart"}]}"#)
                .unwrap();
        assert_eq!(response.into_outcome(), SpeakOutcome::Completed);
    }
}
