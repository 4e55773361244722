//! Application state

use std::sync::Arc;

use avatar_agent_backend::HttpChatBackend;
use avatar_agent_config::Settings;
use avatar_agent_session::SessionController;
use avatar_agent_synthesis::SpeechServiceSynthesizerFactory;
use avatar_agent_transport::WebRtcTransportFactory;

use crate::ServerError;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub controller: Arc<SessionController>,
}

impl AppState {
    /// Wire the controller with the real transport, synthesis and
    /// backend implementations.
    pub fn new(settings: Settings) -> Result<Self, ServerError> {
        let backend = HttpChatBackend::new(&settings.backend)
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        let controller = SessionController::new(
            settings.clone(),
            Arc::new(WebRtcTransportFactory::new()),
            Arc::new(SpeechServiceSynthesizerFactory::new(settings.speech.clone())),
            Arc::new(backend),
        );

        Ok(Self {
            settings,
            controller,
        })
    }
}
