//! Transport traits

use crate::sink::PlaybackSink;
use crate::{ConnectionState, TransportError};
use async_trait::async_trait;
use avatar_agent_config::IceServerSettings;
use std::sync::Arc;

/// Real-time bidirectional media connection to the avatar service
///
/// Owned exclusively by the active session; closed when the session ends.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Add one bidirectional audio and one bidirectional video transceiver
    async fn add_bidirectional_media(&self) -> Result<(), TransportError>;

    /// Create the local SDP offer used to start the avatar
    async fn create_offer(&self) -> Result<String, TransportError>;

    /// Apply the SDP answer returned by the avatar service
    async fn set_remote_answer(&self, sdp: &str) -> Result<(), TransportError>;

    fn connection_state(&self) -> ConnectionState;

    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds a [`MediaTransport`] for a new session
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Construct a transport configured with exactly one ICE server
    /// descriptor, wiring incoming tracks to `sink`. The descriptor is
    /// passed through as supplied, never validated. Fails with
    /// [`TransportError::Creation`] when the platform rejects it;
    /// propagated to the caller, not retried.
    async fn create_transport(
        &self,
        ice: &IceServerSettings,
        sink: Arc<PlaybackSink>,
    ) -> Result<Arc<dyn MediaTransport>, TransportError>;
}
