//! WebRTC transport implementation
//!
//! One peer connection per session, configured with exactly one ICE
//! server descriptor. Remote tracks are handed to the [`PlaybackSink`];
//! ICE connection-state transitions are logged but never acted on (no
//! reconnection protocol).

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::oneshot;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use crate::sink::{PlaybackSink, TrackKind};
use crate::traits::{MediaTransport, TransportFactory};
use crate::{ConnectionState, TransportError};
use avatar_agent_config::IceServerSettings;

/// How long to wait for ICE gathering before returning a partial offer
const ICE_GATHERING_TIMEOUT_SECS: u64 = 10;

/// WebRTC transport bound to one avatar session
pub struct AvatarTransport {
    id: String,
    state: Arc<RwLock<ConnectionState>>,
    peer_connection: Arc<RTCPeerConnection>,
}

impl AvatarTransport {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl MediaTransport for AvatarTransport {
    async fn add_bidirectional_media(&self) -> Result<(), TransportError> {
        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Sendrecv,
            send_encodings: vec![],
        };

        self.peer_connection
            .add_transceiver_from_kind(RTPCodecType::Audio, Some(init))
            .await
            .map_err(|e| TransportError::Negotiation(format!("audio transceiver: {}", e)))?;

        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Sendrecv,
            send_encodings: vec![],
        };

        self.peer_connection
            .add_transceiver_from_kind(RTPCodecType::Video, Some(init))
            .await
            .map_err(|e| TransportError::Negotiation(format!("video transceiver: {}", e)))?;

        Ok(())
    }

    async fn create_offer(&self) -> Result<String, TransportError> {
        // Gathering completion is signalled once; setting the local
        // description triggers it.
        let (gather_tx, gather_rx) = oneshot::channel::<()>();
        let gather_tx = Arc::new(parking_lot::Mutex::new(Some(gather_tx)));

        self.peer_connection
            .on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
                if state == RTCIceGathererState::Complete {
                    if let Some(tx) = gather_tx.lock().take() {
                        let _ = tx.send(());
                    }
                }
                Box::pin(async {})
            }));

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        let timeout = std::time::Duration::from_secs(ICE_GATHERING_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, gather_rx).await {
            Ok(_) => {},
            Err(_) => {
                tracing::warn!(
                    transport_id = %self.id,
                    "ICE gathering timed out, proceeding with partial candidates"
                );
            },
        }

        // The local description now carries the gathered candidates
        let sdp = self
            .peer_connection
            .local_description()
            .await
            .map(|desc| desc.sdp)
            .unwrap_or(offer.sdp);

        Ok(sdp)
    }

    async fn set_remote_answer(&self, sdp: &str) -> Result<(), TransportError> {
        let answer = RTCSessionDescription::answer(sdp.to_string())
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;

        Ok(())
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| TransportError::Internal(e.to_string()))?;

        *self.state.write() = ConnectionState::Closed;
        Ok(())
    }
}

/// Transport factory backed by the webrtc stack
#[derive(Debug, Default)]
pub struct WebRtcTransportFactory;

impl WebRtcTransportFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create_transport(
        &self,
        ice: &IceServerSettings,
        sink: Arc<PlaybackSink>,
    ) -> Result<Arc<dyn MediaTransport>, TransportError> {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(transport_id = %id, ice_url = %ice.url, "Creating WebRTC transport");

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| TransportError::Creation(e.to_string()))?;

        let api = APIBuilder::new().with_media_engine(media_engine).build();

        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: vec![ice.url.clone()],
                username: ice.username.clone(),
                credential: ice.credential.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let peer_connection = api
            .new_peer_connection(config)
            .await
            .map_err(|e| TransportError::Creation(e.to_string()))?;
        let pc = Arc::new(peer_connection);

        let state = Arc::new(RwLock::new(ConnectionState::New));

        // Incoming tracks go straight to the playback surfaces
        let track_sink = sink.clone();
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let kind = match track.kind() {
                RTPCodecType::Audio => TrackKind::Audio,
                _ => TrackKind::Video,
            };
            track_sink.bind_track(kind, track.stream_id());
            Box::pin(async {})
        }));

        // Connection-state transitions are logged only; there is no
        // renegotiation or reconnection protocol.
        let state_ref = state.clone();
        let transport_id = id.clone();
        pc.on_ice_connection_state_change(Box::new(move |ice_state: RTCIceConnectionState| {
            let mapped = match ice_state {
                RTCIceConnectionState::New => ConnectionState::New,
                RTCIceConnectionState::Checking => ConnectionState::Connecting,
                RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
                    ConnectionState::Connected
                },
                RTCIceConnectionState::Disconnected => ConnectionState::Disconnected,
                RTCIceConnectionState::Failed => ConnectionState::Failed,
                RTCIceConnectionState::Closed => ConnectionState::Closed,
                _ => return Box::pin(async {}),
            };

            *state_ref.write() = mapped;
            tracing::info!(transport_id = %transport_id, state = %mapped, "WebRTC connection state");

            match mapped {
                ConnectionState::Connected => {
                    tracing::info!(transport_id = %transport_id, "Connected to avatar service");
                },
                ConnectionState::Disconnected | ConnectionState::Failed => {
                    tracing::warn!(transport_id = %transport_id, "Avatar service disconnected");
                },
                _ => {},
            }

            Box::pin(async {})
        }));

        Ok(Arc::new(AvatarTransport {
            id,
            state,
            peer_connection: pc,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stun_ice() -> IceServerSettings {
        IceServerSettings {
            url: "stun:stun.l.google.com:19302".to_string(),
            username: String::new(),
            credential: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_transport() {
        let factory = WebRtcTransportFactory::new();
        let sink = Arc::new(PlaybackSink::new());

        let transport = factory.create_transport(&stun_ice(), sink).await.unwrap();
        assert_eq!(transport.connection_state(), ConnectionState::New);
    }

    #[tokio::test]
    async fn test_malformed_ice_url_is_creation_error() {
        let factory = WebRtcTransportFactory::new();
        let sink = Arc::new(PlaybackSink::new());
        let ice = IceServerSettings {
            url: "junk://not-an-ice-url".to_string(),
            username: String::new(),
            credential: String::new(),
        };

        let result = factory.create_transport(&ice, sink).await;
        assert!(matches!(result, Err(TransportError::Creation(_))));
    }

    #[tokio::test]
    async fn test_add_bidirectional_media() {
        let factory = WebRtcTransportFactory::new();
        let sink = Arc::new(PlaybackSink::new());
        let transport = factory.create_transport(&stun_ice(), sink).await.unwrap();

        transport.add_bidirectional_media().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_transitions_to_closed() {
        let factory = WebRtcTransportFactory::new();
        let sink = Arc::new(PlaybackSink::new());
        let transport = factory.create_transport(&stun_ice(), sink).await.unwrap();

        transport.close().await.unwrap();
        assert_eq!(transport.connection_state(), ConnectionState::Closed);
    }
}
