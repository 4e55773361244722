//! Real-time media transport for the avatar agent
//!
//! Builds the peer-to-peer connection used to receive avatar audio/video
//! and binds incoming remote tracks to playback surfaces. One transport is
//! owned exclusively by the active session and destroyed when it ends.

pub mod sink;
pub mod traits;
pub mod webrtc;

pub use sink::{PlaybackSink, TrackBinding, TrackKind};
pub use traits::{MediaTransport, TransportFactory};
pub use webrtc::{AvatarTransport, WebRtcTransportFactory};

use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// The underlying platform rejected the ICE configuration
    #[error("Failed to create transport: {0}")]
    Creation(String),

    #[error("Media negotiation failed: {0}")]
    Negotiation(String),

    #[error("Transport is closed")]
    Closed,

    #[error("Internal transport error: {0}")]
    Internal(String),
}

/// Connection state of the real-time transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
