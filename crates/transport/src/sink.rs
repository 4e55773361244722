//! Media sink: binds incoming remote tracks to playback surfaces
//!
//! Playback itself is delegated to the host media pipeline; the sink only
//! records which remote stream each surface plays and with which flags.
//! Binding is idempotent per track kind: the last binding wins.

use parking_lot::RwLock;

/// Kind of a remote media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// A remote stream bound to a playback surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackBinding {
    /// Identifier of the bound remote stream
    pub stream_id: String,
    pub autoplay: bool,
    /// Inline (non-fullscreen) playback
    pub plays_inline: bool,
    pub muted: bool,
}

/// Playback surfaces for avatar audio and video
///
/// Owned exclusively by whichever session is active.
#[derive(Debug, Default)]
pub struct PlaybackSink {
    video: RwLock<Option<TrackBinding>>,
    audio: RwLock<Option<TrackBinding>>,
}

impl PlaybackSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an incoming track to its playback surface
    ///
    /// Video binds with autoplay and inline playback. Audio additionally
    /// unmutes so synthesized speech is audible immediately.
    pub fn bind_track(&self, kind: TrackKind, stream_id: impl Into<String>) {
        let stream_id = stream_id.into();
        tracing::info!(kind = %kind, stream_id = %stream_id, "Binding remote track to playback");

        match kind {
            TrackKind::Video => {
                *self.video.write() = Some(TrackBinding {
                    stream_id,
                    autoplay: true,
                    plays_inline: true,
                    muted: false,
                });
            },
            TrackKind::Audio => {
                *self.audio.write() = Some(TrackBinding {
                    stream_id,
                    autoplay: true,
                    plays_inline: true,
                    muted: false,
                });
            },
        }
    }

    /// Explicitly unmute the audio surface; applied before every speak
    pub fn unmute_audio(&self) {
        if let Some(binding) = self.audio.write().as_mut() {
            binding.muted = false;
        }
    }

    pub fn video_binding(&self) -> Option<TrackBinding> {
        self.video.read().clone()
    }

    pub fn audio_binding(&self) -> Option<TrackBinding> {
        self.audio.read().clone()
    }

    /// Drop both bindings when the owning session ends
    pub fn release(&self) {
        *self.video.write() = None;
        *self.audio.write() = None;
    }
}
