//! Session lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle state of the avatar session
///
/// Transitions: `Idle -> Starting -> Active -> Stopping -> Idle`.
/// A failed start returns directly to `Idle`; the session is never left
/// in `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

impl SessionState {
    /// A new session may only be started from `Idle`
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Stop is meaningful from `Active` or `Starting`
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Active | Self::Starting)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}
