//! Reply content policy
//!
//! Certain reply phrases indicate the assistant is handling sensitive
//! credentials. When one appears, the user's pending input buffer is
//! discarded so captured secrets do not linger client-side. The reply
//! itself is displayed and spoken unchanged.

use avatar_agent_config::constants::policy::SENSITIVE_MARKERS;

/// True when the reply contains any sensitive-content marker
pub fn contains_sensitive_marker(reply: &str) -> bool {
    SENSITIVE_MARKERS.iter().any(|marker| reply.contains(marker))
}
