//! Avatar synthesis lifecycle events

use avatar_agent_config::constants::synthesis::TICKS_PER_MS;
use serde::Deserialize;

/// Lifecycle event reported by the synthesis engine
///
/// Offsets arrive in the engine's native 100 ns ticks, measured from
/// session start; zero means no offset was reported.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvatarEvent {
    pub description: String,
    #[serde(default)]
    pub offset_ticks: u64,
}

/// Convert an engine offset from 100 ns ticks to milliseconds
pub fn offset_ms(offset_ticks: u64) -> u64 {
    offset_ticks / TICKS_PER_MS
}

/// Log one lifecycle event, with the elapsed offset when available
pub fn log_event(event: &AvatarEvent) {
    if event.offset_ticks == 0 {
        tracing::info!(description = %event.description, "Avatar event received");
    } else {
        tracing::info!(
            description = %event.description,
            offset_ms = offset_ms(event.offset_ticks),
            "Avatar event received"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_to_ms_conversion() {
        assert_eq!(offset_ms(10_000), 1);
        assert_eq!(offset_ms(250_000), 25);
        assert_eq!(offset_ms(0), 0);
        // Sub-millisecond offsets truncate
        assert_eq!(offset_ms(9_999), 0);
    }

    #[test]
    fn test_event_deserialization() {
        let event: AvatarEvent =
            serde_json::from_str(r#"{"description":"SwitchToIdle","offsetTicks":250000}"#).unwrap();
        assert_eq!(event.description, "SwitchToIdle");
        assert_eq!(event.offset_ticks, 250_000);
    }

    #[test]
    fn test_event_without_offset() {
        let event: AvatarEvent = serde_json::from_str(r#"{"description":"TurnStart"}"#).unwrap();
        assert_eq!(event.offset_ticks, 0);
    }
}
