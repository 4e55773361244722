//! Centralized constants for the avatar agent
//!
//! Single source of truth for fixed strings and reply policy markers
//! used across crates.

/// Canned replies recorded in the transcript
pub mod replies {
    /// Recorded when the backend reply is missing, empty, or not a string
    pub const NOT_UNDERSTOOD: &str = "Sorry, I didn't understand that.";

    /// Recorded when the backend call itself fails
    pub const BACKEND_UNREACHABLE: &str = "There was an error communicating with the backend.";
}

/// Reply policy for sensitive content
pub mod policy {
    /// Substrings in a reply that indicate sensitive content is being
    /// requested. A match clears the pending input buffer; the displayed
    /// reply itself is not redacted.
    pub const SENSITIVE_MARKERS: &[&str] = &["Aadhaar card number", "OTP"];
}

/// Synthesis engine time units
pub mod synthesis {
    /// The speech service reports event offsets in 100 ns ticks
    pub const TICKS_PER_MS: u64 = 10_000;
}
