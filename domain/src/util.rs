//! Shared utility functions.

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Returns 0 if the system clock is set before the epoch.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
