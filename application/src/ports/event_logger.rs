//! Port for the structured replay journal.
//!
//! Defines the [`EventLogger`] trait for recording queue and projection
//! events (intent enqueued, projected, failed, replay pass summary) to a
//! structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port keeps a machine-readable
//! record (JSONL) of what happened to every intent.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A structured journal event.
///
/// Each event has a type string, a UTC timestamp, and a JSON payload
/// containing event-specific fields.
pub struct LogEvent {
    /// Event type identifier (e.g., "intent_enqueued", "replay_pass").
    pub event_type: &'static str,
    pub timestamp: DateTime<Utc>,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl LogEvent {
    /// Create a new event stamped with the current UTC time.
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Port for logging journal events.
///
/// Implementations write each event as a single record (e.g., one JSONL line).
/// `log` is synchronous and infallible; logging failures are dropped so the
/// queue never stalls on its journal.
pub trait EventLogger: Send + Sync {
    fn log(&self, event: LogEvent);
}

/// No-op implementation for tests and when the journal is disabled.
pub struct NoEventLogger;

impl EventLogger for NoEventLogger {
    fn log(&self, _event: LogEvent) {}
}
