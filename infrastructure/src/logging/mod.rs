//! Logging infrastructure: the structured replay journal.
//!
//! Provides [`JsonlEventLogger`], a JSONL file writer that implements the
//! [`EventLogger`](quorum_application::EventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlEventLogger;
