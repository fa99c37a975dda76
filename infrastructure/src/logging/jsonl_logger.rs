//! Replay journal on disk.
//!
//! Queue and scheduler events (`intent_enqueued`, `intent_failed`,
//! `intent_rejected`, `intent_projected`, `replay_pass`) land in an
//! append-only file, one JSON object per line, stamped with the event name
//! under `type` and an RFC 3339 `timestamp`.

use quorum_application::ports::event_logger::{EventLogger, LogEvent};
use serde_json::{Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Journal of replay events for one peer.
///
/// Reopening an existing journal appends to it, so history survives a
/// restart of the peer.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventLogger {
    /// Open the journal at `path`, creating it and its directory if needed.
    ///
    /// `None` when the file cannot be opened; callers fall back to no
    /// journal rather than failing the queue.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(dir = %parent.display(), error = %e, "Cannot create journal directory");
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open journal");
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Flatten an event into its journal line. Object payloads carry their
/// fields at top level; anything else goes under `data`.
fn journal_line(event: LogEvent) -> Option<String> {
    let timestamp = event
        .timestamp
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let record = match event.payload {
        Value::Object(mut fields) => {
            fields.insert("type".to_string(), Value::String(event.event_type.to_string()));
            fields.insert("timestamp".to_string(), Value::String(timestamp));
            Value::Object(fields)
        }
        data => json!({
            "type": event.event_type,
            "timestamp": timestamp,
            "data": data,
        }),
    };
    serde_json::to_string(&record).ok()
}

impl EventLogger for JsonlEventLogger {
    fn log(&self, event: LogEvent) {
        let Some(line) = journal_line(event) else {
            return;
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // One flush per line: a crash loses at most the event being written
        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            warn!(path = %self.path.display(), error = %e, "Journal write failed");
        }
    }
}

impl Drop for JsonlEventLogger {
    fn drop(&mut self) {
        let _ = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush();
    }
}
