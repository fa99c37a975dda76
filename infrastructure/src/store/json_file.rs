//! File-backed intent store.
//!
//! The whole queue is one JSON document. Saves go to a sibling temp file
//! that is then renamed over the original, so a crash mid-save leaves
//! either the old or the new queue on disk, never a torn one.

use quorum_application::ports::intent_store::{IntentStore, StoreError};
use quorum_domain::VoteIntentRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct QueueFile {
    version: u32,
    intents: Vec<VoteIntentRecord>,
}

/// Intent store persisted to a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileIntentStore {
    path: PathBuf,
}

impl JsonFileIntentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "intents.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl IntentStore for JsonFileIntentStore {
    fn load(&self) -> Result<Vec<VoteIntentRecord>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", self.path.display()))),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let file: QueueFile = serde_json::from_str(&content)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display())))?;
        if file.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "{}: unsupported format version {}",
                self.path.display(),
                file.version
            )));
        }
        debug!(path = %self.path.display(), intents = file.intents.len(), "Loaded intent queue");
        Ok(file.intents)
    }

    fn save(&self, records: &[VoteIntentRecord]) -> Result<(), StoreError> {
        let io_err = |e: std::io::Error| StoreError::Io(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let body = serde_json::to_vec_pretty(&QueueFile {
            version: FORMAT_VERSION,
            intents: records.to_vec(),
        })
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&temp, &self.path).map_err(io_err)
    }
}
