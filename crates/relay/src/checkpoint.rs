//! Last poll boundary, persisted to a single file.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::{alerta::timestamp, Result};

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored checkpoint, or `None` on first run. An unreadable file
    /// is reported and treated as absent.
    pub async fn read(&self) -> Option<DateTime<Utc>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                return None;
            }
        };

        match timestamp::parse(&contents) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!("Ignoring checkpoint {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Replace the checkpoint. Written to a sibling file and renamed into place.
    pub async fn write(&self, checkpoint: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, timestamp::format(&checkpoint)).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Checkpoint {} written to {}", timestamp::format(&checkpoint), self.path.display());
        Ok(())
    }
}
