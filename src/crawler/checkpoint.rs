//! Checkpoint persistence for the crawl frontier
//!
//! A checkpoint is a JSON snapshot of the frontier taken only when nothing
//! is in flight. Saves are atomic: the snapshot is written to a temporary
//! file, flushed to disk and renamed over the previous checkpoint, so a
//! crash leaves either the old or the new checkpoint, never a torn one.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Current on-disk checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Checkpoint errors
///
/// A corrupt checkpoint is fatal: resuming from a guess could re-fetch or
/// skip pages, so the crawl refuses to start instead.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Corrupt checkpoint {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Traversal state sufficient to rebuild the frontier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierSnapshot {
    /// Depth of `current_level`
    pub depth: u32,
    /// URLs still to fetch at `depth`, in dispatch order
    pub current_level: Vec<String>,
    /// URLs admitted for `depth + 1`, in discovery order
    pub next_level: Vec<String>,
    /// Every URL the frontier has seen
    pub visited: BTreeSet<String>,
}

impl FrontierSnapshot {
    /// Checks the snapshot's internal consistency
    pub fn validate(&self) -> Result<(), String> {
        let mut queued = HashSet::new();
        for url in self.current_level.iter().chain(&self.next_level) {
            if !queued.insert(url.as_str()) {
                return Err(format!("URL queued twice: {}", url));
            }
            if !self.visited.contains(url) {
                return Err(format!("queued URL missing from visited set: {}", url));
            }
        }
        Ok(())
    }
}

/// On-disk checkpoint envelope
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    version: u32,
    run_id: i64,
    saved_at: String,
    snapshot: FrontierSnapshot,
}

/// Saves and loads the checkpoint of one crawl run
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
    run_id: i64,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>, run_id: i64) -> Self {
        Self {
            dir: dir.into(),
            run_id,
        }
    }

    /// Path of this run's checkpoint file
    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("run-{}.checkpoint.json", self.run_id))
    }

    /// Atomically replaces the checkpoint with `snapshot`
    pub async fn save(&self, snapshot: &FrontierSnapshot) -> Result<(), CheckpointError> {
        let file = CheckpointFile {
            version: CHECKPOINT_VERSION,
            run_id: self.run_id,
            saved_at: Utc::now().to_rfc3339(),
            snapshot: snapshot.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&file)?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path();
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut tmp = tokio::fs::File::create(&tmp_path).await?;
            tmp.write_all(&encoded).await?;
            tmp.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &path).await?;
        sync_dir(&self.dir).await;

        debug!(
            "Checkpoint saved: depth {}, {} current, {} next, {} visited",
            snapshot.depth,
            snapshot.current_level.len(),
            snapshot.next_level.len(),
            snapshot.visited.len()
        );
        Ok(())
    }

    /// Loads the last saved snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No checkpoint has been saved for this run
    /// * `Ok(Some(snapshot))` - The last saved snapshot
    /// * `Err(CheckpointError::Corrupt)` - The file exists but cannot be trusted
    pub async fn load(&self) -> Result<Option<FrontierSnapshot>, CheckpointError> {
        let path = self.path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| CheckpointError::Corrupt {
            path: path.clone(),
            reason,
        };

        let file: CheckpointFile =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;

        if file.version != CHECKPOINT_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {})",
                file.version, CHECKPOINT_VERSION
            )));
        }
        if file.run_id != self.run_id {
            return Err(corrupt(format!(
                "belongs to run {} (expected {})",
                file.run_id, self.run_id
            )));
        }
        file.snapshot.validate().map_err(corrupt)?;

        info!(
            "Loaded checkpoint saved at {} (depth {})",
            file.saved_at, file.snapshot.depth
        );
        Ok(Some(file.snapshot))
    }

    /// Deletes the checkpoint file if present
    pub async fn remove(&self) -> Result<(), CheckpointError> {
        match tokio::fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Flushes the directory entry of a rename; best effort
#[cfg(unix)]
async fn sync_dir(dir: &Path) {
    let synced = match tokio::fs::File::open(dir).await {
        Ok(handle) => handle.sync_all().await,
        Err(e) => Err(e),
    };
    if let Err(e) = synced {
        debug!("Could not fsync checkpoint directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) {}
