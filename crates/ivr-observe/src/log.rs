//! The append-only activity log.
//!
//! Every write goes through [`ActivityLog::record`], which assigns the next
//! sequence number, appends one line to the log file, and broadcasts the
//! entry to live subscribers. [`ActivityLog::clear`] truncates the file when a
//! call ends so a tailing viewer starts fresh.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use ivr_types::Role;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};

use crate::error::ObserveError;
use crate::event::{ActivityEntry, ActivityEvent};

/// Default capacity of the live broadcast channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: Mutex<File>,
    seq: AtomicU64,
    tx: broadcast::Sender<ActivityEvent>,
}

impl ActivityLog {
    /// Opens (or creates) the log file in append mode, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::Io` if the directory or file cannot be created.
    pub async fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, ObserveError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, _) = broadcast::channel(capacity.max(1));

        tracing::info!(path = %path.display(), "activity log opened");

        Ok(Self {
            path,
            file: Mutex::new(file),
            seq: AtomicU64::new(0),
            tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry, flushes it, and broadcasts it.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::Io` if the line cannot be written.
    pub async fn record(
        &self,
        call_id: &str,
        role: Role,
        text: &str,
    ) -> Result<ActivityEntry, ObserveError> {
        let mut file = self.file.lock().await;

        // Assigned under the file lock so file order matches sequence order.
        let entry = ActivityEntry {
            seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
            call_id: call_id.to_string(),
            role,
            text: text.to_string(),
            occurred_at: Utc::now(),
        };

        let mut line = entry.to_line();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        if self.tx.send(ActivityEvent::Entry(entry.clone())).is_err() {
            tracing::trace!(seq = entry.seq, "no live activity subscribers");
        }

        Ok(entry)
    }

    /// Truncates the log file. Sequence numbers keep counting.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::Io` if the file cannot be truncated.
    pub async fn clear(&self, call_id: &str) -> Result<(), ObserveError> {
        let file = self.file.lock().await;
        file.set_len(0).await?;
        drop(file);

        tracing::info!(call_sid = %call_id, "call ended, activity log cleared");

        let _ = self.tx.send(ActivityEvent::Cleared {
            call_id: call_id.to_string(),
        });
        Ok(())
    }

    /// Subscribes to entries and clears as they happen.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }
}
