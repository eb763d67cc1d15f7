//! Durable batch store
//!
//! Owns the lifecycle of batches: creation, status transitions, persistence
//! to per-batch JSON records, reload on startup and discovery of interrupted
//! work. All in-memory state sits behind one store-wide reader/writer lock;
//! persistence happens while the write lock for a mutation is still held, so
//! a subsequent reader always observes a state consistent with what was just
//! written to disk.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::core::constants::{storage, timeouts};
use crate::core::error::{LinkProbeError, Result};
use crate::prober::LinkResult;

/// Lifecycle state of a batch. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
}

impl BatchStatus {
    /// Whether this batch needs no further work.
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Pending => write!(f, "pending"),
            BatchStatus::Processing => write!(f, "processing"),
            BatchStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One unit of probing work: a fixed URL list tracked through one lifecycle.
///
/// `results` is empty until the batch completes, after which it has the same
/// length as `urls` with `results[i]` describing `urls[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    #[serde(rename = "batch_id")]
    pub id: u64,
    pub urls: Vec<String>,
    pub results: Vec<LinkResult>,
    pub created_at: DateTime<Utc>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    batches: HashMap<u64, Batch>,
    next_id: u64,
}

/// File-backed batch store indexed in memory.
#[derive(Debug)]
pub struct BatchStore {
    data_dir: PathBuf,
    inner: RwLock<StoreInner>,
}

impl BatchStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed
    /// and reloading every persisted record found there.
    ///
    /// Corrupt or partially written records are skipped with a warning; a
    /// missing counter record starts the id sequence at 1.
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut inner = StoreInner {
            batches: HashMap::new(),
            next_id: storage::FIRST_BATCH_ID,
        };

        let next_id_path = data_dir.join(storage::NEXT_ID_FILE);
        if let Ok(data) = tokio::fs::read(&next_id_path).await {
            match serde_json::from_slice::<u64>(&data) {
                Ok(next_id) => inner.next_id = next_id,
                Err(err) => warn!("ignoring corrupt counter record: {err}"),
            }
        }

        let mut entries = tokio::fs::read_dir(&data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with(storage::BATCH_FILE_PREFIX)
                || !name.ends_with(storage::RECORD_EXTENSION)
            {
                continue;
            }

            let data = match tokio::fs::read(entry.path()).await {
                Ok(data) => data,
                Err(err) => {
                    warn!("skipping unreadable batch record {name}: {err}");
                    continue;
                }
            };
            match serde_json::from_slice::<Batch>(&data) {
                Ok(batch) => {
                    inner.batches.insert(batch.id, batch);
                }
                Err(err) => warn!("skipping corrupt batch record {name}: {err}"),
            }
        }

        info!(
            "store loaded {} batch(es) from {}",
            inner.batches.len(),
            data_dir.display()
        );

        Ok(Self {
            data_dir,
            inner: RwLock::new(inner),
        })
    }

    /// Allocate a new id and persist a pending batch with empty results.
    pub async fn create_batch(&self, urls: Vec<String>) -> Result<u64> {
        let mut inner = self.inner.write().await;

        let batch = Batch {
            id: inner.next_id,
            urls,
            results: Vec::new(),
            created_at: Utc::now(),
            status: BatchStatus::Pending,
            error: None,
        };
        let id = batch.id;
        inner.batches.insert(id, batch);
        inner.next_id += 1;

        // Persist the record and the advanced counter before the lock is
        // released, so the counter on disk is never behind a handed-out id.
        self.persist_batch(&inner.batches[&id]).await?;
        self.persist_next_id(inner.next_id).await?;

        Ok(id)
    }

    /// Look up a single batch by id.
    pub async fn get_batch(&self, id: u64) -> Result<Batch> {
        let inner = self.inner.read().await;
        inner
            .batches
            .get(&id)
            .cloned()
            .ok_or(LinkProbeError::BatchNotFound(id))
    }

    /// Look up a set of batches, silently omitting unknown ids.
    pub async fn get_batches(&self, ids: &[u64]) -> Vec<Batch> {
        let inner = self.inner.read().await;
        ids.iter()
            .filter_map(|id| inner.batches.get(id).cloned())
            .collect()
    }

    /// Atomically replace a batch's results and status, then persist.
    pub async fn update_batch(
        &self,
        id: u64,
        results: Vec<LinkResult>,
        status: BatchStatus,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;

        let batch = inner
            .batches
            .get_mut(&id)
            .ok_or(LinkProbeError::BatchNotFound(id))?;
        batch.results = results;
        batch.status = status;

        self.persist_batch(&inner.batches[&id]).await?;

        Ok(())
    }

    /// All batches still awaiting work, discovered at startup for resumption.
    pub async fn list_pending_batches(&self) -> Vec<Batch> {
        let inner = self.inner.read().await;
        let mut pending: Vec<Batch> = inner
            .batches
            .values()
            .filter(|batch| !batch.status.is_terminal())
            .cloned()
            .collect();
        pending.sort_by_key(|batch| batch.id);
        pending
    }

    /// Every known batch, ordered by id.
    pub async fn list_all_batches(&self) -> Vec<Batch> {
        let inner = self.inner.read().await;
        let mut all: Vec<Batch> = inner.batches.values().cloned().collect();
        all.sort_by_key(|batch| batch.id);
        all
    }

    /// Poll until no batch is left pending/processing or the grace window
    /// elapses. Returns how many batches were still outstanding.
    pub async fn wait_for_completion(&self, grace: Duration) -> usize {
        let give_up = tokio::time::Instant::now() + grace;
        let mut poll = tokio::time::interval(Duration::from_millis(timeouts::COMPLETION_POLL_MS));

        loop {
            poll.tick().await;

            let outstanding = {
                let inner = self.inner.read().await;
                inner
                    .batches
                    .values()
                    .filter(|batch| !batch.status.is_terminal())
                    .count()
            };

            if outstanding == 0 {
                info!("all pending batches completed");
                return 0;
            }
            if tokio::time::Instant::now() >= give_up {
                warn!("{outstanding} batch(es) still processing at deadline");
                return outstanding;
            }
        }
    }

    fn batch_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(format!(
            "{}{}.{}",
            storage::BATCH_FILE_PREFIX,
            id,
            storage::RECORD_EXTENSION
        ))
    }

    async fn persist_batch(&self, batch: &Batch) -> Result<()> {
        let data = serde_json::to_vec_pretty(batch)?;
        tokio::fs::write(self.batch_path(batch.id), data).await?;
        Ok(())
    }

    async fn persist_next_id(&self, next_id: u64) -> Result<()> {
        let data = serde_json::to_vec_pretty(&next_id)?;
        tokio::fs::write(self.data_dir.join(storage::NEXT_ID_FILE), data).await?;
        Ok(())
    }
}
