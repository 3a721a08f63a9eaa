//! Checkpoint manager: persists the position of the last applied log.
//!
//! A checkpoint stores the `(block_number, log_index)` of the last log the
//! indexer processed. On restart, logs at or before that position are not
//! handed to the router again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// A persisted checkpoint for an indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Chain slug (e.g. `"ethereum"`).
    pub chain_id: String,
    /// Unique indexer identifier.
    pub indexer_id: String,
    /// Block of the last processed log.
    pub block_number: u64,
    /// Log index of the last processed log within its block.
    pub log_index: u32,
    /// Transaction of the last processed log.
    pub tx_hash: String,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }
}

/// Trait for storing and loading checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the latest checkpoint for a given chain + indexer pair.
    async fn load_checkpoint(
        &self,
        chain_id: &str,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) a checkpoint.
    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), IndexerError>;

    /// Delete a checkpoint (e.g. when resetting an indexer).
    async fn delete_checkpoint(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn load_checkpoint(
        &self,
        chain_id: &str,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        (**self).load_checkpoint(chain_id, indexer_id).await
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        (**self).save_checkpoint(checkpoint).await
    }

    async fn delete_checkpoint(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        (**self).delete_checkpoint(chain_id, indexer_id).await
    }
}

/// Manages checkpoint reads/writes for an indexer.
pub struct CheckpointManager {
    store: Box<dyn CheckpointStore>,
    chain_id: String,
    indexer_id: String,
    /// How often to save (every N processed logs).
    save_interval: u64,
    /// Logs processed since the last save.
    counter: u64,
    /// Most recent position handed to `record`.
    pending: Option<(u64, u32, String)>,
}

impl CheckpointManager {
    pub fn new(
        store: Box<dyn CheckpointStore>,
        chain_id: impl Into<String>,
        indexer_id: impl Into<String>,
        save_interval: u64,
    ) -> Self {
        Self {
            store,
            chain_id: chain_id.into(),
            indexer_id: indexer_id.into(),
            save_interval: save_interval.max(1),
            counter: 0,
            pending: None,
        }
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        self.store.load_checkpoint(&self.chain_id, &self.indexer_id).await
    }

    /// Note a processed log and save every `save_interval` logs.
    pub async fn record(
        &mut self,
        block_number: u64,
        log_index: u32,
        tx_hash: &str,
    ) -> Result<(), IndexerError> {
        self.pending = Some((block_number, log_index, tx_hash.to_string()));
        self.counter += 1;
        if self.counter >= self.save_interval {
            self.flush().await?;
        }
        Ok(())
    }

    /// Save the most recent recorded position, if any (used on shutdown).
    pub async fn flush(&mut self) -> Result<(), IndexerError> {
        let Some((block_number, log_index, tx_hash)) = self.pending.take() else {
            return Ok(());
        };
        let cp = Checkpoint {
            chain_id: self.chain_id.clone(),
            indexer_id: self.indexer_id.clone(),
            block_number,
            log_index,
            tx_hash,
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.store.save_checkpoint(cp).await?;
        self.counter = 0;
        tracing::debug!(block = block_number, log_index, "checkpoint saved");
        Ok(())
    }

    /// Forget the saved position.
    pub async fn reset(&mut self) -> Result<(), IndexerError> {
        self.pending = None;
        self.counter = 0;
        self.store.delete_checkpoint(&self.chain_id, &self.indexer_id).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(chain_id: &str, indexer_id: &str) -> String {
        format!("{chain_id}:{indexer_id}")
    }

    fn data(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Checkpoint>>, IndexerError> {
        self.data
            .lock()
            .map_err(|_| IndexerError::Storage("checkpoint lock poisoned".into()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load_checkpoint(
        &self,
        chain_id: &str,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.data()?.get(&Self::key(chain_id, indexer_id)).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let key = Self::key(&checkpoint.chain_id, &checkpoint.indexer_id);
        self.data()?.insert(key, checkpoint);
        Ok(())
    }

    async fn delete_checkpoint(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        self.data()?.remove(&Self::key(chain_id, indexer_id));
        Ok(())
    }
}
