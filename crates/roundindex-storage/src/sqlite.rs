//! SQLite storage backend for RoundIndex.
//!
//! Persists entities and checkpoints to a single SQLite file.
//! Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! # Usage
//! ```rust,no_run
//! use roundindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./rounds.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use roundindex_core::checkpoint::{Checkpoint, CheckpointStore};
use roundindex_core::entity::EntityKind;
use roundindex_core::error::IndexerError;
use roundindex_core::store::EntityStore;

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// SQLite-backed storage for entities and checkpoints.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./rounds.db"`) or a full
    /// SQLite URL (`"sqlite:./rounds.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let storage = Self { pool };
        storage.init_schema().await?;
        debug!(path, "sqlite storage opened");
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Pinned to one connection so every query sees the same database.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entities (
                kind TEXT NOT NULL,
                id   TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (kind, id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                chain_id     TEXT    NOT NULL,
                indexer_id   TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                log_index    INTEGER NOT NULL,
                tx_hash      TEXT    NOT NULL,
                updated_at   INTEGER NOT NULL,
                PRIMARY KEY (chain_id, indexer_id)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    /// Number of stored records of every kind, including empty kinds.
    pub async fn kind_counts(&self) -> Result<Vec<(EntityKind, u64)>, IndexerError> {
        let rows = sqlx::query("SELECT kind, COUNT(*) AS cnt FROM entities GROUP BY kind")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let mut counts: Vec<(EntityKind, u64)> =
            EntityKind::ALL.iter().map(|kind| (*kind, 0)).collect();
        for row in rows {
            let kind: String = row.get("kind");
            let cnt: i64 = row.get("cnt");
            if let Some(slot) = counts.iter_mut().find(|(k, _)| k.as_str() == kind) {
                slot.1 = cnt as u64;
            }
        }
        Ok(counts)
    }

    fn parse_body(kind: EntityKind, id: &str, body: &str) -> Result<serde_json::Value, IndexerError> {
        serde_json::from_str(body).map_err(|e| IndexerError::Serialization {
            kind,
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl EntityStore for SqliteStorage {
    async fn get(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, IndexerError> {
        let row = sqlx::query("SELECT body FROM entities WHERE kind = ? AND id = ?")
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        row.map(|r| Self::parse_body(kind, id, &r.get::<String, _>("body")))
            .transpose()
    }

    async fn put(
        &self,
        kind: EntityKind,
        id: &str,
        record: serde_json::Value,
    ) -> Result<(), IndexerError> {
        let body = serde_json::to_string(&record).map_err(|e| IndexerError::Serialization {
            kind,
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        sqlx::query("INSERT OR REPLACE INTO entities (kind, id, body) VALUES (?, ?, ?)")
            .bind(kind.as_str())
            .bind(id)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn remove(&self, kind: EntityKind, id: &str) -> Result<bool, IndexerError> {
        let result = sqlx::query("DELETE FROM entities WHERE kind = ? AND id = ?")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self, kind: EntityKind) -> Result<Vec<serde_json::Value>, IndexerError> {
        let rows = sqlx::query("SELECT id, body FROM entities WHERE kind = ? ORDER BY id")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        rows.iter()
            .map(|r| {
                let id: String = r.get("id");
                Self::parse_body(kind, &id, &r.get::<String, _>("body"))
            })
            .collect()
    }
}

// ─── CheckpointStore impl ────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for SqliteStorage {
    async fn load_checkpoint(
        &self,
        chain_id: &str,
        indexer_id: &str,
    ) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT chain_id, indexer_id, block_number, log_index, tx_hash, updated_at
             FROM checkpoints WHERE chain_id = ? AND indexer_id = ?",
        )
        .bind(chain_id)
        .bind(indexer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|r| Checkpoint {
            chain_id: r.get("chain_id"),
            indexer_id: r.get("indexer_id"),
            block_number: r.get::<i64, _>("block_number") as u64,
            log_index: r.get::<i64, _>("log_index") as u32,
            tx_hash: r.get("tx_hash"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints
             (chain_id, indexer_id, block_number, log_index, tx_hash, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.chain_id)
        .bind(&checkpoint.indexer_id)
        .bind(checkpoint.block_number as i64)
        .bind(checkpoint.log_index as i64)
        .bind(&checkpoint.tx_hash)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(
            chain_id = %checkpoint.chain_id,
            indexer_id = %checkpoint.indexer_id,
            block = checkpoint.block_number,
            log_index = checkpoint.log_index,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete_checkpoint(&self, chain_id: &str, indexer_id: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM checkpoints WHERE chain_id = ? AND indexer_id = ?")
            .bind(chain_id)
            .bind(indexer_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, I256, U256};
    use roundindex_core::entity::{Account, Balance, RoundCreator};
    use roundindex_core::store::EntityStoreExt;

    fn checkpoint(indexer_id: &str, block_number: u64, log_index: u32) -> Checkpoint {
        Checkpoint {
            chain_id: "ethereum".into(),
            indexer_id: indexer_id.into(),
            block_number,
            log_index,
            tx_hash: format!("0x{block_number:064x}"),
            updated_at: 1_700_000_000,
        }
    }

    // ── CheckpointStore ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save_checkpoint(checkpoint("rounds", 1_000, 4)).await.unwrap();

        let loaded = store.load_checkpoint("ethereum", "rounds").await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint("rounds", 1_000, 4));
    }

    #[tokio::test]
    async fn checkpoint_upsert() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save_checkpoint(checkpoint("rounds", 100, 0)).await.unwrap();
        store.save_checkpoint(checkpoint("rounds", 200, 9)).await.unwrap();

        // Only one row; second save overwrites the first
        let loaded = store.load_checkpoint("ethereum", "rounds").await.unwrap().unwrap();
        assert_eq!(loaded.position(), (200, 9));
    }

    #[tokio::test]
    async fn checkpoint_missing_and_delete() {
        let store = SqliteStorage::in_memory().await.unwrap();
        assert!(store.load_checkpoint("ethereum", "nope").await.unwrap().is_none());

        store.save_checkpoint(checkpoint("del-test", 500, 1)).await.unwrap();
        store.delete_checkpoint("ethereum", "del-test").await.unwrap();
        assert!(store.load_checkpoint("ethereum", "del-test").await.unwrap().is_none());
    }

    // ── EntityStore ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn entity_save_load_replace() {
        let store = SqliteStorage::in_memory().await.unwrap();
        let mut balance = Balance {
            id: "0xr-0xa".into(),
            round: "0xr".into(),
            asset: "0xa".into(),
            balance: I256::from_raw(U256::from(30)),
            updated_at: 1,
        };
        store.save(&balance).await.unwrap();

        balance.balance = -I256::from_raw(U256::from(5));
        balance.updated_at = 2;
        store.save(&balance).await.unwrap();

        let loaded: Balance = store.load("0xr-0xa").await.unwrap().unwrap();
        assert_eq!(loaded, balance);
        assert_eq!(store.count(EntityKind::Balance).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn kinds_are_separate_tables() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save(&Account::new("0x01")).await.unwrap();
        assert!(store.exists::<Account>("0x01").await.unwrap());
        assert!(!store.exists::<RoundCreator>("0x01").await.unwrap());
    }

    #[tokio::test]
    async fn scan_is_ordered_and_remove_reports_presence() {
        let store = SqliteStorage::in_memory().await.unwrap();
        for byte in [0x03u8, 0x01, 0x02] {
            let id = format!("{:#x}", Address::repeat_byte(byte));
            store.save(&Account::new(id)).await.unwrap();
        }

        let accounts: Vec<Account> = store.all().await.unwrap();
        let ids: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        assert!(store.delete::<Account>(&accounts[0].id).await.unwrap());
        assert!(!store.delete::<Account>(&accounts[0].id).await.unwrap());

        let counts = store.kind_counts().await.unwrap();
        assert_eq!(counts.len(), EntityKind::ALL.len());
        assert!(counts.contains(&(EntityKind::Account, 2)));
        assert!(counts.contains(&(EntityKind::House, 0)));
    }

    #[tokio::test]
    async fn entities_and_checkpoints_share_one_database() {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.save(&Account::new("0x0a")).await.unwrap();
        store.save_checkpoint(checkpoint("rounds", 7, 1)).await.unwrap();

        let account: Option<Account> = store.load("0x0a").await.unwrap();
        assert!(account.is_some());
        let cp = store.load_checkpoint("ethereum", "rounds").await.unwrap().unwrap();
        assert_eq!(cp.position(), (7, 1));

        assert!(store.delete::<Account>("0x0a").await.unwrap());
        store.delete_checkpoint("ethereum", "rounds").await.unwrap();
        assert_eq!(store.count(EntityKind::Account).await.unwrap(), 0);
        assert!(store.load_checkpoint("ethereum", "rounds").await.unwrap().is_none());
    }
}
