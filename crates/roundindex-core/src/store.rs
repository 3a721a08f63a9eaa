//! Entity store port.
//!
//! Backends implement the raw, object-safe [`EntityStore`] trait over JSON
//! records keyed by `(EntityKind, id)`. Handlers use the typed
//! [`EntityStoreExt`] methods layered on top of it.
//!
//! Every call is complete when it returns: a `put` is visible to the next
//! `get`, in the same event or any later one.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::entity::{Entity, EntityKind};
use crate::error::IndexerError;

/// Raw keyed record storage, one logical table per [`EntityKind`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch a record, `None` if absent.
    async fn get(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, IndexerError>;

    /// Insert or replace a record.
    async fn put(
        &self,
        kind: EntityKind,
        id: &str,
        record: serde_json::Value,
    ) -> Result<(), IndexerError>;

    /// Delete a record. Returns `true` if it existed.
    async fn remove(&self, kind: EntityKind, id: &str) -> Result<bool, IndexerError>;

    /// All records of a kind, ordered by id.
    async fn scan(&self, kind: EntityKind) -> Result<Vec<serde_json::Value>, IndexerError>;
}

fn decode<E: Entity>(id: &str, value: serde_json::Value) -> Result<E, IndexerError> {
    serde_json::from_value(value).map_err(|e| IndexerError::Serialization {
        kind: E::KIND,
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Typed load/save/delete on top of any [`EntityStore`].
#[async_trait]
pub trait EntityStoreExt: EntityStore {
    async fn load<E: Entity>(&self, id: &str) -> Result<Option<E>, IndexerError> {
        match self.get(E::KIND, id).await? {
            Some(value) => decode(id, value).map(Some),
            None => Ok(None),
        }
    }

    async fn exists<E: Entity>(&self, id: &str) -> Result<bool, IndexerError> {
        Ok(self.get(E::KIND, id).await?.is_some())
    }

    async fn save<E: Entity>(&self, entity: &E) -> Result<(), IndexerError> {
        let value = serde_json::to_value(entity).map_err(|e| IndexerError::Serialization {
            kind: E::KIND,
            id: entity.id().to_string(),
            reason: e.to_string(),
        })?;
        self.put(E::KIND, entity.id(), value).await
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<bool, IndexerError> {
        self.remove(E::KIND, id).await
    }

    async fn all<E: Entity>(&self) -> Result<Vec<E>, IndexerError> {
        self.scan(E::KIND)
            .await?
            .into_iter()
            .map(|value| decode(E::KIND.as_str(), value))
            .collect()
    }

    /// All records of `E` matching `pred`, ordered by id.
    async fn find<E, F>(&self, pred: F) -> Result<Vec<E>, IndexerError>
    where
        E: Entity,
        F: Fn(&E) -> bool + Send + Sync,
    {
        Ok(self.all::<E>().await?.into_iter().filter(|e| pred(e)).collect())
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, IndexerError> {
        Ok(self.scan(kind).await?.len())
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// In-memory entity store for tests and ephemeral runs.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryEntityStore {
    tables: Mutex<HashMap<EntityKind, BTreeMap<String, serde_json::Value>>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<EntityKind, BTreeMap<String, serde_json::Value>>>, IndexerError>
    {
        self.tables
            .lock()
            .map_err(|_| IndexerError::Storage("entity table lock poisoned".into()))
    }

    /// Total number of records across all kinds.
    pub fn len(&self) -> usize {
        self.tables()
            .map(|t| t.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<serde_json::Value>, IndexerError> {
        Ok(self.tables()?.get(&kind).and_then(|t| t.get(id)).cloned())
    }

    async fn put(
        &self,
        kind: EntityKind,
        id: &str,
        record: serde_json::Value,
    ) -> Result<(), IndexerError> {
        self.tables()?
            .entry(kind)
            .or_default()
            .insert(id.to_string(), record);
        Ok(())
    }

    async fn remove(&self, kind: EntityKind, id: &str) -> Result<bool, IndexerError> {
        Ok(self
            .tables()?
            .get_mut(&kind)
            .map(|t| t.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn scan(&self, kind: EntityKind) -> Result<Vec<serde_json::Value>, IndexerError> {
        Ok(self
            .tables()?
            .get(&kind)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}
