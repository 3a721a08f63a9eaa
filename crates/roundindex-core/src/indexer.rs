//! Indexer configuration and the driver that feeds ordered logs through the
//! router while keeping a checkpoint.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::U256;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, CheckpointManager, CheckpointStore};
use crate::entity::GovPowerStrategyType;
use crate::error::IndexerError;
use crate::events::LogEvent;
use crate::router::{Dispatch, EventRouter};
use crate::store::EntityStore;

/// Configuration for an indexer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Unique name for this indexer (used for checkpoint keys).
    pub id: String,
    /// Chain to index (e.g. `"ethereum"`).
    pub chain: String,
    /// How often to save a checkpoint (every N processed logs).
    pub checkpoint_interval: u64,
    /// Known voting strategy contracts, keyed by address (`0x`-hex or decimal).
    pub strategy_types: HashMap<String, GovPowerStrategyType>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            id: "prop-house".into(),
            chain: "ethereum".into(),
            checkpoint_interval: 100,
            strategy_types: HashMap::new(),
        }
    }
}

impl IndexerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = chain.into();
        self
    }

    pub fn checkpoint_interval(mut self, n: u64) -> Self {
        self.checkpoint_interval = n;
        self
    }

    /// Register the type of a known strategy contract.
    pub fn strategy(mut self, address: impl Into<String>, kind: GovPowerStrategyType) -> Self {
        self.strategy_types.insert(address.into(), kind);
        self
    }

    /// Type of the strategy at `address`; unconfigured addresses are `Unknown`.
    pub fn strategy_type(&self, address: &U256) -> GovPowerStrategyType {
        self.strategy_types
            .iter()
            .find(|(key, _)| U256::from_str(key.trim()).ok().as_ref() == Some(address))
            .map(|(_, kind)| *kind)
            .unwrap_or_default()
    }
}

/// Counters for one indexer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Events whose handler ran to completion.
    pub applied: u64,
    /// Events the router skipped.
    pub skipped: u64,
    /// Events at or before the checkpoint that were not routed again.
    pub replayed: u64,
}

/// Feeds logs, in chain order, to an [`EventRouter`].
pub struct Indexer {
    router: EventRouter,
    checkpoints: CheckpointManager,
    /// Position of the last log handled, from the checkpoint or this session.
    cursor: Option<(u64, u32)>,
    stats: IndexStats,
}

impl Indexer {
    pub fn new(
        store: Arc<dyn EntityStore>,
        checkpoints: Box<dyn CheckpointStore>,
        config: IndexerConfig,
    ) -> Self {
        let checkpoints = CheckpointManager::new(
            checkpoints,
            config.chain.clone(),
            config.id.clone(),
            config.checkpoint_interval,
        );
        Self {
            router: EventRouter::new(store, config),
            checkpoints,
            cursor: None,
            stats: IndexStats::default(),
        }
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Load the saved checkpoint; logs at or before it will be skipped.
    pub async fn resume(&mut self) -> Result<Option<Checkpoint>, IndexerError> {
        let checkpoint = self.checkpoints.load().await?;
        match &checkpoint {
            Some(cp) => {
                self.cursor = Some(cp.position());
                tracing::info!(
                    indexer = %self.router.config().id,
                    block = cp.block_number,
                    log_index = cp.log_index,
                    "resuming from checkpoint"
                );
            }
            None => {
                tracing::info!(indexer = %self.router.config().id, "no checkpoint, starting fresh");
            }
        }
        Ok(checkpoint)
    }

    /// Route one event unless it was already handled.
    pub async fn process(&mut self, event: &LogEvent) -> Result<Option<Dispatch>, IndexerError> {
        let position = event.meta.position();
        if self.cursor.is_some_and(|cursor| position <= cursor) {
            self.stats.replayed += 1;
            tracing::trace!(
                block = position.0,
                log_index = position.1,
                "log at or before checkpoint, not routed"
            );
            return Ok(None);
        }

        let outcome = self.router.route(event).await?;
        if outcome.is_applied() {
            self.stats.applied += 1;
        } else {
            self.stats.skipped += 1;
        }
        self.cursor = Some(position);
        self.checkpoints
            .record(position.0, position.1, &event.meta.tx_key())
            .await?;
        Ok(Some(outcome))
    }

    /// Drain `events` in order, then save the final checkpoint.
    pub async fn run<S>(&mut self, events: S) -> Result<IndexStats, IndexerError>
    where
        S: Stream<Item = Result<LogEvent, IndexerError>>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.process(&event?).await?;
        }
        self.finish().await
    }

    /// Persist the latest position.
    pub async fn finish(&mut self) -> Result<IndexStats, IndexerError> {
        self.checkpoints.flush().await?;
        tracing::info!(
            indexer = %self.router.config().id,
            applied = self.stats.applied,
            skipped = self.stats.skipped,
            replayed = self.stats.replayed,
            "indexer finished"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};

    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::events::{ContractFamily, EventPayload, LogMeta};
    use crate::store::MemoryEntityStore;

    fn cancel_at(block_number: u64, log_index: u32) -> LogEvent {
        LogEvent {
            family: ContractFamily::Round,
            meta: LogMeta {
                address: Address::new([0x70; 20]),
                tx_hash: B256::new([0x02; 32]),
                log_index,
                block_number,
                block_timestamp: 1_700_000_000,
            },
            payload: EventPayload::RoundCancelled,
        }
    }

    #[tokio::test]
    async fn logs_at_or_before_the_cursor_are_not_routed() {
        let mut indexer = Indexer::new(
            Arc::new(MemoryEntityStore::new()),
            Box::new(MemoryCheckpointStore::new()),
            IndexerConfig::default(),
        );
        assert!(indexer.process(&cancel_at(10, 2)).await.unwrap().is_some());
        assert!(indexer.process(&cancel_at(10, 2)).await.unwrap().is_none());
        assert!(indexer.process(&cancel_at(9, 50)).await.unwrap().is_none());
        assert!(indexer.process(&cancel_at(10, 3)).await.unwrap().is_some());
        assert!(indexer.process(&cancel_at(11, 0)).await.unwrap().is_some());

        let stats = indexer.stats();
        assert_eq!(stats.replayed, 2);
        // Cancelling an unknown round is a soft failure.
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.applied, 0);
    }

    #[test]
    fn config_defaults() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.chain, "ethereum");
        assert_eq!(cfg.checkpoint_interval, 100);
        assert!(cfg.strategy_types.is_empty());
    }

    #[test]
    fn config_builder() {
        let cfg = IndexerConfig::new()
            .id("houses")
            .chain("base")
            .checkpoint_interval(10)
            .strategy("0xabc", GovPowerStrategyType::Vanilla);
        assert_eq!(cfg.id, "houses");
        assert_eq!(cfg.chain, "base");
        assert_eq!(cfg.checkpoint_interval, 10);
        assert_eq!(cfg.strategy_types.len(), 1);
    }

    #[test]
    fn strategy_lookup_accepts_hex_and_decimal_keys() {
        let cfg = IndexerConfig::new()
            .strategy("0x0000000000000000000000000000000000000abc", GovPowerStrategyType::Allowlist)
            .strategy("42", GovPowerStrategyType::BalanceOf);
        assert_eq!(cfg.strategy_type(&U256::from(0xabc)), GovPowerStrategyType::Allowlist);
        assert_eq!(cfg.strategy_type(&U256::from(42)), GovPowerStrategyType::BalanceOf);
        assert_eq!(cfg.strategy_type(&U256::from(7)), GovPowerStrategyType::Unknown);
    }

    #[test]
    fn config_json_fills_missing_fields() {
        let cfg: IndexerConfig =
            serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(cfg.id, "x");
        assert_eq!(cfg.chain, "ethereum");

        let cfg: IndexerConfig =
            serde_json::from_str(r#"{"strategy_types":{"0x01":"VANILLA"}}"#).unwrap();
        assert_eq!(cfg.strategy_type(&U256::from(1)), GovPowerStrategyType::Vanilla);
    }
}
