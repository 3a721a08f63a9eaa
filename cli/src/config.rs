//! `roundindex.json` run configuration.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use roundindex_core::IndexerConfig;

use crate::logging::LogConfig;

/// Everything `roundindex replay` needs; missing sections take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub indexer: IndexerConfig,
    pub log: LogConfig,
    /// SQLite path or URL. `None` keeps everything in memory.
    pub database: Option<String>,
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use roundindex_core::entity::GovPowerStrategyType;

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: RunConfig = serde_json::from_str(
            r#"{
                "indexer": { "id": "nouns", "strategy_types": { "0x01": "BALANCE_OF" } },
                "log": { "json": true }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.indexer.id, "nouns");
        assert_eq!(cfg.indexer.chain, "ethereum");
        assert_eq!(
            cfg.indexer.strategy_type(&U256::from(1)),
            GovPowerStrategyType::BalanceOf
        );
        assert!(cfg.log.json);
        assert_eq!(cfg.log.level, "info");
        assert!(cfg.database.is_none());
    }

    #[test]
    fn empty_object_is_default() {
        let cfg: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RunConfig::default());
    }
}
