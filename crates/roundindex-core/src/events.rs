//! Typed, pre-decoded log events.
//!
//! ABI decoding happens upstream; the indexer only sees these structs.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::entity::{AssetType, HouseType, RoundType};
use crate::ids;

// ─── LogMeta ──────────────────────────────────────────────────────────────────

/// Block and transaction metadata of a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMeta {
    /// Contract that emitted the log.
    pub address: Address,
    pub tx_hash: B256,
    pub log_index: u32,
    pub block_number: u64,
    /// Unix timestamp of the block (seconds).
    pub block_timestamp: u64,
}

impl LogMeta {
    /// `(block_number, log_index)`, the total order of logs on chain.
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }

    pub fn address_key(&self) -> String {
        ids::address_key(&self.address)
    }

    pub fn tx_key(&self) -> String {
        ids::hex_key(self.tx_hash.as_slice())
    }

    /// `txHash-logIndex`, the id of single-item ledger records.
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.tx_key(), self.log_index)
    }

    /// `txHash-logIndex-item`, the id of one item of a batched log.
    pub fn batch_record_id(&self, item: usize) -> String {
        format!("{}-{}-{}", self.tx_key(), self.log_index, item)
    }
}

// ─── Shared parameter shapes ──────────────────────────────────────────────────

/// An asset plus amount as carried in round events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetParams {
    pub asset_type: AssetType,
    #[serde(default)]
    pub token: Address,
    #[serde(default)]
    pub identifier: U256,
    pub amount: U256,
}

impl AssetParams {
    pub fn asset_key(&self) -> String {
        ids::asset_key(self.asset_type, &self.token, &self.identifier)
    }
}

/// Metadata of a house, parsed off-chain from its contract URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
}

// ─── PropHouse events ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseCreated {
    pub creator: Address,
    pub house: Address,
    #[serde(default)]
    pub kind: HouseType,
    #[serde(default)]
    pub metadata: Option<HouseMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundCreated {
    pub creator: Address,
    pub house: Address,
    pub round: Address,
    #[serde(default)]
    pub kind: RoundType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositToRound {
    pub from: Address,
    pub round: Address,
    pub asset: AssetParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDepositToRound {
    pub from: Address,
    pub round: Address,
    pub assets: Vec<AssetParams>,
}

// ─── Round events ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRegistered {
    pub awards: Vec<AssetParams>,
    #[serde(default)]
    pub proposal_threshold: U256,
    pub proposing_strategies: Vec<U256>,
    #[serde(default)]
    pub proposing_strategy_params_flat: Vec<U256>,
    pub voting_strategies: Vec<U256>,
    #[serde(default)]
    pub voting_strategy_params_flat: Vec<U256>,
    pub proposal_period_start_timestamp: u64,
    pub proposal_period_duration: u64,
    pub vote_period_duration: u64,
    pub winner_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardClaimed {
    pub proposal_id: U256,
    pub claimer: Address,
    pub recipient: Address,
    pub asset: AssetParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRescued {
    pub rescuer: Address,
    pub to: Address,
    pub asset: AssetParams,
}

// ─── ERC-1155 transfers (round receipts and creator passes) ───────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSingle {
    #[serde(default)]
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    pub id: U256,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBatch {
    #[serde(default)]
    pub operator: Address,
    pub from: Address,
    pub to: Address,
    pub ids: Vec<U256>,
    pub values: Vec<U256>,
}

impl TransferBatch {
    /// Split into per-item transfers, `None` if `ids` and `values` differ in length.
    pub fn items(&self) -> Option<Vec<TransferSingle>> {
        if self.ids.len() != self.values.len() {
            return None;
        }
        Some(
            self.ids
                .iter()
                .zip(&self.values)
                .map(|(id, value)| TransferSingle {
                    operator: self.operator,
                    from: self.from,
                    to: self.to,
                    id: *id,
                    value: *value,
                })
                .collect(),
        )
    }
}

// ─── LogEvent ─────────────────────────────────────────────────────────────────

/// Which kind of contract emitted a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractFamily {
    /// The house/round factory and deposit entrypoint.
    PropHouse,
    /// The house-level creator pass token.
    CreatorPass,
    /// A per-round contract.
    Round,
}

impl std::fmt::Display for ContractFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PropHouse => write!(f, "prop-house"),
            Self::CreatorPass => write!(f, "creator-pass"),
            Self::Round => write!(f, "round"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "params")]
pub enum EventPayload {
    HouseCreated(HouseCreated),
    RoundCreated(RoundCreated),
    DepositToRound(DepositToRound),
    BatchDepositToRound(BatchDepositToRound),
    RoundRegistered(Box<RoundRegistered>),
    RoundCancelled,
    RoundFinalized,
    AwardClaimed(AwardClaimed),
    AssetRescued(AssetRescued),
    TransferSingle(TransferSingle),
    TransferBatch(TransferBatch),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HouseCreated(_) => "HouseCreated",
            Self::RoundCreated(_) => "RoundCreated",
            Self::DepositToRound(_) => "DepositToRound",
            Self::BatchDepositToRound(_) => "BatchDepositToRound",
            Self::RoundRegistered(_) => "RoundRegistered",
            Self::RoundCancelled => "RoundCancelled",
            Self::RoundFinalized => "RoundFinalized",
            Self::AwardClaimed(_) => "AwardClaimed",
            Self::AssetRescued(_) => "AssetRescued",
            Self::TransferSingle(_) => "TransferSingle",
            Self::TransferBatch(_) => "TransferBatch",
        }
    }
}

/// One decoded log, the unit of work of the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub family: ContractFamily,
    pub meta: LogMeta,
    #[serde(flatten)]
    pub payload: EventPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> LogMeta {
        LogMeta {
            address: Address::repeat_byte(0xaa),
            tx_hash: B256::repeat_byte(0x01),
            log_index: 7,
            block_number: 100,
            block_timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn record_ids() {
        let m = meta();
        let tx = format!("0x{}", "01".repeat(32));
        assert_eq!(m.record_id(), format!("{tx}-7"));
        assert_eq!(m.batch_record_id(2), format!("{tx}-7-2"));
        assert_eq!(m.address_key(), format!("0x{}", "aa".repeat(20)));
    }

    #[test]
    fn batch_items_require_equal_lengths() {
        let mut batch = TransferBatch {
            operator: Address::ZERO,
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            ids: vec![U256::from(1), U256::from(2)],
            values: vec![U256::from(10), U256::from(20)],
        };
        let items = batch.items().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, U256::from(2));
        assert_eq!(items[1].value, U256::from(20));

        batch.values.pop();
        assert!(batch.items().is_none());
    }

    #[test]
    fn log_event_json_shape() {
        let event = LogEvent {
            family: ContractFamily::Round,
            meta: meta(),
            payload: EventPayload::RoundCancelled,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "RoundCancelled");
        assert_eq!(json["family"], "Round");

        let back: LogEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
