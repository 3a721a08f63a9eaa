//! Derived entity types.
//!
//! Every entity is a flat record keyed by an opaque string id. Relationships
//! are id references resolved through the [`EntityStore`](crate::store::EntityStore);
//! no entity owns another.

use alloy_primitives::{I256, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ─── EntityKind ───────────────────────────────────────────────────────────────

/// The entity tables of the derived store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    House,
    RoundCreator,
    Round,
    TimedRoundConfig,
    GovPowerStrategy,
    RoundProposingStrategy,
    RoundVotingStrategy,
    Asset,
    Award,
    Balance,
    Deposit,
    Claim,
    Reclaim,
    Rescue,
    Transfer,
}

impl EntityKind {
    pub const ALL: [EntityKind; 16] = [
        Self::Account,
        Self::House,
        Self::RoundCreator,
        Self::Round,
        Self::TimedRoundConfig,
        Self::GovPowerStrategy,
        Self::RoundProposingStrategy,
        Self::RoundVotingStrategy,
        Self::Asset,
        Self::Award,
        Self::Balance,
        Self::Deposit,
        Self::Claim,
        Self::Reclaim,
        Self::Rescue,
        Self::Transfer,
    ];

    /// Table name used by persistent backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::House => "House",
            Self::RoundCreator => "RoundCreator",
            Self::Round => "Round",
            Self::TimedRoundConfig => "TimedRoundConfig",
            Self::GovPowerStrategy => "GovPowerStrategy",
            Self::RoundProposingStrategy => "RoundProposingStrategy",
            Self::RoundVotingStrategy => "RoundVotingStrategy",
            Self::Asset => "Asset",
            Self::Award => "Award",
            Self::Balance => "Balance",
            Self::Deposit => "Deposit",
            Self::Claim => "Claim",
            Self::Reclaim => "Reclaim",
            Self::Rescue => "Rescue",
            Self::Transfer => "Transfer",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record that can be stored in an entity table.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

macro_rules! impl_entity {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_entity!(
    Account,
    House,
    RoundCreator,
    Round,
    TimedRoundConfig,
    GovPowerStrategy,
    RoundProposingStrategy,
    RoundVotingStrategy,
    Asset,
    Award,
    Balance,
    Deposit,
    Claim,
    Reclaim,
    Rescue,
    Transfer,
);

// ─── Enumerations ─────────────────────────────────────────────────────────────

/// Lifecycle state of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundEventState {
    Created,
    Registered,
    Cancelled,
    Finalized,
}

impl RoundEventState {
    /// `CANCELLED` and `FINALIZED` accept no further lifecycle events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Finalized)
    }
}

impl std::fmt::Display for RoundEventState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Registered => write!(f, "REGISTERED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Finalized => write!(f, "FINALIZED"),
        }
    }
}

/// Asset class. The discriminant is the type byte used in asset ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Native = 0,
    Erc20 = 1,
    Erc721 = 2,
    Erc1155 = 3,
}

impl AssetType {
    pub fn type_byte(self) -> u8 {
        self as u8
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NATIVE" | "ETH" => Ok(Self::Native),
            "ERC20" => Ok(Self::Erc20),
            "ERC721" => Ok(Self::Erc721),
            "ERC1155" => Ok(Self::Erc1155),
            other => Err(format!("unknown asset type '{other}'")),
        }
    }
}

/// How a governance-power strategy computes power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovPowerStrategyType {
    BalanceOf,
    BalanceOfErc20,
    BalanceOfErc1155,
    Allowlist,
    Vanilla,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HouseType {
    Community,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundType {
    Timed,
    #[default]
    Unknown,
}

// ─── Registry entities ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    pub id: String,
    pub kind: HouseType,
    pub owner: String,
    pub creator: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
    pub created_at: u64,
    pub creation_tx: String,
}

/// Permission for `creator` to create rounds on `house`.
///
/// Only exists while `pass_count > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundCreator {
    pub id: String,
    pub house: String,
    pub creator: String,
    pub pass_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: String,
    pub house: String,
    pub kind: RoundType,
    pub title: String,
    pub description: String,
    pub event_state: RoundEventState,
    pub config: Option<String>,
    pub created_at: u64,
    pub registered_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    pub finalized_at: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedRoundConfig {
    pub id: String,
    pub round: String,
    pub winner_count: u16,
    pub proposal_threshold: U256,
    pub proposal_period_start_timestamp: u64,
    pub proposal_period_duration: u64,
    pub proposal_period_end_timestamp: u64,
    pub vote_period_start_timestamp: u64,
    pub vote_period_duration: u64,
    pub vote_period_end_timestamp: u64,
    /// Estimated at registration, replaced at finalization.
    pub claim_period_end_timestamp: u64,
}

// ─── Strategies ───────────────────────────────────────────────────────────────

/// A content-addressed governance-power strategy, shared across rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovPowerStrategy {
    pub id: String,
    pub strategy_type: GovPowerStrategyType,
    pub address: String,
    pub params: Vec<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundProposingStrategy {
    pub id: String,
    pub round: String,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundVotingStrategy {
    pub id: String,
    pub round: String,
    pub strategy: String,
}

// ─── Assets and balances ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub asset_type: AssetType,
    pub token: String,
    pub identifier: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub id: String,
    pub round: String,
    pub config: String,
    pub asset: String,
    pub amount: U256,
}

/// Pooled holdings of one asset within one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub id: String,
    pub round: String,
    pub asset: String,
    pub balance: I256,
    pub updated_at: u64,
}

// ─── Ledger records ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: String,
    pub depositor: String,
    pub round: String,
    pub asset: String,
    pub amount: U256,
    pub deposited_at: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub claimer: String,
    pub recipient: String,
    pub proposal_id: U256,
    pub round: String,
    pub asset: String,
    pub amount: U256,
    pub claimed_at: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reclaim {
    pub id: String,
    pub reclaimer: String,
    pub round: String,
    pub asset: String,
    pub amount: U256,
    pub reclaimed_at: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rescue {
    pub id: String,
    pub rescuer: String,
    pub recipient: String,
    pub round: String,
    pub asset: String,
    pub amount: U256,
    pub rescued_at: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub from: String,
    pub to: String,
    pub round: String,
    pub asset: String,
    pub amount: U256,
    pub transferred_at: u64,
    pub tx_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_screaming() {
        assert_eq!(
            serde_json::to_value(RoundEventState::Finalized).unwrap(),
            "FINALIZED"
        );
        assert_eq!(serde_json::to_value(AssetType::Erc1155).unwrap(), "ERC1155");
        assert_eq!(
            serde_json::to_value(GovPowerStrategyType::BalanceOfErc20).unwrap(),
            "BALANCE_OF_ERC20"
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!RoundEventState::Created.is_terminal());
        assert!(!RoundEventState::Registered.is_terminal());
        assert!(RoundEventState::Cancelled.is_terminal());
        assert!(RoundEventState::Finalized.is_terminal());
    }

    #[test]
    fn asset_type_from_str() {
        assert_eq!("erc721".parse::<AssetType>().unwrap(), AssetType::Erc721);
        assert_eq!("NATIVE".parse::<AssetType>().unwrap(), AssetType::Native);
        assert!("erc4626".parse::<AssetType>().is_err());
    }

    #[test]
    fn entity_fields_are_camel_case() {
        let creator = RoundCreator {
            id: "0xh-0xa".into(),
            house: "0xh".into(),
            creator: "0xa".into(),
            pass_count: 2,
        };
        let json = serde_json::to_value(&creator).unwrap();
        assert_eq!(json["passCount"], 2);
        assert_eq!(creator.id(), "0xh-0xa");
        assert_eq!(RoundCreator::KIND, EntityKind::RoundCreator);
    }
}
