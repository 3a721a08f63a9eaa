//! Event handlers.
//!
//! Every handler reads and writes through the injected store and returns a
//! [`HandlerError`] for events it cannot apply. Writes made before a failure
//! stay applied; there is no rollback within an event.

pub mod creator_pass;
pub mod house;
pub mod ledger;
pub mod round;

use alloy_primitives::{Address, I256, U256};

use crate::entity::{Account, Asset, Balance, Entity, Round};
use crate::error::HandlerError;
use crate::events::{AssetParams, LogMeta};
use crate::ids;
use crate::indexer::IndexerConfig;
use crate::store::{EntityStore, EntityStoreExt};

/// Everything a handler may touch while applying one event.
pub struct HandlerContext<'a> {
    pub store: &'a dyn EntityStore,
    pub meta: &'a LogMeta,
    pub config: &'a IndexerConfig,
}

impl<'a> HandlerContext<'a> {
    pub fn new(store: &'a dyn EntityStore, meta: &'a LogMeta, config: &'a IndexerConfig) -> Self {
        Self {
            store,
            meta,
            config,
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.meta.block_timestamp
    }

    /// Load an account, creating it on first reference.
    pub async fn ensure_account(&self, address: &Address) -> Result<Account, HandlerError> {
        let id = ids::address_key(address);
        if let Some(account) = self.store.load::<Account>(&id).await? {
            return Ok(account);
        }
        let account = Account::new(id);
        self.store.save(&account).await?;
        tracing::debug!(account = %account.id, "account created");
        Ok(account)
    }

    /// An account that must already exist.
    pub async fn require_account(&self, address: &Address) -> Result<Account, HandlerError> {
        let id = ids::address_key(address);
        self.store
            .load::<Account>(&id)
            .await?
            .ok_or_else(|| HandlerError::missing(Account::KIND, id))
    }

    pub async fn require_round(&self, address: &Address) -> Result<Round, HandlerError> {
        let id = ids::address_key(address);
        self.store
            .load::<Round>(&id)
            .await?
            .ok_or_else(|| HandlerError::missing(Round::KIND, id))
    }

    /// Load an asset class, creating it on first reference.
    pub async fn ensure_asset(&self, params: &AssetParams) -> Result<Asset, HandlerError> {
        let id = params.asset_key();
        if let Some(asset) = self.store.load::<Asset>(&id).await? {
            return Ok(asset);
        }
        let asset = Asset {
            id,
            asset_type: params.asset_type,
            token: ids::address_key(&params.token),
            identifier: params.identifier,
        };
        self.store.save(&asset).await?;
        tracing::debug!(asset = %asset.id, asset_type = ?asset.asset_type, "asset created");
        Ok(asset)
    }

    /// Asset behind a round receipt token id. Must already exist.
    pub async fn require_asset(&self, token_id: &U256) -> Result<Asset, HandlerError> {
        let id = ids::asset_key_from_token_id(token_id);
        self.store
            .load::<Asset>(&id)
            .await?
            .ok_or_else(|| HandlerError::missing(Asset::KIND, id))
    }

    /// Add `delta` to the `(round, asset)` balance, creating it at zero first.
    pub async fn adjust_balance(
        &self,
        round: &str,
        asset: &str,
        delta: I256,
    ) -> Result<Balance, HandlerError> {
        let id = ids::compose(&[round, asset]);
        let mut balance = self.store.load::<Balance>(&id).await?.unwrap_or(Balance {
            id,
            round: round.to_string(),
            asset: asset.to_string(),
            balance: I256::ZERO,
            updated_at: 0,
        });
        balance.balance = balance.balance.saturating_add(delta);
        balance.updated_at = self.timestamp();
        self.store.save(&balance).await?;
        tracing::debug!(
            balance_id = %balance.id,
            delta = %delta,
            balance = %balance.balance,
            "balance updated"
        );
        Ok(balance)
    }
}

/// Convert a token amount into a signed balance delta.
pub(crate) fn signed_amount(amount: &U256) -> Result<I256, HandlerError> {
    I256::try_from(*amount)
        .map_err(|_| HandlerError::Malformed(format!("amount {amount} exceeds the signed range")))
}
