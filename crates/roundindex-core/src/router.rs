//! Event router: picks the handler for a log by contract family and event
//! kind, and turns domain failures into logged skips.

use std::sync::Arc;

use crate::error::{HandlerError, IndexerError};
use crate::events::{ContractFamily, EventPayload, LogEvent};
use crate::handlers::{creator_pass, house, ledger, round, HandlerContext};
use crate::indexer::IndexerConfig;
use crate::store::EntityStore;

/// What happened to a routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran to completion.
    Applied,
    /// The handler stopped early; writes made before the failure remain.
    Skipped { reason: String },
}

impl Dispatch {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Dispatches [`LogEvent`]s to their handlers against one entity store.
pub struct EventRouter {
    store: Arc<dyn EntityStore>,
    config: IndexerConfig,
}

impl EventRouter {
    pub fn new(store: Arc<dyn EntityStore>, config: IndexerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Apply one event.
    ///
    /// Domain failures are logged and reported as [`Dispatch::Skipped`];
    /// only storage-level errors are returned as `Err`.
    pub async fn route(&self, event: &LogEvent) -> Result<Dispatch, IndexerError> {
        let ctx = HandlerContext::new(self.store.as_ref(), &event.meta, &self.config);
        match self.dispatch(&ctx, event).await {
            Ok(()) => Ok(Dispatch::Applied),
            Err(HandlerError::Indexer(e)) => Err(e),
            Err(e) => {
                tracing::error!(
                    tx_hash = %event.meta.tx_key(),
                    log_index = event.meta.log_index,
                    block = event.meta.block_number,
                    address = %event.meta.address_key(),
                    family = %event.family,
                    event = event.payload.name(),
                    error = %e,
                    "event skipped"
                );
                Ok(Dispatch::Skipped {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn dispatch(&self, ctx: &HandlerContext<'_>, event: &LogEvent) -> Result<(), HandlerError> {
        use ContractFamily::*;
        use EventPayload as P;

        match (event.family, &event.payload) {
            (PropHouse, P::HouseCreated(ev)) => house::house_created(ctx, ev).await,
            (PropHouse, P::RoundCreated(ev)) => house::round_created(ctx, ev).await,
            (PropHouse, P::DepositToRound(ev)) => ledger::deposit_to_round(ctx, ev).await,
            (PropHouse, P::BatchDepositToRound(ev)) => ledger::batch_deposit_to_round(ctx, ev).await,

            (CreatorPass, P::TransferSingle(ev)) => creator_pass::pass_transfer_single(ctx, ev).await,
            (CreatorPass, P::TransferBatch(ev)) => creator_pass::pass_transfer_batch(ctx, ev).await,

            (Round, P::RoundRegistered(ev)) => round::round_registered(ctx, ev).await,
            (Round, P::RoundCancelled) => round::round_cancelled(ctx).await,
            (Round, P::RoundFinalized) => round::round_finalized(ctx).await,
            (Round, P::AwardClaimed(ev)) => ledger::award_claimed(ctx, ev).await,
            (Round, P::AssetRescued(ev)) => ledger::asset_rescued(ctx, ev).await,
            (Round, P::TransferSingle(ev)) => ledger::receipt_transfer_single(ctx, ev).await,
            (Round, P::TransferBatch(ev)) => ledger::receipt_transfer_batch(ctx, ev).await,

            (family, payload) => Err(HandlerError::Unsupported(format!(
                "{} is not emitted by {family} contracts",
                payload.name()
            ))),
        }
    }
}
