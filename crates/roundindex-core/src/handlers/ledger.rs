//! Deposits, claims, rescues, and round receipt-token transfers.
//!
//! Pooled balances move on deposits (credit) and receipt burns (debit).
//! Claims, rescues, and holder-to-holder receipt transfers are recorded
//! without touching the pooled balance.

use alloy_primitives::Address;

use crate::entity::{Claim, Deposit, Reclaim, Rescue, Round, Transfer};
use crate::error::HandlerError;
use crate::events::{
    AssetParams, AssetRescued, AwardClaimed, BatchDepositToRound, DepositToRound, TransferBatch,
    TransferSingle,
};
use crate::handlers::{signed_amount, HandlerContext};
use crate::ids;
use crate::store::EntityStoreExt;

// ─── Deposits ─────────────────────────────────────────────────────────────────

async fn apply_deposit(
    ctx: &HandlerContext<'_>,
    round: &Round,
    from: &Address,
    params: &AssetParams,
    record_id: String,
) -> Result<(), HandlerError> {
    let delta = signed_amount(&params.amount)?;
    let depositor = ctx.ensure_account(from).await?;
    let asset = ctx.ensure_asset(params).await?;

    let deposit = Deposit {
        id: record_id,
        depositor: depositor.id,
        round: round.id.clone(),
        asset: asset.id.clone(),
        amount: params.amount,
        deposited_at: ctx.timestamp(),
        tx_hash: ctx.meta.tx_key(),
    };
    ctx.store.save(&deposit).await?;
    ctx.adjust_balance(&round.id, &asset.id, delta).await?;
    Ok(())
}

pub async fn deposit_to_round(
    ctx: &HandlerContext<'_>,
    ev: &DepositToRound,
) -> Result<(), HandlerError> {
    let round = ctx.require_round(&ev.round).await?;
    apply_deposit(ctx, &round, &ev.from, &ev.asset, ctx.meta.record_id()).await
}

/// Items are applied in order; the first failure stops the rest.
pub async fn batch_deposit_to_round(
    ctx: &HandlerContext<'_>,
    ev: &BatchDepositToRound,
) -> Result<(), HandlerError> {
    let round = ctx.require_round(&ev.round).await?;
    for (item, params) in ev.assets.iter().enumerate() {
        apply_deposit(ctx, &round, &ev.from, params, ctx.meta.batch_record_id(item)).await?;
    }
    Ok(())
}

// ─── Claims and rescues ───────────────────────────────────────────────────────

pub async fn award_claimed(ctx: &HandlerContext<'_>, ev: &AwardClaimed) -> Result<(), HandlerError> {
    let round = ctx.require_round(&ctx.meta.address).await?;
    let claimer = ctx.ensure_account(&ev.claimer).await?;
    let asset = ctx.ensure_asset(&ev.asset).await?;

    let claim = Claim {
        id: ctx.meta.record_id(),
        claimer: claimer.id,
        recipient: ids::address_key(&ev.recipient),
        proposal_id: ev.proposal_id,
        round: round.id,
        asset: asset.id,
        amount: ev.asset.amount,
        claimed_at: ctx.timestamp(),
        tx_hash: ctx.meta.tx_key(),
    };
    ctx.store.save(&claim).await?;
    tracing::debug!(claim = %claim.id, claimer = %claim.claimer, "award claimed");
    Ok(())
}

pub async fn asset_rescued(ctx: &HandlerContext<'_>, ev: &AssetRescued) -> Result<(), HandlerError> {
    let round = ctx.require_round(&ctx.meta.address).await?;
    let asset = ctx.ensure_asset(&ev.asset).await?;

    let rescue = Rescue {
        id: ctx.meta.record_id(),
        rescuer: ids::address_key(&ev.rescuer),
        recipient: ids::address_key(&ev.to),
        round: round.id,
        asset: asset.id,
        amount: ev.asset.amount,
        rescued_at: ctx.timestamp(),
        tx_hash: ctx.meta.tx_key(),
    };
    ctx.store.save(&rescue).await?;
    tracing::debug!(rescue = %rescue.id, "asset rescued");
    Ok(())
}

// ─── Receipt transfers ────────────────────────────────────────────────────────

async fn apply_receipt_transfer(
    ctx: &HandlerContext<'_>,
    round: &Round,
    item: &TransferSingle,
    record_id: String,
) -> Result<(), HandlerError> {
    if item.from == Address::ZERO {
        // Receipts are minted by deposits, handled on the deposit path.
        tracing::trace!(round = %round.id, token_id = %item.id, "receipt mint ignored");
        return Ok(());
    }

    if item.to == Address::ZERO {
        let delta = signed_amount(&item.value)?;
        let reclaimer = ctx.require_account(&item.from).await?;
        let asset = ctx.require_asset(&item.id).await?;
        let reclaim = Reclaim {
            id: record_id,
            reclaimer: reclaimer.id,
            round: round.id.clone(),
            asset: asset.id.clone(),
            amount: item.value,
            reclaimed_at: ctx.timestamp(),
            tx_hash: ctx.meta.tx_key(),
        };
        ctx.store.save(&reclaim).await?;
        ctx.adjust_balance(&round.id, &asset.id, -delta).await?;
        return Ok(());
    }

    let from = ctx.require_account(&item.from).await?;
    let asset = ctx.require_asset(&item.id).await?;
    let to = ctx.ensure_account(&item.to).await?;
    let transfer = Transfer {
        id: record_id,
        from: from.id,
        to: to.id,
        round: round.id.clone(),
        asset: asset.id,
        amount: item.value,
        transferred_at: ctx.timestamp(),
        tx_hash: ctx.meta.tx_key(),
    };
    ctx.store.save(&transfer).await?;
    Ok(())
}

pub async fn receipt_transfer_single(
    ctx: &HandlerContext<'_>,
    ev: &TransferSingle,
) -> Result<(), HandlerError> {
    let round = ctx.require_round(&ctx.meta.address).await?;
    apply_receipt_transfer(ctx, &round, ev, ctx.meta.record_id()).await
}

/// Items are applied in order; the first failure stops the rest and earlier
/// items stay applied.
pub async fn receipt_transfer_batch(
    ctx: &HandlerContext<'_>,
    ev: &TransferBatch,
) -> Result<(), HandlerError> {
    let items = ev.items().ok_or_else(|| {
        HandlerError::Malformed(format!(
            "{} ids but {} values",
            ev.ids.len(),
            ev.values.len()
        ))
    })?;
    let round = ctx.require_round(&ctx.meta.address).await?;
    for (index, item) in items.iter().enumerate() {
        apply_receipt_transfer(ctx, &round, item, ctx.meta.batch_record_id(index)).await?;
    }
    Ok(())
}
