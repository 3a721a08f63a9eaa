//! Creator passes: house-level permission tokens whose id is the house
//! address. Holding at least one pass lets an account create rounds on that
//! house; a [`RoundCreator`] record exists exactly while the count is positive.

use alloy_primitives::{Address, U256};

use crate::entity::{Entity, House, RoundCreator};
use crate::error::HandlerError;
use crate::events::{TransferBatch, TransferSingle};
use crate::handlers::HandlerContext;
use crate::ids;
use crate::store::EntityStoreExt;

fn pass_amount(value: &U256) -> Result<u64, HandlerError> {
    let limbs = value.as_limbs();
    if limbs[1..].iter().any(|l| *l != 0) {
        return Err(HandlerError::Malformed(format!("pass amount {value} exceeds u64")));
    }
    Ok(limbs[0])
}

async fn require_house(ctx: &HandlerContext<'_>, token_id: &U256) -> Result<House, HandlerError> {
    let id = ids::address_key(&ids::address_from_word(token_id));
    ctx.store
        .load::<House>(&id)
        .await?
        .ok_or_else(|| HandlerError::missing(House::KIND, id))
}

fn creator_key(house: &str, account: &str) -> String {
    ids::compose(&[house, account])
}

async fn credit(
    ctx: &HandlerContext<'_>,
    house: &House,
    to: &Address,
    amount: u64,
) -> Result<(), HandlerError> {
    let account = ctx.ensure_account(to).await?;
    let id = creator_key(&house.id, &account.id);
    let mut creator = ctx.store.load::<RoundCreator>(&id).await?.unwrap_or(RoundCreator {
        id,
        house: house.id.clone(),
        creator: account.id,
        pass_count: 0,
    });
    creator.pass_count = creator.pass_count.saturating_add(amount);
    ctx.store.save(&creator).await?;
    tracing::debug!(round_creator = %creator.id, passes = creator.pass_count, "creator pass credited");
    Ok(())
}

async fn debit(
    ctx: &HandlerContext<'_>,
    house: &House,
    from: &Address,
    amount: u64,
) -> Result<(), HandlerError> {
    let id = creator_key(&house.id, &ids::address_key(from));
    let mut creator = ctx
        .store
        .load::<RoundCreator>(&id)
        .await?
        .ok_or_else(|| HandlerError::missing(RoundCreator::KIND, id.clone()))?;

    let Some(remaining) = creator.pass_count.checked_sub(amount) else {
        return Err(HandlerError::Rejected(format!(
            "'{id}' holds {} passes, cannot remove {amount}",
            creator.pass_count
        )));
    };
    if remaining == 0 {
        ctx.store.delete::<RoundCreator>(&id).await?;
        tracing::debug!(round_creator = %id, "creator pass record removed");
    } else {
        creator.pass_count = remaining;
        ctx.store.save(&creator).await?;
        tracing::debug!(round_creator = %id, passes = remaining, "creator pass debited");
    }
    Ok(())
}

async fn apply_pass_transfer(ctx: &HandlerContext<'_>, item: &TransferSingle) -> Result<(), HandlerError> {
    let house = require_house(ctx, &item.id).await?;
    let amount = pass_amount(&item.value)?;
    if amount == 0 {
        tracing::trace!(house = %house.id, from = %item.from, to = %item.to, "zero-value creator pass transfer");
        return Ok(());
    }

    match (item.from == Address::ZERO, item.to == Address::ZERO) {
        (true, true) => Err(HandlerError::Unsupported(
            "creator pass transfer from and to the zero address".into(),
        )),
        (true, false) => credit(ctx, &house, &item.to, amount).await,
        (false, true) => debit(ctx, &house, &item.from, amount).await,
        (false, false) => {
            debit(ctx, &house, &item.from, amount).await?;
            credit(ctx, &house, &item.to, amount).await
        }
    }
}

pub async fn pass_transfer_single(
    ctx: &HandlerContext<'_>,
    ev: &TransferSingle,
) -> Result<(), HandlerError> {
    apply_pass_transfer(ctx, ev).await
}

/// Holder-to-holder batches only; batched mints and burns are rejected
/// before anything is written.
pub async fn pass_transfer_batch(
    ctx: &HandlerContext<'_>,
    ev: &TransferBatch,
) -> Result<(), HandlerError> {
    if ev.from == Address::ZERO {
        return Err(HandlerError::Unsupported("batched creator pass mint".into()));
    }
    if ev.to == Address::ZERO {
        return Err(HandlerError::Unsupported("batched creator pass burn".into()));
    }
    let items = ev.items().ok_or_else(|| {
        HandlerError::Malformed(format!(
            "{} ids but {} values",
            ev.ids.len(),
            ev.values.len()
        ))
    })?;
    for item in &items {
        apply_pass_transfer(ctx, item).await?;
    }
    Ok(())
}
