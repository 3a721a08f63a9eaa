//! House and round creation, emitted by the PropHouse contract.

use crate::entity::{Entity, House, Round, RoundEventState};
use crate::error::HandlerError;
use crate::events::{HouseCreated, RoundCreated};
use crate::handlers::HandlerContext;
use crate::ids;
use crate::store::EntityStoreExt;

pub async fn house_created(ctx: &HandlerContext<'_>, ev: &HouseCreated) -> Result<(), HandlerError> {
    let creator = ctx.ensure_account(&ev.creator).await?;
    let metadata = ev.metadata.clone().unwrap_or_default();
    let house = House {
        id: ids::address_key(&ev.house),
        kind: ev.kind,
        owner: creator.id.clone(),
        creator: creator.id,
        name: metadata.name,
        description: metadata.description,
        image_uri: metadata.image_uri,
        created_at: ctx.timestamp(),
        creation_tx: ctx.meta.tx_key(),
    };
    ctx.store.save(&house).await?;
    tracing::info!(house = %house.id, creator = %house.creator, "house created");
    Ok(())
}

/// Creates the round in its implicit `CREATED` state.
pub async fn round_created(ctx: &HandlerContext<'_>, ev: &RoundCreated) -> Result<(), HandlerError> {
    let house_id = ids::address_key(&ev.house);
    if !ctx.store.exists::<House>(&house_id).await? {
        return Err(HandlerError::missing(House::KIND, house_id));
    }
    let round_id = ids::address_key(&ev.round);
    if ctx.store.exists::<Round>(&round_id).await? {
        return Err(HandlerError::Rejected(format!("round '{round_id}' already exists")));
    }
    ctx.ensure_account(&ev.creator).await?;

    let round = Round {
        id: round_id,
        house: house_id,
        kind: ev.kind,
        title: ev.title.clone(),
        description: ev.description.clone(),
        event_state: RoundEventState::Created,
        config: None,
        created_at: ctx.timestamp(),
        registered_at: None,
        cancelled_at: None,
        finalized_at: None,
    };
    ctx.store.save(&round).await?;
    tracing::info!(round = %round.id, house = %round.house, kind = ?round.kind, "round created");
    Ok(())
}
