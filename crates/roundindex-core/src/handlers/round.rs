//! Round lifecycle: `CREATED → REGISTERED → {FINALIZED | CANCELLED}`.

use alloy_primitives::U256;

use crate::entity::{
    Award, Entity, GovPowerStrategy, Round, RoundEventState, RoundProposingStrategy, RoundVotingStrategy,
    TimedRoundConfig,
};
use crate::error::HandlerError;
use crate::events::RoundRegistered;
use crate::handlers::HandlerContext;
use crate::ids;
use crate::store::EntityStoreExt;

/// Length of the claim period after voting ends (8 weeks).
pub const CLAIM_PERIOD_DURATION_SECS: u64 = 8 * 7 * 24 * 60 * 60;

/// Timestamps derived from the registration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSchedule {
    pub proposal_period_end: u64,
    pub vote_period_start: u64,
    pub vote_period_end: u64,
    /// Estimate; replaced at finalization.
    pub claim_period_end: u64,
}

impl RoundSchedule {
    pub fn compute(proposal_start: u64, proposal_duration: u64, vote_duration: u64) -> Self {
        let proposal_period_end = proposal_start.saturating_add(proposal_duration);
        let vote_period_start = proposal_period_end.saturating_add(1);
        let vote_period_end = vote_period_start.saturating_add(vote_duration);
        Self {
            proposal_period_end,
            vote_period_start,
            vote_period_end,
            claim_period_end: vote_period_end.saturating_add(CLAIM_PERIOD_DURATION_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Proposing,
    Voting,
}

impl Purpose {
    fn as_str(self) -> &'static str {
        match self {
            Self::Proposing => "proposing",
            Self::Voting => "voting",
        }
    }
}

/// Pair each strategy address with its decoded parameter list.
///
/// An empty flat array means no strategy takes parameters.
fn pair_strategies(
    addresses: &[U256],
    params_flat: &[U256],
    purpose: Purpose,
) -> Result<Vec<(U256, Vec<U256>)>, HandlerError> {
    let mut params = ids::decode_flattened_2d(params_flat)?;
    if params_flat.is_empty() {
        params = vec![Vec::new(); addresses.len()];
    }
    if params.len() != addresses.len() {
        return Err(HandlerError::Malformed(format!(
            "{} strategies: {} addresses but {} parameter sets",
            purpose.as_str(),
            addresses.len(),
            params.len()
        )));
    }
    Ok(addresses.iter().copied().zip(params).collect())
}

/// Create the strategy (once, globally) and the round's join record.
async fn link_strategy(
    ctx: &HandlerContext<'_>,
    round: &str,
    address: &U256,
    params: Vec<U256>,
    purpose: Purpose,
) -> Result<(), HandlerError> {
    let strategy_id = ids::strategy_id(address, &params);
    if !ctx.store.exists::<GovPowerStrategy>(&strategy_id).await? {
        let strategy = GovPowerStrategy {
            id: strategy_id.clone(),
            strategy_type: ctx.config.strategy_type(address),
            address: ids::word_key(address),
            params,
        };
        ctx.store.save(&strategy).await?;
        tracing::debug!(strategy = %strategy.id, strategy_type = ?strategy.strategy_type, "strategy created");
    }

    let join_id = ids::compose(&[round, &strategy_id, purpose.as_str()]);
    match purpose {
        Purpose::Proposing => {
            ctx.store
                .save(&RoundProposingStrategy {
                    id: join_id,
                    round: round.to_string(),
                    strategy: strategy_id,
                })
                .await?
        }
        Purpose::Voting => {
            ctx.store
                .save(&RoundVotingStrategy {
                    id: join_id,
                    round: round.to_string(),
                    strategy: strategy_id,
                })
                .await?
        }
    }
    Ok(())
}

fn check_transition(round: &Round, event: &'static str, allowed: &[RoundEventState]) -> Result<(), HandlerError> {
    if allowed.contains(&round.event_state) {
        Ok(())
    } else {
        Err(HandlerError::InvalidTransition {
            round: round.id.clone(),
            state: round.event_state,
            event,
        })
    }
}

pub async fn round_registered(
    ctx: &HandlerContext<'_>,
    ev: &RoundRegistered,
) -> Result<(), HandlerError> {
    let mut round = ctx.require_round(&ctx.meta.address).await?;
    check_transition(&round, "RoundRegistered", &[RoundEventState::Created])?;

    // Decode everything up front so a malformed event writes nothing.
    let proposing = pair_strategies(
        &ev.proposing_strategies,
        &ev.proposing_strategy_params_flat,
        Purpose::Proposing,
    )?;
    let voting = pair_strategies(
        &ev.voting_strategies,
        &ev.voting_strategy_params_flat,
        Purpose::Voting,
    )?;

    let schedule = RoundSchedule::compute(
        ev.proposal_period_start_timestamp,
        ev.proposal_period_duration,
        ev.vote_period_duration,
    );
    let config = TimedRoundConfig {
        id: ids::timed_round_config_key(&round.id),
        round: round.id.clone(),
        winner_count: ev.winner_count,
        proposal_threshold: ev.proposal_threshold,
        proposal_period_start_timestamp: ev.proposal_period_start_timestamp,
        proposal_period_duration: ev.proposal_period_duration,
        proposal_period_end_timestamp: schedule.proposal_period_end,
        vote_period_start_timestamp: schedule.vote_period_start,
        vote_period_duration: ev.vote_period_duration,
        vote_period_end_timestamp: schedule.vote_period_end,
        claim_period_end_timestamp: schedule.claim_period_end,
    };
    ctx.store.save(&config).await?;

    for (address, params) in proposing {
        link_strategy(ctx, &round.id, &address, params, Purpose::Proposing).await?;
    }
    for (address, params) in voting {
        link_strategy(ctx, &round.id, &address, params, Purpose::Voting).await?;
    }

    for (index, offered) in ev.awards.iter().enumerate() {
        let asset = ctx.ensure_asset(offered).await?;
        let award = Award {
            id: ids::compose(&[&round.id, &index.to_string()]),
            round: round.id.clone(),
            config: config.id.clone(),
            asset: asset.id,
            amount: offered.amount,
        };
        ctx.store.save(&award).await?;
    }

    round.event_state = RoundEventState::Registered;
    round.config = Some(config.id.clone());
    round.registered_at = Some(ctx.timestamp());
    ctx.store.save(&round).await?;

    tracing::info!(
        round = %round.id,
        awards = ev.awards.len(),
        proposing = ev.proposing_strategies.len(),
        voting = ev.voting_strategies.len(),
        vote_period_end = schedule.vote_period_end,
        "round registered"
    );
    Ok(())
}

pub async fn round_cancelled(ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
    let mut round = ctx.require_round(&ctx.meta.address).await?;
    check_transition(
        &round,
        "RoundCancelled",
        &[RoundEventState::Created, RoundEventState::Registered],
    )?;

    round.event_state = RoundEventState::Cancelled;
    round.cancelled_at = Some(ctx.timestamp());
    ctx.store.save(&round).await?;
    tracing::info!(round = %round.id, "round cancelled");
    Ok(())
}

/// Finalization fixes the claim deadline at `finalization + 8 weeks`.
pub async fn round_finalized(ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
    let mut round = ctx.require_round(&ctx.meta.address).await?;
    check_transition(&round, "RoundFinalized", &[RoundEventState::Registered])?;

    let config_id = round
        .config
        .clone()
        .unwrap_or_else(|| ids::timed_round_config_key(&round.id));
    let mut config = ctx
        .store
        .load::<TimedRoundConfig>(&config_id)
        .await?
        .ok_or_else(|| HandlerError::missing(TimedRoundConfig::KIND, config_id))?;

    config.claim_period_end_timestamp = ctx.timestamp().saturating_add(CLAIM_PERIOD_DURATION_SECS);
    ctx.store.save(&config).await?;

    round.event_state = RoundEventState::Finalized;
    round.finalized_at = Some(ctx.timestamp());
    ctx.store.save(&round).await?;
    tracing::info!(
        round = %round.id,
        claim_period_end = config.claim_period_end_timestamp,
        "round finalized"
    );
    Ok(())
}
