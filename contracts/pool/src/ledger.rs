//! Accrual and settlement: the pool-wide accumulators and the per-user
//! debt snapshots taken against them.

use ilv_shared::{
    interfaces::FactoryClient, math, EmissionSnapshot, PendingRewards, Stake,
    REWARD_PER_WEIGHT_MULTIPLIER, YIELD_LOCK_PERIOD, YIELD_STAKE_WEIGHT_MULTIPLIER,
};
use soroban_sdk::{Address, Env};

use crate::errors::PoolError;
use crate::storage::{self, PoolConfig, PoolState, StakeEntry, StakeOrigin, UserInfo};

/// Last timestamp this pool accrues for.
fn accrual_end(config: &PoolConfig, snapshot: &EmissionSnapshot) -> u64 {
    match config.end_time {
        Some(end) => end.min(snapshot.end_time),
        None => snapshot.end_time,
    }
}

/// Advance the yield accumulator to `now` using `snapshot`.
///
/// Accrual is clamped to the pool's window: nothing accrues before
/// `init_time` (the initial `last_sync`) or after the end time. With no
/// weight at all only `last_sync` moves.
pub(crate) fn sync_with(
    env: &Env,
    config: &PoolConfig,
    state: &mut PoolState,
    snapshot: &EmissionSnapshot,
    now: u64,
) -> Result<(), PoolError> {
    state.weight = snapshot.pool_weight;

    let upper = now.min(accrual_end(config, snapshot));
    if upper <= state.last_sync {
        return Ok(());
    }

    let combined = state
        .global_weight
        .checked_add(state.v1_global_weight)
        .ok_or(PoolError::ArithmeticOverflow)?;
    if combined > 0 {
        let reward = math::pool_emission(
            env,
            upper - state.last_sync,
            snapshot.ilv_per_second,
            snapshot.pool_weight,
            snapshot.total_weight,
        )
        .ok_or(PoolError::ArithmeticOverflow)?;
        let increment =
            math::rewards_per_weight(env, reward, combined).ok_or(PoolError::ArithmeticOverflow)?;
        state.yield_rewards_per_weight = state
            .yield_rewards_per_weight
            .checked_add(increment)
            .ok_or(PoolError::ArithmeticOverflow)?;
    }

    state.last_sync = upper;
    Ok(())
}

/// Pull the current emission parameters from the factory and sync.
pub(crate) fn sync(
    env: &Env,
    config: &PoolConfig,
    state: &mut PoolState,
    now: u64,
) -> Result<(), PoolError> {
    if now <= state.last_sync {
        return Ok(());
    }
    let snapshot =
        FactoryClient::new(env, &config.factory).emission_snapshot(&env.current_contract_address());
    sync_with(env, config, state, &snapshot, now)
}

pub(crate) fn settle(env: &Env, state: &PoolState, user: &mut UserInfo) -> Result<(), PoolError> {
    let owed = math::earned(
        env,
        user.total_weight,
        state.yield_rewards_per_weight,
        user.yield_rewards_per_weight_debt,
    )
    .ok_or(PoolError::ArithmeticOverflow)?;
    user.pending_yield = user
        .pending_yield
        .checked_add(owed)
        .ok_or(PoolError::ArithmeticOverflow)?;
    user.yield_rewards_per_weight_debt = state.yield_rewards_per_weight;
    Ok(())
}

pub(crate) fn settle_revenue_share(
    env: &Env,
    state: &PoolState,
    user: &mut UserInfo,
) -> Result<(), PoolError> {
    let owed = math::earned(
        env,
        user.total_weight,
        state.vault_rewards_per_weight,
        user.vault_rewards_per_weight_debt,
    )
    .ok_or(PoolError::ArithmeticOverflow)?;
    user.pending_revenue_share = user
        .pending_revenue_share
        .checked_add(owed)
        .ok_or(PoolError::ArithmeticOverflow)?;
    user.vault_rewards_per_weight_debt = state.vault_rewards_per_weight;
    Ok(())
}

/// Settle both accumulators. Required before any change to `total_weight`.
pub(crate) fn settle_all(env: &Env, state: &PoolState, user: &mut UserInfo) -> Result<(), PoolError> {
    settle(env, state, user)?;
    settle_revenue_share(env, state, user)
}

pub(crate) fn add_weight(
    state: &mut PoolState,
    user: &mut UserInfo,
    weight: i128,
) -> Result<(), PoolError> {
    user.total_weight = user
        .total_weight
        .checked_add(weight)
        .ok_or(PoolError::ArithmeticOverflow)?;
    state.global_weight = state
        .global_weight
        .checked_add(weight)
        .ok_or(PoolError::ArithmeticOverflow)?;
    Ok(())
}

pub(crate) fn remove_weight(
    state: &mut PoolState,
    user: &mut UserInfo,
    weight: i128,
) -> Result<(), PoolError> {
    user.total_weight = user
        .total_weight
        .checked_sub(weight)
        .filter(|w| *w >= 0)
        .ok_or(PoolError::ArithmeticOverflow)?;
    state.global_weight = state
        .global_weight
        .checked_sub(weight)
        .filter(|w| *w >= 0)
        .ok_or(PoolError::ArithmeticOverflow)?;
    Ok(())
}

/// Legacy weight that became local no longer dilutes from the legacy side.
/// The remaining legacy weight floors at zero.
pub(crate) fn absorb_v1_weight(state: &mut PoolState, weight: i128) {
    state.v1_global_weight = if weight >= state.v1_global_weight {
        0
    } else {
        state.v1_global_weight - weight
    };
}

/// Append a stake to the user's list and return its id.
pub(crate) fn push_stake(
    env: &Env,
    user: &Address,
    info: &mut UserInfo,
    entry: &StakeEntry,
) -> Result<u32, PoolError> {
    let id = info.stake_count;
    info.stake_count = id.checked_add(1).ok_or(PoolError::ArithmeticOverflow)?;
    storage::set_stake(env, user, id, entry);
    Ok(id)
}

/// Lock `value` of claimed yield as a new yield stake. `info` must already be
/// settled against `state`.
pub(crate) fn create_yield_stake(
    env: &Env,
    state: &mut PoolState,
    user: &Address,
    info: &mut UserInfo,
    value: i128,
    now: u64,
) -> Result<u32, PoolError> {
    let weight = value
        .checked_mul(YIELD_STAKE_WEIGHT_MULTIPLIER)
        .ok_or(PoolError::ArithmeticOverflow)?;
    let locked_until = now
        .checked_add(YIELD_LOCK_PERIOD)
        .ok_or(PoolError::ArithmeticOverflow)?;
    let entry = StakeEntry {
        stake: Stake {
            value,
            weight,
            locked_from: now,
            locked_until,
            is_yield: true,
        },
        origin: StakeOrigin::Compounded,
    };
    let id = push_stake(env, user, info, &entry)?;
    add_weight(state, info, weight)?;
    state.pool_token_reserve = state
        .pool_token_reserve
        .checked_add(value)
        .ok_or(PoolError::ArithmeticOverflow)?;
    Ok(id)
}

/// Fold revenue into the revenue accumulator, pro rata to the local weight
/// present right now. Unmigrated legacy weight cannot claim here and is left
/// out of the split.
pub(crate) fn distribute_revenue(
    env: &Env,
    state: &mut PoolState,
    amount: i128,
) -> Result<(), PoolError> {
    let total = amount
        .checked_add(state.undistributed_revenue)
        .ok_or(PoolError::ArithmeticOverflow)?;

    if state.global_weight == 0 {
        state.undistributed_revenue = total;
        return Ok(());
    }

    let increment = math::rewards_per_weight(env, total, state.global_weight)
        .ok_or(PoolError::ArithmeticOverflow)?;
    state.vault_rewards_per_weight = state
        .vault_rewards_per_weight
        .checked_add(increment)
        .ok_or(PoolError::ArithmeticOverflow)?;

    // whatever the accumulator could not represent waits for the next deposit
    let distributed =
        math::mul_div_ceil(env, increment, state.global_weight, REWARD_PER_WEIGHT_MULTIPLIER)
            .ok_or(PoolError::ArithmeticOverflow)?;
    state.undistributed_revenue = total
        .checked_sub(distributed)
        .ok_or(PoolError::ArithmeticOverflow)?;
    Ok(())
}

/// Rewards `user` could claim at `now`, without touching storage.
pub(crate) fn preview(
    env: &Env,
    config: &PoolConfig,
    state: &PoolState,
    user: &UserInfo,
    now: u64,
) -> Result<PendingRewards, PoolError> {
    let mut state = state.clone();
    if now > state.last_sync {
        let snapshot = FactoryClient::new(env, &config.factory)
            .preview_emission(&env.current_contract_address());
        sync_with(env, config, &mut state, &snapshot, now)?;
    }
    let mut user = user.clone();
    settle_all(env, &state, &mut user)?;
    Ok(PendingRewards {
        yield_rewards: user.pending_yield,
        revenue_share: user.pending_revenue_share,
    })
}
