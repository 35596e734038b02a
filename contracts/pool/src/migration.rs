//! Import of legacy (v1) positions: the one-time merkle claim of legacy
//! weight and pending yield, mirrors of locked legacy stakes, and minting of
//! the imported yield once its lock expires.
//!
//! Every function here expects the pool synced and `info` settled by the
//! caller; none of them persist `info` or `state`.

use ilv_shared::{interfaces::LegacyPoolClient, merkle, Stake, V1_YIELD_LOCK_PERIOD};
use soroban_sdk::{symbol_short, Address, BytesN, Env, Vec};

use crate::errors::PoolError;
use crate::events::{MerkleClaimedEvent, V1StakeFilledEvent, V1StakeImportedEvent};
use crate::ledger;
use crate::storage::{self, PoolConfig, PoolState, StakeEntry, StakeOrigin, UserInfo};

fn legacy_pool(env: &Env, config: &PoolConfig) -> Result<LegacyPoolClient<'static>, PoolError> {
    let address = config.legacy_pool.as_ref().ok_or(PoolError::NoLegacyPool)?;
    Ok(LegacyPoolClient::new(env, address))
}

/// Verify the leaf `(index, user, weight, pending_v1_rewards)` against the
/// merkle root and fold it into `info`. The committed values must match
/// exactly; there are no partial claims.
pub(crate) fn claim_merkle(
    env: &Env,
    config: &PoolConfig,
    state: &mut PoolState,
    user: &Address,
    info: &mut UserInfo,
    proof: &Vec<BytesN<32>>,
    index: u64,
    weight: i128,
    pending_v1_rewards: i128,
    now: u64,
) -> Result<(), PoolError> {
    let root = config
        .merkle_root
        .as_ref()
        .ok_or(PoolError::MerkleRootNotSet)?;
    if weight < 0 || pending_v1_rewards < 0 {
        return Err(PoolError::InvalidAmount);
    }
    if storage::is_claimed(env, index) {
        return Err(PoolError::IndexAlreadyClaimed);
    }
    if proof.is_empty() {
        return Err(PoolError::InvalidProof);
    }

    let leaf = merkle::leaf(env, index, user, weight, pending_v1_rewards);
    if !merkle::verify(env, proof, root, leaf) {
        return Err(PoolError::InvalidProof);
    }

    storage::set_claimed(env, index);

    ledger::add_weight(state, info, weight)?;
    info.v1_imported_weight = info
        .v1_imported_weight
        .checked_add(weight)
        .ok_or(PoolError::ArithmeticOverflow)?;
    ledger::absorb_v1_weight(state, weight);

    if pending_v1_rewards > 0 {
        let locked_until = now
            .checked_add(V1_YIELD_LOCK_PERIOD)
            .ok_or(PoolError::ArithmeticOverflow)?;
        let entry = StakeEntry {
            stake: Stake {
                value: pending_v1_rewards,
                weight: 0,
                locked_from: now,
                locked_until,
                is_yield: true,
            },
            origin: StakeOrigin::V1Yield,
        };
        ledger::push_stake(env, user, info, &entry)?;
    }

    env.events().publish(
        (symbol_short!("migrate"),),
        MerkleClaimedEvent {
            user: user.clone(),
            index,
            weight,
            pending_v1_rewards,
        },
    );

    Ok(())
}

/// Mirror still-locked legacy stakes into local stakes carrying the legacy
/// value and weight unchanged. Tokens stay in legacy custody.
pub(crate) fn import_locked_stakes(
    env: &Env,
    config: &PoolConfig,
    state: &mut PoolState,
    user: &Address,
    info: &mut UserInfo,
    legacy_ids: &Vec<u32>,
    now: u64,
) -> Result<(), PoolError> {
    let legacy = legacy_pool(env, config)?;

    for legacy_id in legacy_ids.iter() {
        if storage::is_v1_migrated(env, user, legacy_id) {
            return Err(PoolError::AlreadyMigrated);
        }

        let deposit = legacy.get_deposit(user, &legacy_id);
        if deposit.is_yield {
            return Err(PoolError::YieldStakeNotMigratable);
        }
        if deposit.locked_from == 0 || now >= deposit.locked_until {
            return Err(PoolError::StakeUnlocked);
        }
        if deposit.locked_from > config.v1_stake_max_period {
            return Err(PoolError::StakeAfterCutoff);
        }
        if deposit.token_amount <= 0 || deposit.weight < 0 {
            return Err(PoolError::InvalidAmount);
        }

        let entry = StakeEntry {
            stake: Stake {
                value: deposit.token_amount,
                weight: deposit.weight,
                locked_from: deposit.locked_from,
                locked_until: deposit.locked_until,
                is_yield: false,
            },
            origin: StakeOrigin::V1Mirror(user.clone(), legacy_id),
        };
        let stake_id = ledger::push_stake(env, user, info, &entry)?;
        storage::mark_v1_migrated(env, user, legacy_id);
        storage::set_v1_position(env, user, user, legacy_id, stake_id);

        ledger::add_weight(state, info, deposit.weight)?;
        ledger::absorb_v1_weight(state, deposit.weight);

        env.events().publish(
            (symbol_short!("v1import"),),
            V1StakeImportedEvent {
                user: user.clone(),
                legacy_id,
                stake_id,
                value: deposit.token_amount,
                weight: deposit.weight,
            },
        );
    }

    Ok(())
}

/// Re-read a mirrored legacy stake and carry any change of value or weight
/// (partial legacy withdrawals) into the local ledger.
pub(crate) fn fill_stake(
    env: &Env,
    config: &PoolConfig,
    state: &mut PoolState,
    user: &Address,
    info: &mut UserInfo,
    legacy_id: u32,
    stake_id: u32,
) -> Result<(), PoolError> {
    let mut entry = storage::get_stake(env, user, stake_id)?;
    let legacy_owner = match &entry.origin {
        StakeOrigin::V1Mirror(owner, id) if *id == legacy_id => owner.clone(),
        _ => return Err(PoolError::NotV1Mirror),
    };

    let deposit = legacy_pool(env, config)?.get_deposit(&legacy_owner, &legacy_id);
    if deposit.token_amount < 0 || deposit.weight < 0 {
        return Err(PoolError::InvalidAmount);
    }

    let old_weight = entry.stake.weight;
    if deposit.weight >= old_weight {
        ledger::add_weight(state, info, deposit.weight - old_weight)?;
    } else {
        ledger::remove_weight(state, info, old_weight - deposit.weight)?;
    }

    entry.stake.value = deposit.token_amount;
    entry.stake.weight = deposit.weight;
    storage::set_stake(env, user, stake_id, &entry);

    env.events().publish(
        (symbol_short!("v1fill"),),
        V1StakeFilledEvent {
            user: user.clone(),
            legacy_id,
            stake_id,
            old_weight,
            new_weight: deposit.weight,
        },
    );

    Ok(())
}

/// Release the imported v1 yield of every listed stake. Any invalid id fails
/// the whole batch. Returns the amount to mint.
pub(crate) fn take_v1_yield(
    env: &Env,
    user: &Address,
    stake_ids: &Vec<u32>,
    now: u64,
) -> Result<i128, PoolError> {
    if stake_ids.is_empty() {
        return Err(PoolError::InvalidAmount);
    }

    let mut total: i128 = 0;
    for stake_id in stake_ids.iter() {
        let mut entry = storage::get_stake(env, user, stake_id)?;
        if entry.origin != StakeOrigin::V1Yield {
            return Err(PoolError::NotV1YieldStake);
        }
        if entry.stake.value == 0 {
            return Err(PoolError::AlreadyMinted);
        }
        if !entry.stake.is_unlocked(now) {
            return Err(PoolError::YieldLocked);
        }

        total = total
            .checked_add(entry.stake.value)
            .ok_or(PoolError::ArithmeticOverflow)?;
        entry.stake.value = 0;
        storage::set_stake(env, user, stake_id, &entry);
    }

    Ok(total)
}
