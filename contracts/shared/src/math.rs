use soroban_sdk::{Env, U256};

use crate::{
    DECAY_DENOMINATOR, DECAY_NUMERATOR, REWARD_PER_WEIGHT_MULTIPLIER, WEIGHT_MULTIPLIER,
};

/// `a * b / d` for non-negative operands, widening to 256 bits when the
/// product does not fit. Returns `None` on a zero divisor, a negative operand
/// or a quotient that does not fit back into `i128`.
pub fn mul_div(env: &Env, a: i128, b: i128, d: i128) -> Option<i128> {
    if a < 0 || b < 0 || d <= 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        return product.checked_div(d);
    }

    let wide = U256::from_u128(env, a as u128)
        .mul(&U256::from_u128(env, b as u128))
        .div(&U256::from_u128(env, d as u128));
    let narrow = wide.to_u128()?;
    i128::try_from(narrow).ok()
}

/// `a * b / d` rounded up, with the same operand rules as [`mul_div`].
pub fn mul_div_ceil(env: &Env, a: i128, b: i128, d: i128) -> Option<i128> {
    if a < 0 || b < 0 || d <= 0 {
        return None;
    }
    if let Some(product) = a.checked_mul(b) {
        let rounded = product / d;
        return if product % d == 0 {
            Some(rounded)
        } else {
            rounded.checked_add(1)
        };
    }

    let wide = U256::from_u128(env, a as u128)
        .mul(&U256::from_u128(env, b as u128))
        .add(&U256::from_u128(env, (d - 1) as u128))
        .div(&U256::from_u128(env, d as u128));
    let narrow = wide.to_u128()?;
    i128::try_from(narrow).ok()
}

/// Locking multiplier in `WEIGHT_MULTIPLIER` units, linear from 1.0 (no lock)
/// to 2.0 (locked for `max_lock_period`). Durations past the maximum are capped.
pub fn lock_multiplier(lock_duration: u64, max_lock_period: u64) -> Option<i128> {
    if max_lock_period == 0 {
        return None;
    }
    let duration = lock_duration.min(max_lock_period) as i128;
    let bonus = duration
        .checked_mul(WEIGHT_MULTIPLIER)?
        .checked_div(max_lock_period as i128)?;
    WEIGHT_MULTIPLIER.checked_add(bonus)
}

pub fn stake_weight(amount: i128, multiplier: i128) -> Option<i128> {
    amount.checked_mul(multiplier)
}

/// Accumulator increment for distributing `reward` over `weight`.
/// Zero weight distributes nothing.
pub fn rewards_per_weight(env: &Env, reward: i128, weight: i128) -> Option<i128> {
    if weight == 0 {
        return Some(0);
    }
    mul_div(env, reward, REWARD_PER_WEIGHT_MULTIPLIER, weight)
}

/// Reward owed to `weight` for the accumulator moving from `debt` to `rpw`.
pub fn earned(env: &Env, weight: i128, rpw: i128, debt: i128) -> Option<i128> {
    let delta = rpw.checked_sub(debt)?;
    mul_div(env, weight, delta, REWARD_PER_WEIGHT_MULTIPLIER)
}

/// Reward token emitted to one pool over `elapsed` seconds.
pub fn pool_emission(
    env: &Env,
    elapsed: u64,
    ilv_per_second: i128,
    pool_weight: u32,
    total_weight: u32,
) -> Option<i128> {
    if total_weight == 0 || pool_weight == 0 {
        return Some(0);
    }
    let gross = (elapsed as i128).checked_mul(ilv_per_second)?;
    mul_div(env, gross, pool_weight as i128, total_weight as i128)
}

/// Applies every whole decay period that elapsed between `last_update` and
/// `min(now, end_time)`. Returns the decayed rate and the new checkpoint,
/// which only moves in whole `seconds_per_update` steps.
pub fn decay_emission(
    rate: i128,
    last_update: u64,
    seconds_per_update: u64,
    now: u64,
    end_time: u64,
) -> Option<(i128, u64)> {
    if seconds_per_update == 0 {
        return None;
    }
    let horizon = now.min(end_time);
    let mut rate = rate;
    let mut checkpoint = last_update;

    while rate > 0 {
        let next = checkpoint.checked_add(seconds_per_update)?;
        if next > horizon {
            break;
        }
        rate = rate.checked_mul(DECAY_NUMERATOR)? / DECAY_DENOMINATOR;
        checkpoint = next;
    }

    if rate == 0 && horizon > checkpoint {
        // nothing left to decay; skip the remaining whole periods at once
        let periods = (horizon - checkpoint) / seconds_per_update;
        checkpoint = checkpoint.checked_add(periods.checked_mul(seconds_per_update)?)?;
    }

    Some((rate, checkpoint))
}
