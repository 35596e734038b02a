//! Types, constants and fixed-point helpers shared by the factory, the core
//! pools and the revenue vault, so every contract prices weight and yield
//! with the same scales.
#![no_std]
use soroban_sdk::contracttype;

pub mod interfaces;
pub mod math;
pub mod merkle;

// ============================================================================
// Constants
// ============================================================================

/// Seconds in a year (365 days)
pub const ONE_YEAR: u64 = 31_536_000;

/// Longest lock a lockable pool accepts
pub const MAX_STAKE_PERIOD: u64 = 2 * ONE_YEAR;

/// Lock applied to yield compounded into the primary pool
pub const YIELD_LOCK_PERIOD: u64 = ONE_YEAR;

/// Delay before pending v1 yield imported through the merkle claim can be minted
pub const V1_YIELD_LOCK_PERIOD: u64 = ONE_YEAR;

/// Weight of one token unit at multiplier 1.0
pub const WEIGHT_MULTIPLIER: i128 = 1_000_000;

/// Weight per token unit of a yield stake (2.0x)
pub const YIELD_STAKE_WEIGHT_MULTIPLIER: i128 = 2 * WEIGHT_MULTIPLIER;

/// Scale of the per-weight reward accumulators
pub const REWARD_PER_WEIGHT_MULTIPLIER: i128 = 1_000_000_000_000;

/// Emission decay applied once per `seconds_per_update`: rate * 97 / 100
pub const DECAY_NUMERATOR: i128 = 97;
pub const DECAY_DENOMINATOR: i128 = 100;

// ============================================================================
// Staking Types
// ============================================================================

/// One deposit record of a user.
///
/// `locked_until == 0` marks a flexible stake. A locked stake always has
/// `locked_until > locked_from`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Stake {
    pub value: i128,
    pub weight: i128,
    pub locked_from: u64,
    pub locked_until: u64,
    pub is_yield: bool,
}

impl Stake {
    pub fn is_flexible(&self) -> bool {
        self.locked_until == 0
    }

    pub fn is_unlocked(&self, now: u64) -> bool {
        now >= self.locked_until
    }
}

/// Capability descriptor of a core pool.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolKind {
    /// Pool token is the reward token; compounded yield lives here
    Primary,
    /// Liquidity-pool token, lockable
    Pair,
    /// No locking, optional own end time
    Flash,
}

impl PoolKind {
    pub fn supports_locking(&self) -> bool {
        !matches!(self, PoolKind::Flash)
    }
}

/// How a yield claim is paid out.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClaimTarget {
    /// New yield stake in the primary pool
    Compound,
    /// Escrowed reward token
    Escrow,
    /// Reward token
    Token,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingRewards {
    pub yield_rewards: i128,
    pub revenue_share: i128,
}

// ============================================================================
// Cross-Contract Types
// ============================================================================

/// Everything a pool needs from the factory to run one sync step.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmissionSnapshot {
    pub ilv_per_second: i128,
    pub pool_weight: u32,
    pub total_weight: u32,
    pub end_time: u64,
}

/// A deposit as recorded by the frozen v1 pool.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LegacyDeposit {
    pub token_amount: i128,
    pub weight: i128,
    pub locked_from: u64,
    pub locked_until: u64,
    pub is_yield: bool,
}
