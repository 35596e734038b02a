use ilv_shared::{PoolKind, Stake};
use soroban_sdk::{contracttype, Address, BytesN, Env};

use crate::errors::PoolError;

pub(crate) const DAY_IN_LEDGERS: u32 = 17_280;
pub(crate) const INSTANCE_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
pub(crate) const INSTANCE_LIFETIME_THRESHOLD: u32 = INSTANCE_BUMP_AMOUNT - DAY_IN_LEDGERS;
pub(crate) const USER_BUMP_AMOUNT: u32 = 120 * DAY_IN_LEDGERS;
pub(crate) const USER_LIFETIME_THRESHOLD: u32 = USER_BUMP_AMOUNT - 20 * DAY_IN_LEDGERS;

/// Bits per claimed-index bitmap word.
const CLAIM_WORD_BITS: u64 = 128;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolConfig {
    pub admin: Address,
    pub kind: PoolKind,
    pub pool_token: Address,
    pub reward_token: Address,
    pub factory: Address,
    /// Where compounded yield is staked. The pool itself for `Primary`.
    pub primary_pool: Address,
    pub legacy_pool: Option<Address>,
    pub vault: Option<Address>,
    pub init_time: u64,
    /// Pool-specific end of accrual, on top of the factory's.
    pub end_time: Option<u64>,
    /// Legacy stakes locked after this timestamp cannot be imported.
    pub v1_stake_max_period: u64,
    pub merkle_root: Option<BytesN<32>>,
    pub paused: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolState {
    /// Pool weight as of the last sync
    pub weight: u32,
    pub last_sync: u64,
    pub yield_rewards_per_weight: i128,
    pub vault_rewards_per_weight: i128,
    /// Sum of every user's `total_weight`
    pub global_weight: i128,
    /// Weight still sitting unmigrated in the legacy pool
    pub v1_global_weight: i128,
    pub pool_token_reserve: i128,
    /// Revenue received while no weight existed, folded into the next distribution
    pub undistributed_revenue: i128,
}

#[contracttype]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserInfo {
    pub pending_yield: i128,
    pub pending_revenue_share: i128,
    pub total_weight: i128,
    pub yield_rewards_per_weight_debt: i128,
    pub vault_rewards_per_weight_debt: i128,
    pub stake_count: u32,
    pub flexible_stake: Option<u32>,
    /// Legacy weight imported through the merkle claim, not backed by a stake
    pub v1_imported_weight: i128,
}

impl UserInfo {
    /// Nothing owned and nothing pending.
    pub fn is_empty(&self) -> bool {
        self.pending_yield == 0
            && self.pending_revenue_share == 0
            && self.total_weight == 0
            && self.stake_count == 0
            && self.v1_imported_weight == 0
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StakeOrigin {
    Deposit,
    /// Yield compounded into the primary pool
    Compounded,
    /// Mirror of a locked legacy stake: (legacy owner, legacy stake id)
    V1Mirror(Address, u32),
    /// Pending v1 yield imported through the merkle claim
    V1Yield,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakeEntry {
    pub stake: Stake,
    pub origin: StakeOrigin,
}

#[contracttype]
pub enum DataKey {
    Config,
    State,
    User(Address),
    Stake(Address, u32),
    /// (holder, legacy owner, legacy id)
    V1Position(Address, Address, u32),
    V1Migrated(Address, u32),
    ClaimedWord(u64),
}

pub(crate) fn extend_instance_ttl(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

fn extend_persistent(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, USER_LIFETIME_THRESHOLD, USER_BUMP_AMOUNT);
}

// ========== Config & State ==========

pub(crate) fn has_config(env: &Env) -> bool {
    env.storage().instance().has(&DataKey::Config)
}

pub(crate) fn get_config(env: &Env) -> Result<PoolConfig, PoolError> {
    env.storage()
        .instance()
        .get(&DataKey::Config)
        .ok_or(PoolError::NotInitialized)
}

pub(crate) fn set_config(env: &Env, config: &PoolConfig) {
    env.storage().instance().set(&DataKey::Config, config);
}

pub(crate) fn get_state(env: &Env) -> Result<PoolState, PoolError> {
    env.storage()
        .instance()
        .get(&DataKey::State)
        .ok_or(PoolError::NotInitialized)
}

pub(crate) fn set_state(env: &Env, state: &PoolState) {
    env.storage().instance().set(&DataKey::State, state);
}

// ========== Users & Stakes ==========

pub(crate) fn get_user(env: &Env, user: &Address) -> UserInfo {
    env.storage()
        .persistent()
        .get(&DataKey::User(user.clone()))
        .unwrap_or_default()
}

pub(crate) fn set_user(env: &Env, user: &Address, info: &UserInfo) {
    let key = DataKey::User(user.clone());
    env.storage().persistent().set(&key, info);
    extend_persistent(env, &key);
}

pub(crate) fn remove_user(env: &Env, user: &Address) {
    env.storage().persistent().remove(&DataKey::User(user.clone()));
}

pub(crate) fn get_stake(env: &Env, user: &Address, id: u32) -> Result<StakeEntry, PoolError> {
    env.storage()
        .persistent()
        .get(&DataKey::Stake(user.clone(), id))
        .ok_or(PoolError::StakeNotFound)
}

pub(crate) fn set_stake(env: &Env, user: &Address, id: u32, entry: &StakeEntry) {
    let key = DataKey::Stake(user.clone(), id);
    env.storage().persistent().set(&key, entry);
    extend_persistent(env, &key);
}

pub(crate) fn remove_stake(env: &Env, user: &Address, id: u32) {
    env.storage().persistent().remove(&DataKey::Stake(user.clone(), id));
}

// ========== Legacy Migration ==========

pub(crate) fn get_v1_position(
    env: &Env,
    holder: &Address,
    legacy_owner: &Address,
    legacy_id: u32,
) -> Option<u32> {
    env.storage().persistent().get(&DataKey::V1Position(
        holder.clone(),
        legacy_owner.clone(),
        legacy_id,
    ))
}

pub(crate) fn set_v1_position(
    env: &Env,
    holder: &Address,
    legacy_owner: &Address,
    legacy_id: u32,
    stake_id: u32,
) {
    let key = DataKey::V1Position(holder.clone(), legacy_owner.clone(), legacy_id);
    env.storage().persistent().set(&key, &stake_id);
    extend_persistent(env, &key);
}

pub(crate) fn remove_v1_position(env: &Env, holder: &Address, legacy_owner: &Address, legacy_id: u32) {
    env.storage().persistent().remove(&DataKey::V1Position(
        holder.clone(),
        legacy_owner.clone(),
        legacy_id,
    ));
}

pub(crate) fn is_v1_migrated(env: &Env, legacy_owner: &Address, legacy_id: u32) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::V1Migrated(legacy_owner.clone(), legacy_id))
}

pub(crate) fn mark_v1_migrated(env: &Env, legacy_owner: &Address, legacy_id: u32) {
    let key = DataKey::V1Migrated(legacy_owner.clone(), legacy_id);
    env.storage().persistent().set(&key, &true);
    extend_persistent(env, &key);
}

pub(crate) fn is_claimed(env: &Env, index: u64) -> bool {
    let word: u128 = env
        .storage()
        .persistent()
        .get(&DataKey::ClaimedWord(index / CLAIM_WORD_BITS))
        .unwrap_or(0);
    word & (1u128 << (index % CLAIM_WORD_BITS)) != 0
}

pub(crate) fn set_claimed(env: &Env, index: u64) {
    let key = DataKey::ClaimedWord(index / CLAIM_WORD_BITS);
    let word: u128 = env.storage().persistent().get(&key).unwrap_or(0);
    env.storage()
        .persistent()
        .set(&key, &(word | (1u128 << (index % CLAIM_WORD_BITS))));
    extend_persistent(env, &key);
}
