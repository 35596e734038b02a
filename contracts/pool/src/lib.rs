#![no_std]

mod errors;
mod events;
mod ledger;
mod migration;
mod storage;


pub use errors::PoolError;
pub use storage::{PoolConfig, PoolState, StakeEntry, StakeOrigin, UserInfo};

use events::{
    FundsMovedEvent, LockUpdatedEvent, RevenueClaimedEvent, RevenueReceivedEvent, StakedEvent,
    SyncedEvent, UnstakedEvent, V1YieldMintedEvent, YieldClaimedEvent,
};
use ilv_shared::{
    interfaces::{CorePoolClient, FactoryClient, LegacyPoolClient},
    math, ClaimTarget, EmissionSnapshot, PendingRewards, PoolKind, Stake, MAX_STAKE_PERIOD,
};
use soroban_sdk::{
    contract, contractimpl, contracttype, log, symbol_short, token, Address, BytesN, Env, Vec,
};

/// Deployment parameters of a pool.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolInit {
    pub kind: PoolKind,
    pub pool_token: Address,
    pub reward_token: Address,
    pub factory: Address,
    /// Required for pair and flash pools, ignored for the primary pool
    pub primary_pool: Option<Address>,
    pub legacy_pool: Option<Address>,
    pub init_time: u64,
    pub end_time: Option<u64>,
    pub v1_stake_max_period: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnstakeRequest {
    pub stake_id: u32,
    pub value: i128,
}

#[contract]
pub struct StakingPool;

#[contractimpl]
impl StakingPool {
    // ========== Admin Functions ==========

    pub fn initialize(env: Env, admin: Address, init: PoolInit) -> Result<(), PoolError> {
        if storage::has_config(&env) {
            return Err(PoolError::AlreadyInitialized);
        }

        let this = env.current_contract_address();
        let primary_pool = match init.kind {
            PoolKind::Primary => {
                if init.pool_token != init.reward_token {
                    return Err(PoolError::InvalidConfiguration);
                }
                this.clone()
            }
            PoolKind::Pair | PoolKind::Flash => {
                let primary = init.primary_pool.ok_or(PoolError::InvalidConfiguration)?;
                if primary == this {
                    return Err(PoolError::InvalidConfiguration);
                }
                primary
            }
        };
        if let Some(end) = init.end_time {
            if end <= init.init_time {
                return Err(PoolError::InvalidConfiguration);
            }
        }

        admin.require_auth();

        let v1_global_weight = match &init.legacy_pool {
            Some(legacy) => LegacyPoolClient::new(&env, legacy).users_locking_weight(),
            None => 0,
        };

        let config = PoolConfig {
            admin: admin.clone(),
            kind: init.kind,
            pool_token: init.pool_token,
            reward_token: init.reward_token,
            factory: init.factory,
            primary_pool,
            legacy_pool: init.legacy_pool,
            vault: None,
            init_time: init.init_time,
            end_time: init.end_time,
            v1_stake_max_period: init.v1_stake_max_period,
            merkle_root: None,
            paused: false,
        };
        let state = PoolState {
            weight: 0,
            last_sync: init.init_time,
            yield_rewards_per_weight: 0,
            vault_rewards_per_weight: 0,
            global_weight: 0,
            v1_global_weight,
            pool_token_reserve: 0,
            undistributed_revenue: 0,
        };

        storage::set_config(&env, &config);
        storage::set_state(&env, &state);
        storage::extend_instance_ttl(&env);

        log!(&env, "Staking pool initialized by admin: {}", admin);

        Ok(())
    }

    pub fn set_merkle_root(env: Env, admin: Address, root: BytesN<32>) -> Result<(), PoolError> {
        let mut config = Self::require_admin(&env, &admin)?;
        config.merkle_root = Some(root);
        storage::set_config(&env, &config);
        log!(&env, "Merkle root updated");
        Ok(())
    }

    /// Set the only address allowed to push revenue into this pool.
    pub fn set_vault(env: Env, admin: Address, vault: Address) -> Result<(), PoolError> {
        let mut config = Self::require_admin(&env, &admin)?;
        if vault == env.current_contract_address() {
            return Err(PoolError::ZeroAddress);
        }
        config.vault = Some(vault.clone());
        storage::set_config(&env, &config);
        log!(&env, "Vault set to: {}", vault);
        Ok(())
    }

    /// Overwrite the unmigrated legacy weight. The pool is synced with the
    /// old value first.
    pub fn set_v1_global_weight(env: Env, admin: Address, weight: i128) -> Result<(), PoolError> {
        let config = Self::require_admin(&env, &admin)?;
        if weight < 0 {
            return Err(PoolError::InvalidAmount);
        }
        let (_, mut state, now) = Self::load(&env)?;
        ledger::sync(&env, &config, &mut state, now)?;
        state.v1_global_weight = weight;
        storage::set_state(&env, &state);
        log!(&env, "v1 global weight set to: {}", weight);
        Ok(())
    }

    pub fn set_paused(env: Env, admin: Address, paused: bool) -> Result<(), PoolError> {
        let mut config = Self::require_admin(&env, &admin)?;
        config.paused = paused;
        storage::set_config(&env, &config);
        log!(&env, "Pause set to: {}", paused);
        Ok(())
    }

    // ========== Staking ==========

    /// Deposit `amount` pool tokens. A zero `lock_duration` tops up the
    /// user's flexible stake, anything else opens a new locked stake.
    pub fn stake(env: Env, user: Address, amount: i128, lock_duration: u64) -> Result<u32, PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;

        if amount <= 0 {
            return Err(PoolError::InvalidAmount);
        }
        if lock_duration > 0 && !config.kind.supports_locking() {
            return Err(PoolError::LockingNotSupported);
        }
        if lock_duration > MAX_STAKE_PERIOD {
            return Err(PoolError::InvalidLockDuration);
        }
        if let Some(end) = config.end_time {
            if now >= end {
                return Err(PoolError::PoolDisabled);
            }
        }

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        let multiplier =
            math::lock_multiplier(lock_duration, MAX_STAKE_PERIOD).ok_or(PoolError::ArithmeticOverflow)?;
        let weight = math::stake_weight(amount, multiplier).ok_or(PoolError::ArithmeticOverflow)?;

        let (stake_id, locked_until) = match (lock_duration, info.flexible_stake) {
            (0, Some(id)) => {
                let mut entry = storage::get_stake(&env, &user, id)?;
                entry.stake.value = entry
                    .stake
                    .value
                    .checked_add(amount)
                    .ok_or(PoolError::ArithmeticOverflow)?;
                entry.stake.weight = entry
                    .stake
                    .weight
                    .checked_add(weight)
                    .ok_or(PoolError::ArithmeticOverflow)?;
                storage::set_stake(&env, &user, id, &entry);
                (id, 0)
            }
            (0, None) => {
                let entry = Self::deposit_entry(amount, weight, 0, 0);
                let id = ledger::push_stake(&env, &user, &mut info, &entry)?;
                info.flexible_stake = Some(id);
                (id, 0)
            }
            (duration, _) => {
                let locked_until = now
                    .checked_add(duration)
                    .ok_or(PoolError::ArithmeticOverflow)?;
                let entry = Self::deposit_entry(amount, weight, now, locked_until);
                (ledger::push_stake(&env, &user, &mut info, &entry)?, locked_until)
            }
        };

        ledger::add_weight(&mut state, &mut info, weight)?;
        state.pool_token_reserve = state
            .pool_token_reserve
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;

        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        token::Client::new(&env, &config.pool_token).transfer(
            &user,
            &env.current_contract_address(),
            &amount,
        );

        env.events().publish(
            (symbol_short!("stake"),),
            StakedEvent {
                user: user.clone(),
                stake_id,
                value: amount,
                locked_until,
            },
        );

        log!(&env, "User {} staked {} (stake {}, locked until {})", user, amount, stake_id, locked_until);

        Ok(stake_id)
    }

    /// Withdraw `value` from an unlocked stake. Yield stakes are paid by
    /// minting fresh reward tokens.
    pub fn unstake_locked(env: Env, user: Address, stake_id: u32, value: i128) -> Result<(), PoolError> {
        user.require_auth();
        let mut requests = Vec::new(&env);
        requests.push_back(UnstakeRequest { stake_id, value });
        Self::unstake_batch(&env, &user, &requests)
    }

    pub fn unstake_flexible(env: Env, user: Address, value: i128) -> Result<(), PoolError> {
        user.require_auth();
        let stake_id = storage::get_user(&env, &user)
            .flexible_stake
            .ok_or(PoolError::StakeNotFound)?;
        let mut requests = Vec::new(&env);
        requests.push_back(UnstakeRequest { stake_id, value });
        Self::unstake_batch(&env, &user, &requests)
    }

    /// All-or-nothing batch of `unstake_locked`.
    pub fn unstake_locked_multiple(
        env: Env,
        user: Address,
        requests: Vec<UnstakeRequest>,
    ) -> Result<(), PoolError> {
        user.require_auth();
        if requests.is_empty() {
            return Err(PoolError::InvalidAmount);
        }
        Self::unstake_batch(&env, &user, &requests)
    }

    /// Extend (or first set) the lock of a deposit stake.
    pub fn update_stake_lock(
        env: Env,
        user: Address,
        stake_id: u32,
        locked_until: u64,
    ) -> Result<(), PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;
        if !config.kind.supports_locking() {
            return Err(PoolError::LockingNotSupported);
        }

        let mut entry = storage::get_stake(&env, &user, stake_id)?;
        if entry.origin != StakeOrigin::Deposit {
            return Err(PoolError::StakeImmutable);
        }
        if locked_until < entry.stake.locked_until {
            return Err(PoolError::LockNotExtended);
        }
        if locked_until <= now {
            return Err(PoolError::InvalidLockDuration);
        }
        let locked_from = if entry.stake.locked_from == 0 {
            now
        } else {
            entry.stake.locked_from
        };
        if locked_until - locked_from > MAX_STAKE_PERIOD {
            return Err(PoolError::InvalidLockDuration);
        }

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        let multiplier = math::lock_multiplier(locked_until - locked_from, MAX_STAKE_PERIOD)
            .ok_or(PoolError::ArithmeticOverflow)?;
        let new_weight =
            math::stake_weight(entry.stake.value, multiplier).ok_or(PoolError::ArithmeticOverflow)?;
        let old_weight = entry.stake.weight;
        if new_weight >= old_weight {
            ledger::add_weight(&mut state, &mut info, new_weight - old_weight)?;
        } else {
            ledger::remove_weight(&mut state, &mut info, old_weight - new_weight)?;
        }

        if info.flexible_stake == Some(stake_id) {
            info.flexible_stake = None;
        }
        entry.stake.locked_from = locked_from;
        entry.stake.locked_until = locked_until;
        entry.stake.weight = new_weight;

        storage::set_stake(&env, &user, stake_id, &entry);
        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        env.events().publish(
            (symbol_short!("lock"),),
            LockUpdatedEvent {
                user: user.clone(),
                stake_id,
                locked_from,
                locked_until,
            },
        );

        log!(&env, "User {} locked stake {} until {}", user, stake_id, locked_until);

        Ok(())
    }

    /// Move the caller's whole position to an address that holds nothing in
    /// this pool.
    pub fn move_funds_from_wallet(env: Env, user: Address, to: Address) -> Result<(), PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;
        if to == user {
            return Err(PoolError::InvalidConfiguration);
        }
        if !storage::get_user(&env, &to).is_empty() {
            return Err(PoolError::DestinationNotEmpty);
        }

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        for stake_id in 0..info.stake_count {
            let entry = storage::get_stake(&env, &user, stake_id)?;
            if let StakeOrigin::V1Mirror(legacy_owner, legacy_id) = &entry.origin {
                storage::remove_v1_position(&env, &user, legacy_owner, *legacy_id);
                storage::set_v1_position(&env, &to, legacy_owner, *legacy_id, stake_id);
            }
            storage::set_stake(&env, &to, stake_id, &entry);
            storage::remove_stake(&env, &user, stake_id);
        }

        storage::set_user(&env, &to, &info);
        storage::remove_user(&env, &user);
        storage::set_state(&env, &state);

        env.events().publish(
            (symbol_short!("moved"),),
            FundsMovedEvent {
                from: user.clone(),
                to: to.clone(),
            },
        );

        log!(&env, "Moved position of {} to {}", user, to);

        Ok(())
    }

    // ========== Yield ==========

    /// Advance the yield accumulator to the current time.
    pub fn sync(env: Env) -> Result<(), PoolError> {
        let (config, mut state, now) = Self::load(&env)?;
        ledger::sync(&env, &config, &mut state, now)?;
        storage::set_state(&env, &state);
        env.events().publish(
            (symbol_short!("sync"),),
            SyncedEvent {
                yield_rewards_per_weight: state.yield_rewards_per_weight,
                last_sync: state.last_sync,
            },
        );
        Ok(())
    }

    /// Sync with parameters pushed by the factory before it changes them.
    pub fn sync_from_factory(env: Env, snapshot: EmissionSnapshot) -> Result<(), PoolError> {
        let (config, mut state, now) = Self::load(&env)?;
        config.factory.require_auth();
        ledger::sync_with(&env, &config, &mut state, &snapshot, now)?;
        storage::set_state(&env, &state);
        Ok(())
    }

    pub fn claim_yield_rewards(env: Env, user: Address, target: ClaimTarget) -> Result<i128, PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        let amount = info.pending_yield;
        info.pending_yield = 0;
        if amount > 0 && target == ClaimTarget::Compound && config.kind == PoolKind::Primary {
            ledger::create_yield_stake(&env, &mut state, &user, &mut info, amount, now)?;
        }

        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        if amount > 0 {
            Self::pay_yield(&env, &config, &user, amount, target);
            Self::publish_claim(&env, &user, amount, target);
        }

        Ok(amount)
    }

    /// Claim from several pools in one call, compounding into this (primary)
    /// pool. `targets[i]` applies to `pools[i]`.
    pub fn claim_yield_rewards_multiple(
        env: Env,
        user: Address,
        pools: Vec<Address>,
        targets: Vec<ClaimTarget>,
    ) -> Result<i128, PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;
        Self::require_primary(&config)?;
        if pools.is_empty() || pools.len() != targets.len() {
            return Err(PoolError::InvalidConfiguration);
        }

        let this = env.current_contract_address();
        let factory = FactoryClient::new(&env, &config.factory);
        for pool in pools.iter() {
            if !factory.pool_exists(&pool) {
                return Err(PoolError::UnknownPool);
            }
        }

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        let mut total: i128 = 0;
        let mut compounded: i128 = 0;
        let mut local_payouts = Vec::new(&env);
        for (pool, target) in pools.iter().zip(targets.iter()) {
            let amount = if pool == this {
                let amount = info.pending_yield;
                info.pending_yield = 0;
                if amount > 0 && target != ClaimTarget::Compound {
                    local_payouts.push_back((amount, target));
                }
                amount
            } else {
                CorePoolClient::new(&env, &pool).claim_yield_from_router(&this, &user, &target)
            };

            if target == ClaimTarget::Compound {
                compounded = compounded
                    .checked_add(amount)
                    .ok_or(PoolError::ArithmeticOverflow)?;
            }
            total = total.checked_add(amount).ok_or(PoolError::ArithmeticOverflow)?;
        }

        if compounded > 0 {
            ledger::create_yield_stake(&env, &mut state, &user, &mut info, compounded, now)?;
        }

        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        for (amount, target) in local_payouts.iter() {
            Self::pay_yield(&env, &config, &user, amount, target);
            Self::publish_claim(&env, &user, amount, target);
        }
        if compounded > 0 {
            Self::publish_claim(&env, &user, compounded, ClaimTarget::Compound);
        }

        log!(&env, "User {} claimed {} yield across {} pools", user, total, pools.len());

        Ok(total)
    }

    /// Claim leg run on behalf of the primary pool. Compounded amounts are
    /// returned unpaid; the primary pool stakes them.
    pub fn claim_yield_from_router(
        env: Env,
        router: Address,
        staker: Address,
        target: ClaimTarget,
    ) -> Result<i128, PoolError> {
        let (config, mut state, now) = Self::load(&env)?;
        Self::require_router(&config, &router)?;
        Self::require_active(&config)?;

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &staker);
        ledger::settle_all(&env, &state, &mut info)?;

        let amount = info.pending_yield;
        info.pending_yield = 0;
        storage::set_user(&env, &staker, &info);
        storage::set_state(&env, &state);

        if amount > 0 {
            if target != ClaimTarget::Compound {
                Self::pay_yield(&env, &config, &staker, amount, target);
            }
            Self::publish_claim(&env, &staker, amount, target);
        }

        Ok(amount)
    }

    /// Stake compounded yield claimed in another registered pool.
    pub fn stake_as_pool(env: Env, pool: Address, staker: Address, value: i128) -> Result<(), PoolError> {
        pool.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_primary(&config)?;
        if !FactoryClient::new(&env, &config.factory).pool_exists(&pool) {
            return Err(PoolError::UnknownPool);
        }
        if value <= 0 {
            return Err(PoolError::InvalidAmount);
        }

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &staker);
        ledger::settle_all(&env, &state, &mut info)?;

        let stake_id = ledger::create_yield_stake(&env, &mut state, &staker, &mut info, value, now)?;
        let locked_until = storage::get_stake(&env, &staker, stake_id)?.stake.locked_until;

        storage::set_user(&env, &staker, &info);
        storage::set_state(&env, &state);

        env.events().publish(
            (symbol_short!("stake"),),
            StakedEvent {
                user: staker.clone(),
                stake_id,
                value,
                locked_until,
            },
        );

        log!(&env, "Pool {} staked {} yield for {}", pool, value, staker);

        Ok(())
    }

    // ========== Revenue Share ==========

    /// Record revenue the vault has just transferred to this pool.
    pub fn receive_vault_rewards(env: Env, amount: i128) -> Result<(), PoolError> {
        let (config, mut state, _) = Self::load(&env)?;
        let vault = config.vault.ok_or(PoolError::NotVault)?;
        vault.require_auth();
        if amount <= 0 {
            return Err(PoolError::InvalidAmount);
        }

        ledger::distribute_revenue(&env, &mut state, amount)?;
        storage::set_state(&env, &state);

        env.events().publish(
            (symbol_short!("revshare"),),
            RevenueReceivedEvent {
                amount,
                vault_rewards_per_weight: state.vault_rewards_per_weight,
            },
        );

        log!(&env, "Received {} revenue from vault", amount);

        Ok(())
    }

    pub fn claim_vault_rewards(env: Env, user: Address) -> Result<i128, PoolError> {
        user.require_auth();
        let (config, state, _) = Self::load(&env)?;
        Self::require_active(&config)?;
        Self::pay_revenue_share(&env, &config, &state, &user)
    }

    pub fn claim_vault_rewards_multiple(
        env: Env,
        user: Address,
        pools: Vec<Address>,
    ) -> Result<i128, PoolError> {
        user.require_auth();

        let (config, state, _) = Self::load(&env)?;
        Self::require_active(&config)?;
        Self::require_primary(&config)?;
        if pools.is_empty() {
            return Err(PoolError::InvalidConfiguration);
        }

        let this = env.current_contract_address();
        let factory = FactoryClient::new(&env, &config.factory);
        let mut total: i128 = 0;
        for pool in pools.iter() {
            if !factory.pool_exists(&pool) {
                return Err(PoolError::UnknownPool);
            }
            let amount = if pool == this {
                Self::pay_revenue_share(&env, &config, &state, &user)?
            } else {
                CorePoolClient::new(&env, &pool).claim_vault_from_router(&this, &user)
            };
            total = total.checked_add(amount).ok_or(PoolError::ArithmeticOverflow)?;
        }

        Ok(total)
    }

    pub fn claim_vault_from_router(env: Env, router: Address, staker: Address) -> Result<i128, PoolError> {
        let (config, state, _) = Self::load(&env)?;
        Self::require_router(&config, &router)?;
        Self::require_active(&config)?;
        Self::pay_revenue_share(&env, &config, &state, &staker)
    }

    // ========== Migration ==========

    /// One-time import of the caller's legacy weight and pending v1 yield,
    /// optionally together with locked legacy stakes.
    pub fn execute_migration(
        env: Env,
        user: Address,
        proof: Vec<BytesN<32>>,
        index: u64,
        weight: i128,
        pending_v1_rewards: i128,
        stake_ids: Vec<u32>,
    ) -> Result<(), PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        migration::claim_merkle(
            &env,
            &config,
            &mut state,
            &user,
            &mut info,
            &proof,
            index,
            weight,
            pending_v1_rewards,
            now,
        )?;
        if !stake_ids.is_empty() {
            migration::import_locked_stakes(&env, &config, &mut state, &user, &mut info, &stake_ids, now)?;
        }

        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        log!(&env, "User {} migrated merkle index {}", user, index);

        Ok(())
    }

    pub fn migrate_locked_stakes(env: Env, user: Address, stake_ids: Vec<u32>) -> Result<(), PoolError> {
        user.require_auth();

        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;
        if stake_ids.is_empty() {
            return Err(PoolError::InvalidAmount);
        }

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        migration::import_locked_stakes(&env, &config, &mut state, &user, &mut info, &stake_ids, now)?;

        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        log!(&env, "User {} migrated {} locked stakes", user, stake_ids.len());

        Ok(())
    }

    /// Re-sync a mirrored legacy stake with the legacy pool. Anyone may call.
    pub fn fill_v1_stake_id(
        env: Env,
        user: Address,
        legacy_id: u32,
        stake_id: u32,
    ) -> Result<(), PoolError> {
        let (config, mut state, now) = Self::load(&env)?;
        Self::require_active(&config)?;

        ledger::sync(&env, &config, &mut state, now)?;
        let mut info = storage::get_user(&env, &user);
        ledger::settle_all(&env, &state, &mut info)?;

        migration::fill_stake(&env, &config, &mut state, &user, &mut info, legacy_id, stake_id)?;

        storage::set_user(&env, &user, &info);
        storage::set_state(&env, &state);

        Ok(())
    }

    pub fn mint_v1_yield(env: Env, user: Address, stake_id: u32) -> Result<i128, PoolError> {
        let mut stake_ids = Vec::new(&env);
        stake_ids.push_back(stake_id);
        Self::mint_v1_yield_multiple(env, user, stake_ids)
    }

    /// Mint the imported v1 yield of unlocked entitlement stakes. Any invalid
    /// id fails the whole batch.
    pub fn mint_v1_yield_multiple(env: Env, user: Address, stake_ids: Vec<u32>) -> Result<i128, PoolError> {
        user.require_auth();

        let (config, _, now) = Self::load(&env)?;
        Self::require_active(&config)?;

        let amount = migration::take_v1_yield(&env, &user, &stake_ids, now)?;
        FactoryClient::new(&env, &config.factory).mint_yield_to(
            &env.current_contract_address(),
            &user,
            &amount,
            &false,
        );

        env.events().publish(
            (symbol_short!("v1mint"),),
            V1YieldMintedEvent {
                user: user.clone(),
                amount,
            },
        );

        log!(&env, "User {} minted {} v1 yield", user, amount);

        Ok(amount)
    }

    // ========== Views ==========

    pub fn pending_rewards(env: Env, user: Address) -> Result<PendingRewards, PoolError> {
        let config = storage::get_config(&env)?;
        let state = storage::get_state(&env)?;
        let info = storage::get_user(&env, &user);
        ledger::preview(&env, &config, &state, &info, env.ledger().timestamp())
    }

    /// Tokens staked by `user`, mirrored legacy stakes included, imported v1
    /// yield excluded.
    pub fn balance_of(env: Env, user: Address) -> Result<i128, PoolError> {
        let info = storage::get_user(&env, &user);
        let mut balance: i128 = 0;
        for stake_id in 0..info.stake_count {
            let entry = storage::get_stake(&env, &user, stake_id)?;
            if entry.origin != StakeOrigin::V1Yield {
                balance = balance
                    .checked_add(entry.stake.value)
                    .ok_or(PoolError::ArithmeticOverflow)?;
            }
        }
        Ok(balance)
    }

    pub fn get_stake(env: Env, user: Address, stake_id: u32) -> Result<Stake, PoolError> {
        Ok(storage::get_stake(&env, &user, stake_id)?.stake)
    }

    pub fn get_stake_entry(env: Env, user: Address, stake_id: u32) -> Result<StakeEntry, PoolError> {
        storage::get_stake(&env, &user, stake_id)
    }

    pub fn get_stakes_length(env: Env, user: Address) -> u32 {
        storage::get_user(&env, &user).stake_count
    }

    pub fn get_user(env: Env, user: Address) -> UserInfo {
        storage::get_user(&env, &user)
    }

    /// Stake id under `user` mirroring `legacy_owner`'s legacy stake. The
    /// owner differs from `user` once the position has been moved.
    pub fn get_v1_stake_position(
        env: Env,
        user: Address,
        legacy_owner: Address,
        legacy_id: u32,
    ) -> Option<u32> {
        storage::get_v1_position(&env, &user, &legacy_owner, legacy_id)
    }

    pub fn get_v1_stake_id(env: Env, user: Address, stake_id: u32) -> Option<u32> {
        match storage::get_stake(&env, &user, stake_id).ok()?.origin {
            StakeOrigin::V1Mirror(_, legacy_id) => Some(legacy_id),
            _ => None,
        }
    }

    pub fn is_index_claimed(env: Env, index: u64) -> bool {
        storage::is_claimed(&env, index)
    }

    pub fn pool_state(env: Env) -> Result<PoolState, PoolError> {
        storage::get_state(&env)
    }

    pub fn pool_token_reserve(env: Env) -> Result<i128, PoolError> {
        Ok(storage::get_state(&env)?.pool_token_reserve)
    }

    /// Local reserve plus whatever the legacy pool still holds.
    pub fn total_reserves(env: Env) -> Result<i128, PoolError> {
        let config = storage::get_config(&env)?;
        let local = storage::get_state(&env)?.pool_token_reserve;
        let legacy = match &config.legacy_pool {
            Some(legacy) => LegacyPoolClient::new(&env, legacy).pool_token_reserve(),
            None => 0,
        };
        local.checked_add(legacy).ok_or(PoolError::ArithmeticOverflow)
    }

    pub fn get_config(env: Env) -> Result<PoolConfig, PoolError> {
        storage::get_config(&env)
    }

    // ========== Internal Helpers ==========

    /// Config, state and the ledger time, read once per call.
    fn load(env: &Env) -> Result<(PoolConfig, PoolState, u64), PoolError> {
        storage::extend_instance_ttl(env);
        let config = storage::get_config(env)?;
        let state = storage::get_state(env)?;
        Ok((config, state, env.ledger().timestamp()))
    }

    fn require_admin(env: &Env, admin: &Address) -> Result<PoolConfig, PoolError> {
        admin.require_auth();
        let config = storage::get_config(env)?;
        if config.admin != *admin {
            return Err(PoolError::Unauthorized);
        }
        Ok(config)
    }

    fn require_active(config: &PoolConfig) -> Result<(), PoolError> {
        if config.paused {
            return Err(PoolError::Paused);
        }
        Ok(())
    }

    fn require_primary(config: &PoolConfig) -> Result<(), PoolError> {
        if config.kind != PoolKind::Primary {
            return Err(PoolError::NotPrimaryPool);
        }
        Ok(())
    }

    fn require_router(config: &PoolConfig, router: &Address) -> Result<(), PoolError> {
        router.require_auth();
        if config.kind == PoolKind::Primary || config.primary_pool != *router {
            return Err(PoolError::Unauthorized);
        }
        Ok(())
    }

    fn deposit_entry(value: i128, weight: i128, locked_from: u64, locked_until: u64) -> StakeEntry {
        StakeEntry {
            stake: Stake {
                value,
                weight,
                locked_from,
                locked_until,
                is_yield: false,
            },
            origin: StakeOrigin::Deposit,
        }
    }

    /// Apply every request against the caller's stakes, then pay out once.
    fn unstake_batch(env: &Env, user: &Address, requests: &Vec<UnstakeRequest>) -> Result<(), PoolError> {
        let (config, mut state, now) = Self::load(env)?;
        Self::require_active(&config)?;

        ledger::sync(env, &config, &mut state, now)?;
        let mut info = storage::get_user(env, user);
        ledger::settle_all(env, &state, &mut info)?;

        let mut released: i128 = 0;
        let mut yield_minted: i128 = 0;
        for request in requests.iter() {
            if request.value <= 0 {
                return Err(PoolError::InvalidAmount);
            }
            let mut entry = storage::get_stake(env, user, request.stake_id)?;
            if matches!(entry.origin, StakeOrigin::V1Mirror(..) | StakeOrigin::V1Yield) {
                return Err(PoolError::StakeImmutable);
            }
            if request.value > entry.stake.value {
                return Err(PoolError::InvalidAmount);
            }
            if !entry.stake.is_unlocked(now) {
                return Err(PoolError::StakeLocked);
            }

            let weight = if request.value == entry.stake.value {
                entry.stake.weight
            } else {
                math::mul_div(env, entry.stake.weight, request.value, entry.stake.value)
                    .ok_or(PoolError::ArithmeticOverflow)?
            };
            entry.stake.value -= request.value;
            entry.stake.weight -= weight;
            storage::set_stake(env, user, request.stake_id, &entry);

            ledger::remove_weight(&mut state, &mut info, weight)?;
            state.pool_token_reserve = state
                .pool_token_reserve
                .checked_sub(request.value)
                .ok_or(PoolError::ArithmeticOverflow)?;

            let payout = if entry.stake.is_yield {
                &mut yield_minted
            } else {
                &mut released
            };
            *payout = payout
                .checked_add(request.value)
                .ok_or(PoolError::ArithmeticOverflow)?;

            env.events().publish(
                (symbol_short!("unstake"),),
                UnstakedEvent {
                    user: user.clone(),
                    stake_id: request.stake_id,
                    value: request.value,
                    is_yield: entry.stake.is_yield,
                },
            );
        }

        storage::set_user(env, user, &info);
        storage::set_state(env, &state);

        if released > 0 {
            token::Client::new(env, &config.pool_token).transfer(
                &env.current_contract_address(),
                user,
                &released,
            );
        }
        if yield_minted > 0 {
            FactoryClient::new(env, &config.factory).mint_yield_to(
                &env.current_contract_address(),
                user,
                &yield_minted,
                &false,
            );
        }

        log!(env, "User {} unstaked {} and {} yield", user, released, yield_minted);

        Ok(())
    }

    /// Deliver claimed yield. Compounding outside the primary pool goes
    /// through the primary pool's `stake_as_pool`.
    fn pay_yield(env: &Env, config: &PoolConfig, user: &Address, amount: i128, target: ClaimTarget) {
        let this = env.current_contract_address();
        match target {
            ClaimTarget::Compound => {
                if config.kind != PoolKind::Primary {
                    CorePoolClient::new(env, &config.primary_pool).stake_as_pool(&this, user, &amount);
                }
            }
            ClaimTarget::Escrow => {
                FactoryClient::new(env, &config.factory).mint_yield_to(&this, user, &amount, &true);
            }
            ClaimTarget::Token => {
                FactoryClient::new(env, &config.factory).mint_yield_to(&this, user, &amount, &false);
            }
        }
    }

    fn publish_claim(env: &Env, user: &Address, amount: i128, target: ClaimTarget) {
        env.events().publish(
            (symbol_short!("claim"),),
            YieldClaimedEvent {
                user: user.clone(),
                amount,
                target,
            },
        );
    }

    /// Settle and pay the revenue share of `user` out of this pool's custody.
    fn pay_revenue_share(
        env: &Env,
        config: &PoolConfig,
        state: &PoolState,
        user: &Address,
    ) -> Result<i128, PoolError> {
        let mut info = storage::get_user(env, user);
        ledger::settle_revenue_share(env, state, &mut info)?;
        let amount = info.pending_revenue_share;
        info.pending_revenue_share = 0;
        storage::set_user(env, user, &info);

        if amount > 0 {
            token::Client::new(env, &config.reward_token).transfer(
                &env.current_contract_address(),
                user,
                &amount,
            );
            env.events().publish(
                (symbol_short!("vclaim"),),
                RevenueClaimedEvent {
                    user: user.clone(),
                    amount,
                },
            );
        }

        Ok(amount)
    }
}
