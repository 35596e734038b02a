#![no_std]
use ilv_shared::{
    interfaces::{CorePoolClient, SwapVenueClient},
    math,
};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, vec, Address,
    Env, Vec,
};


// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultConfig {
    pub admin: Address,
    pub reward_token: Address,
    /// Revenue asset swapped into the reward token
    pub external_token: Address,
    pub swap_venue: Address,
}

/// Pools revenue is split across. Only `primary_pool` and `pair_pool` receive
/// transfers; the others contribute reserves to the split.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultPoolSet {
    pub primary_pool_v1: Address,
    pub pair_pool_v1: Address,
    pub primary_pool: Address,
    pub pair_pool: Address,
    pub locked_pool_v1: Address,
    pub locked_pool_v2: Address,
}

#[contracttype]
pub enum DataKey {
    Config,
    Pools,
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum VaultError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    ZeroAddress = 4,
    InvalidAmount = 5,
    DeadlineExpired = 6,
    InsufficientOutput = 7,
    InsufficientBalance = 8,
    PoolsNotSet = 9,
    NothingToDistribute = 10,
    NoValueLocked = 11,
    ArithmeticOverflow = 12,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolsSetEvent {
    pub primary_pool: Address,
    pub pair_pool: Address,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SwappedEvent {
    pub amount_in: i128,
    pub reward_out: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardsSentEvent {
    pub primary_share: i128,
    pub pair_share: i128,
    pub total_value_locked: i128,
}

#[contract]
pub struct RevenueVault;

#[contractimpl]
impl RevenueVault {
    pub fn initialize(
        env: Env,
        admin: Address,
        reward_token: Address,
        external_token: Address,
        swap_venue: Address,
    ) -> Result<(), VaultError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(VaultError::AlreadyInitialized);
        }

        let this = env.current_contract_address();
        if reward_token == this || external_token == this || swap_venue == this {
            return Err(VaultError::ZeroAddress);
        }

        admin.require_auth();

        let config = VaultConfig {
            admin: admin.clone(),
            reward_token,
            external_token,
            swap_venue,
        };
        env.storage().instance().set(&DataKey::Config, &config);

        log!(&env, "Revenue vault initialized by admin: {}", admin);

        Ok(())
    }

    /// Set every pool of the split at once. An address equal to the vault
    /// itself stands for an unset slot and is rejected.
    pub fn set_core_pools(env: Env, admin: Address, pools: VaultPoolSet) -> Result<(), VaultError> {
        Self::require_admin(&env, &admin)?;

        let this = env.current_contract_address();
        let slots = [
            &pools.primary_pool_v1,
            &pools.pair_pool_v1,
            &pools.primary_pool,
            &pools.pair_pool,
            &pools.locked_pool_v1,
            &pools.locked_pool_v2,
        ];
        if slots.iter().any(|slot| **slot == this) {
            return Err(VaultError::ZeroAddress);
        }

        env.storage().instance().set(&DataKey::Pools, &pools);

        env.events().publish(
            (symbol_short!("pools"),),
            PoolsSetEvent {
                primary_pool: pools.primary_pool.clone(),
                pair_pool: pools.pair_pool.clone(),
            },
        );

        log!(&env, "Core pools set: {} / {}", pools.primary_pool, pools.pair_pool);

        Ok(())
    }

    pub fn set_swap_venue(env: Env, admin: Address, swap_venue: Address) -> Result<(), VaultError> {
        let mut config = Self::require_admin(&env, &admin)?;
        if swap_venue == env.current_contract_address() {
            return Err(VaultError::ZeroAddress);
        }
        config.swap_venue = swap_venue.clone();
        env.storage().instance().set(&DataKey::Config, &config);
        log!(&env, "Swap venue set to: {}", swap_venue);
        Ok(())
    }

    /// Swap `amount_in` of the external token held by the vault into the
    /// reward token. Returns the reward received.
    pub fn swap_external_for_reward(
        env: Env,
        admin: Address,
        amount_in: i128,
        min_out: i128,
        deadline: u64,
    ) -> Result<i128, VaultError> {
        let config = Self::require_admin(&env, &admin)?;
        Self::swap(&env, &config, amount_in, min_out, deadline)
    }

    /// Optionally swap first, then split the whole reward balance across the
    /// primary and pair pools by value locked.
    pub fn send_rewards(
        env: Env,
        admin: Address,
        amount_in: i128,
        min_out: i128,
        deadline: u64,
    ) -> Result<(), VaultError> {
        let config = Self::require_admin(&env, &admin)?;
        let pools = Self::load_pools(&env)?;

        if amount_in > 0 {
            Self::swap(&env, &config, amount_in, min_out, deadline)?;
        }

        let this = env.current_contract_address();
        let reward = token::Client::new(&env, &config.reward_token);
        let balance = reward.balance(&this);
        if balance <= 0 {
            return Err(VaultError::NothingToDistribute);
        }

        let primary_tvl = Self::reserve_of(&env, &pools.primary_pool)
            .checked_add(Self::reserve_of(&env, &pools.primary_pool_v1))
            .and_then(|v| v.checked_add(Self::reserve_of(&env, &pools.locked_pool_v1)))
            .and_then(|v| v.checked_add(Self::reserve_of(&env, &pools.locked_pool_v2)))
            .ok_or(VaultError::ArithmeticOverflow)?;
        let pair_tvl = Self::reserve_of(&env, &pools.pair_pool)
            .checked_add(Self::reserve_of(&env, &pools.pair_pool_v1))
            .ok_or(VaultError::ArithmeticOverflow)?;
        let total = primary_tvl
            .checked_add(pair_tvl)
            .ok_or(VaultError::ArithmeticOverflow)?;
        if total <= 0 {
            return Err(VaultError::NoValueLocked);
        }

        let primary_share =
            math::mul_div(&env, balance, primary_tvl, total).ok_or(VaultError::ArithmeticOverflow)?;
        let pair_share =
            math::mul_div(&env, balance, pair_tvl, total).ok_or(VaultError::ArithmeticOverflow)?;

        for (pool, share) in [(&pools.primary_pool, primary_share), (&pools.pair_pool, pair_share)] {
            if share == 0 {
                continue;
            }
            reward.transfer(&this, pool, &share);
            CorePoolClient::new(&env, pool).receive_vault_rewards(&share);
        }

        env.events().publish(
            (symbol_short!("rewards"),),
            RewardsSentEvent {
                primary_share,
                pair_share,
                total_value_locked: total,
            },
        );

        log!(&env, "Sent revenue: {} to primary, {} to pair", primary_share, pair_share);

        Ok(())
    }

    // View functions
    pub fn pools(env: Env) -> Result<VaultPoolSet, VaultError> {
        Self::load_pools(&env)
    }

    pub fn get_config(env: Env) -> Result<VaultConfig, VaultError> {
        Self::load_config(&env)
    }

    pub fn reward_balance(env: Env) -> Result<i128, VaultError> {
        let config = Self::load_config(&env)?;
        Ok(token::Client::new(&env, &config.reward_token).balance(&env.current_contract_address()))
    }

    /// Reward the venue would currently return for `amount_in`.
    pub fn estimate_reward_out(env: Env, amount_in: i128) -> Result<i128, VaultError> {
        let config = Self::load_config(&env)?;
        if amount_in <= 0 {
            return Err(VaultError::InvalidAmount);
        }
        let amounts = SwapVenueClient::new(&env, &config.swap_venue)
            .get_amounts_out(&amount_in, &Self::swap_path(&env, &config));
        amounts.last().ok_or(VaultError::InsufficientOutput)
    }

    // Internal helper functions
    fn load_config(env: &Env) -> Result<VaultConfig, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(VaultError::NotInitialized)
    }

    fn load_pools(env: &Env) -> Result<VaultPoolSet, VaultError> {
        env.storage()
            .instance()
            .get(&DataKey::Pools)
            .ok_or(VaultError::PoolsNotSet)
    }

    fn require_admin(env: &Env, admin: &Address) -> Result<VaultConfig, VaultError> {
        admin.require_auth();
        let config = Self::load_config(env)?;
        if config.admin != *admin {
            return Err(VaultError::Unauthorized);
        }
        Ok(config)
    }

    fn reserve_of(env: &Env, pool: &Address) -> i128 {
        CorePoolClient::new(env, pool).pool_token_reserve()
    }

    fn swap_path(env: &Env, config: &VaultConfig) -> Vec<Address> {
        vec![env, config.external_token.clone(), config.reward_token.clone()]
    }

    fn swap(
        env: &Env,
        config: &VaultConfig,
        amount_in: i128,
        min_out: i128,
        deadline: u64,
    ) -> Result<i128, VaultError> {
        if amount_in <= 0 || min_out <= 0 {
            return Err(VaultError::InvalidAmount);
        }
        if deadline <= env.ledger().timestamp() {
            return Err(VaultError::DeadlineExpired);
        }

        let this = env.current_contract_address();
        let external = token::Client::new(env, &config.external_token);
        if external.balance(&this) < amount_in {
            return Err(VaultError::InsufficientBalance);
        }

        let reward = token::Client::new(env, &config.reward_token);
        let before = reward.balance(&this);

        external.transfer(&this, &config.swap_venue, &amount_in);
        SwapVenueClient::new(env, &config.swap_venue).swap_exact_input_for_output(
            &amount_in,
            &Self::swap_path(env, config),
            &min_out,
            &this,
            &deadline,
        );

        let received = reward
            .balance(&this)
            .checked_sub(before)
            .ok_or(VaultError::ArithmeticOverflow)?;
        if received < min_out {
            return Err(VaultError::InsufficientOutput);
        }

        env.events().publish(
            (symbol_short!("swap"),),
            SwappedEvent {
                amount_in,
                reward_out: received,
            },
        );

        log!(env, "Swapped {} external for {} reward", amount_in, received);

        Ok(received)
    }
}
