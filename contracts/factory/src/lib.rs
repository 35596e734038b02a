#![no_std]
use ilv_shared::{interfaces::CorePoolClient, math, EmissionSnapshot};
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, symbol_short, token, Address, Env,
    Map,
};

#[cfg(test)]
mod test;

// Data Types
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FactoryConfig {
    pub admin: Address,
    pub reward_token: Address,
    pub escrow_token: Address,
    pub seconds_per_update: u64,
    pub init_time: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmissionState {
    pub ilv_per_second: i128,
    pub last_ratio_update: u64,
    pub total_weight: u32,
    pub end_time: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolRecord {
    pub pool: Address,
    pub pool_token: Address,
    pub weight: u32,
    pub is_flash: bool,
}

// Storage Keys
#[contracttype]
pub enum DataKey {
    Config,
    Emission,
    Pools,
    PoolByToken(Address),
}

// Error Types
#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum FactoryError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidConfiguration = 4,
    PoolAlreadyRegistered = 5,
    UnknownPool = 6,
    InvalidAmount = 7,
    ArithmeticOverflow = 8,
}

// Events
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PoolRegisteredEvent {
    pub pool: Address,
    pub pool_token: Address,
    pub weight: u32,
    pub is_flash: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WeightUpdatedEvent {
    pub pool: Address,
    pub old_weight: u32,
    pub new_weight: u32,
    pub total_weight: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmissionDecayedEvent {
    pub ilv_per_second: i128,
    pub last_ratio_update: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct YieldMintedEvent {
    pub pool: Address,
    pub to: Address,
    pub amount: i128,
    pub use_escrow: bool,
}

#[contract]
pub struct PoolFactory;

#[contractimpl]
impl PoolFactory {
    /// Initialize the factory. The factory must be made admin of both the
    /// reward token and the escrow token before pools can mint yield.
    pub fn initialize(
        env: Env,
        admin: Address,
        reward_token: Address,
        escrow_token: Address,
        ilv_per_second: i128,
        seconds_per_update: u64,
        init_time: u64,
        end_time: u64,
    ) -> Result<(), FactoryError> {
        if env.storage().instance().has(&DataKey::Config) {
            return Err(FactoryError::AlreadyInitialized);
        }
        if ilv_per_second <= 0 || seconds_per_update == 0 || end_time <= init_time {
            return Err(FactoryError::InvalidConfiguration);
        }

        admin.require_auth();

        let config = FactoryConfig {
            admin: admin.clone(),
            reward_token,
            escrow_token,
            seconds_per_update,
            init_time,
        };
        let emission = EmissionState {
            ilv_per_second,
            last_ratio_update: init_time,
            total_weight: 0,
            end_time,
        };

        env.storage().instance().set(&DataKey::Config, &config);
        env.storage().instance().set(&DataKey::Emission, &emission);
        env.storage()
            .instance()
            .set(&DataKey::Pools, &Map::<Address, PoolRecord>::new(&env));

        log!(&env, "Pool factory initialized by admin: {}", admin);

        Ok(())
    }

    /// Register a pool with its emission weight. Every pool already
    /// registered is synced at the old weights first.
    pub fn register_pool(
        env: Env,
        admin: Address,
        pool: Address,
        pool_token: Address,
        weight: u32,
        is_flash: bool,
    ) -> Result<(), FactoryError> {
        let config = Self::require_admin(&env, &admin)?;
        let mut pools = Self::load_pools(&env);

        if pools.contains_key(pool.clone())
            || env
                .storage()
                .instance()
                .has(&DataKey::PoolByToken(pool_token.clone()))
        {
            return Err(FactoryError::PoolAlreadyRegistered);
        }

        let mut emission = Self::load_emission(&env)?;
        Self::commit_decay(&env, &config, &mut emission)?;
        Self::sync_pools(&env, &pools, &emission);

        emission.total_weight = emission
            .total_weight
            .checked_add(weight)
            .ok_or(FactoryError::ArithmeticOverflow)?;

        let record = PoolRecord {
            pool: pool.clone(),
            pool_token: pool_token.clone(),
            weight,
            is_flash,
        };
        pools.set(pool.clone(), record);

        env.storage().instance().set(&DataKey::Pools, &pools);
        env.storage()
            .instance()
            .set(&DataKey::PoolByToken(pool_token.clone()), &pool);
        env.storage().instance().set(&DataKey::Emission, &emission);

        env.events().publish(
            (symbol_short!("register"),),
            PoolRegisteredEvent {
                pool: pool.clone(),
                pool_token,
                weight,
                is_flash,
            },
        );

        log!(&env, "Registered pool {} with weight {}", pool, weight);

        Ok(())
    }

    /// Change a registered pool's weight.
    pub fn change_pool_weight(
        env: Env,
        admin: Address,
        pool: Address,
        weight: u32,
    ) -> Result<(), FactoryError> {
        let config = Self::require_admin(&env, &admin)?;
        let mut pools = Self::load_pools(&env);
        let mut record = pools.get(pool.clone()).ok_or(FactoryError::UnknownPool)?;

        let mut emission = Self::load_emission(&env)?;
        Self::commit_decay(&env, &config, &mut emission)?;
        Self::sync_pools(&env, &pools, &emission);

        let old_weight = record.weight;
        emission.total_weight = emission
            .total_weight
            .checked_sub(old_weight)
            .and_then(|w| w.checked_add(weight))
            .ok_or(FactoryError::ArithmeticOverflow)?;
        record.weight = weight;
        pools.set(pool.clone(), record);

        env.storage().instance().set(&DataKey::Pools, &pools);
        env.storage().instance().set(&DataKey::Emission, &emission);

        env.events().publish(
            (symbol_short!("weight"),),
            WeightUpdatedEvent {
                pool: pool.clone(),
                old_weight,
                new_weight: weight,
                total_weight: emission.total_weight,
            },
        );

        log!(&env, "Pool {} weight changed: {} -> {}", pool, old_weight, weight);

        Ok(())
    }

    /// Move the end of emission. Pools are synced against the old end first.
    pub fn set_end_time(env: Env, admin: Address, end_time: u64) -> Result<(), FactoryError> {
        let config = Self::require_admin(&env, &admin)?;
        if end_time <= config.init_time {
            return Err(FactoryError::InvalidConfiguration);
        }

        let pools = Self::load_pools(&env);
        let mut emission = Self::load_emission(&env)?;
        Self::commit_decay(&env, &config, &mut emission)?;
        Self::sync_pools(&env, &pools, &emission);

        emission.end_time = end_time;
        env.storage().instance().set(&DataKey::Emission, &emission);

        log!(&env, "Emission end time set to: {}", end_time);

        Ok(())
    }

    /// Apply every decay period that elapsed since the last update.
    pub fn update_emission_rate(env: Env) -> Result<i128, FactoryError> {
        let config = Self::load_config(&env)?;
        let mut emission = Self::load_emission(&env)?;
        Self::commit_decay(&env, &config, &mut emission)?;
        Ok(emission.ilv_per_second)
    }

    /// Decay the rate if due and return the emission parameters for `pool`.
    /// Unregistered pools get a zero weight.
    pub fn emission_snapshot(env: Env, pool: Address) -> Result<EmissionSnapshot, FactoryError> {
        let config = Self::load_config(&env)?;
        let mut emission = Self::load_emission(&env)?;
        Self::commit_decay(&env, &config, &mut emission)?;
        Ok(Self::snapshot_for(&env, &emission, &pool))
    }

    pub fn preview_emission(env: Env, pool: Address) -> Result<EmissionSnapshot, FactoryError> {
        let config = Self::load_config(&env)?;
        let mut emission = Self::load_emission(&env)?;
        Self::apply_decay(&env, &config, &mut emission)?;
        Ok(Self::snapshot_for(&env, &emission, &pool))
    }

    /// Mint reward (or escrowed reward) tokens on behalf of a registered pool.
    pub fn mint_yield_to(
        env: Env,
        pool: Address,
        to: Address,
        amount: i128,
        use_escrow: bool,
    ) -> Result<(), FactoryError> {
        pool.require_auth();

        let config = Self::load_config(&env)?;
        if !Self::load_pools(&env).contains_key(pool.clone()) {
            return Err(FactoryError::UnknownPool);
        }
        if amount <= 0 {
            return Err(FactoryError::InvalidAmount);
        }

        let token = if use_escrow {
            config.escrow_token
        } else {
            config.reward_token
        };
        token::StellarAssetClient::new(&env, &token).mint(&to, &amount);

        env.events().publish(
            (symbol_short!("mint"),),
            YieldMintedEvent {
                pool,
                to: to.clone(),
                amount,
                use_escrow,
            },
        );

        log!(&env, "Minted {} yield to {} (escrow: {})", amount, to, use_escrow);

        Ok(())
    }

    pub fn pool_exists(env: Env, pool: Address) -> bool {
        Self::load_pools(&env).contains_key(pool)
    }

    /// Pool registered for `pool_token`, if any.
    pub fn pools(env: Env, pool_token: Address) -> Option<Address> {
        env.storage().instance().get(&DataKey::PoolByToken(pool_token))
    }

    pub fn get_pool(env: Env, pool: Address) -> Option<PoolRecord> {
        Self::load_pools(&env).get(pool)
    }

    pub fn get_config(env: Env) -> Result<FactoryConfig, FactoryError> {
        Self::load_config(&env)
    }

    pub fn get_emission(env: Env) -> Result<EmissionState, FactoryError> {
        Self::load_emission(&env)
    }

    // Internal helper functions
    fn load_config(env: &Env) -> Result<FactoryConfig, FactoryError> {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .ok_or(FactoryError::NotInitialized)
    }

    fn load_emission(env: &Env) -> Result<EmissionState, FactoryError> {
        env.storage()
            .instance()
            .get(&DataKey::Emission)
            .ok_or(FactoryError::NotInitialized)
    }

    fn load_pools(env: &Env) -> Map<Address, PoolRecord> {
        env.storage()
            .instance()
            .get(&DataKey::Pools)
            .unwrap_or(Map::new(env))
    }

    fn require_admin(env: &Env, admin: &Address) -> Result<FactoryConfig, FactoryError> {
        admin.require_auth();
        let config = Self::load_config(env)?;
        if config.admin != *admin {
            return Err(FactoryError::Unauthorized);
        }
        Ok(config)
    }

    /// Returns whether at least one decay period was applied.
    fn apply_decay(
        env: &Env,
        config: &FactoryConfig,
        emission: &mut EmissionState,
    ) -> Result<bool, FactoryError> {
        let now = env.ledger().timestamp();
        let (rate, checkpoint) = math::decay_emission(
            emission.ilv_per_second,
            emission.last_ratio_update,
            config.seconds_per_update,
            now,
            emission.end_time,
        )
        .ok_or(FactoryError::ArithmeticOverflow)?;

        if checkpoint == emission.last_ratio_update {
            return Ok(false);
        }
        emission.ilv_per_second = rate;
        emission.last_ratio_update = checkpoint;
        Ok(true)
    }

    /// Decay, persist and announce the new rate.
    fn commit_decay(
        env: &Env,
        config: &FactoryConfig,
        emission: &mut EmissionState,
    ) -> Result<(), FactoryError> {
        if Self::apply_decay(env, config, emission)? {
            env.storage().instance().set(&DataKey::Emission, &*emission);
            env.events().publish(
                (symbol_short!("decay"),),
                EmissionDecayedEvent {
                    ilv_per_second: emission.ilv_per_second,
                    last_ratio_update: emission.last_ratio_update,
                },
            );
            log!(env, "Emission decayed to {} per second", emission.ilv_per_second);
        }
        Ok(())
    }

    fn snapshot_for(env: &Env, emission: &EmissionState, pool: &Address) -> EmissionSnapshot {
        let pool_weight = Self::load_pools(env)
            .get(pool.clone())
            .map(|record| record.weight)
            .unwrap_or(0);
        EmissionSnapshot {
            ilv_per_second: emission.ilv_per_second,
            pool_weight,
            total_weight: emission.total_weight,
            end_time: emission.end_time,
        }
    }

    /// Push a sync to every registered pool using the current parameters.
    fn sync_pools(env: &Env, pools: &Map<Address, PoolRecord>, emission: &EmissionState) {
        for (pool, record) in pools.iter() {
            let snapshot = EmissionSnapshot {
                ilv_per_second: emission.ilv_per_second,
                pool_weight: record.weight,
                total_weight: emission.total_weight,
                end_time: emission.end_time,
            };
            CorePoolClient::new(env, &pool).sync_from_factory(&snapshot);
        }
    }
}
