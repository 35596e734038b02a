use soroban_sdk::{contractclient, Address, Env, Vec};

use crate::{ClaimTarget, EmissionSnapshot, LegacyDeposit};

/// What a core pool needs from the emission factory.
#[contractclient(name = "FactoryClient")]
pub trait FactoryInterface {
    /// Applies pending decay and returns the emission parameters for `pool`.
    fn emission_snapshot(env: Env, pool: Address) -> EmissionSnapshot;
    /// Same as `emission_snapshot` without persisting the decay.
    fn preview_emission(env: Env, pool: Address) -> EmissionSnapshot;
    fn pool_exists(env: Env, pool: Address) -> bool;
    fn mint_yield_to(env: Env, pool: Address, to: Address, amount: i128, use_escrow: bool);
}

/// Entry points a core pool exposes to the factory, to sibling pools and to
/// the revenue vault.
#[contractclient(name = "CorePoolClient")]
pub trait CorePoolInterface {
    fn sync_from_factory(env: Env, snapshot: EmissionSnapshot);
    fn stake_as_pool(env: Env, pool: Address, staker: Address, value: i128);
    fn claim_yield_from_router(env: Env, router: Address, staker: Address, target: ClaimTarget) -> i128;
    fn claim_vault_from_router(env: Env, router: Address, staker: Address) -> i128;
    fn receive_vault_rewards(env: Env, amount: i128);
    fn pool_token_reserve(env: Env) -> i128;
}

/// Read-only view of the frozen v1 pool.
#[contractclient(name = "LegacyPoolClient")]
pub trait LegacyPoolInterface {
    fn get_deposit(env: Env, user: Address, stake_id: u32) -> LegacyDeposit;
    fn users_locking_weight(env: Env) -> i128;
    fn pool_token_reserve(env: Env) -> i128;
}

/// External venue the vault swaps revenue through.
#[contractclient(name = "SwapVenueClient")]
pub trait SwapVenueInterface {
    fn get_amounts_out(env: Env, amount_in: i128, path: Vec<Address>) -> Vec<i128>;
    fn swap_exact_input_for_output(
        env: Env,
        amount_in: i128,
        path: Vec<Address>,
        min_out: i128,
        to: Address,
        deadline: u64,
    ) -> i128;
}
