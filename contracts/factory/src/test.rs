#![cfg(test)]
use super::*;
use soroban_sdk::{
    contract, contractimpl, symbol_short,
    testutils::{Address as _, Ledger},
    token::{StellarAssetClient, TokenClient},
    Env,
};

const INIT_TIME: u64 = 10;
const END_TIME: u64 = 63_072_000;
const SECONDS_PER_UPDATE: u64 = 1_209_600;
const ILV_PER_SECOND: i128 = 1_000_000_000_000_000_000;

/// Stand-in pool that records the last snapshot pushed by the factory.
#[contract]
pub struct RecordingPool;

#[contractimpl]
impl RecordingPool {
    pub fn sync_from_factory(env: Env, snapshot: EmissionSnapshot) {
        env.storage().instance().set(&symbol_short!("snap"), &snapshot);
    }

    pub fn last_snapshot(env: Env) -> Option<EmissionSnapshot> {
        env.storage().instance().get(&symbol_short!("snap"))
    }
}

struct Setup {
    env: Env,
    admin: Address,
    reward: Address,
    escrow: Address,
    factory: PoolFactoryClient<'static>,
}

fn setup() -> Setup {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().with_mut(|li| li.timestamp = INIT_TIME);

    let admin = Address::generate(&env);
    let issuer = Address::generate(&env);
    let reward = env.register_stellar_asset_contract_v2(issuer.clone()).address();
    let escrow = env.register_stellar_asset_contract_v2(issuer).address();

    let factory_id = env.register_contract(None, PoolFactory);
    let factory = PoolFactoryClient::new(&env, &factory_id);
    factory.initialize(
        &admin,
        &reward,
        &escrow,
        &ILV_PER_SECOND,
        &SECONDS_PER_UPDATE,
        &INIT_TIME,
        &END_TIME,
    );

    StellarAssetClient::new(&env, &reward).set_admin(&factory_id);
    StellarAssetClient::new(&env, &escrow).set_admin(&factory_id);

    Setup {
        env,
        admin,
        reward,
        escrow,
        factory,
    }
}

fn recording_pool(env: &Env) -> (Address, RecordingPoolClient<'static>) {
    let id = env.register_contract(None, RecordingPool);
    let client = RecordingPoolClient::new(env, &id);
    (id, client)
}

#[test]
fn test_initialize_twice_fails() {
    let s = setup();
    let result = s.factory.try_initialize(
        &s.admin,
        &s.reward,
        &s.escrow,
        &ILV_PER_SECOND,
        &SECONDS_PER_UPDATE,
        &INIT_TIME,
        &END_TIME,
    );
    assert_eq!(result, Err(Ok(FactoryError::AlreadyInitialized)));

    let emission = s.factory.get_emission();
    assert_eq!(emission.ilv_per_second, ILV_PER_SECOND);
    assert_eq!(emission.last_ratio_update, INIT_TIME);
    assert_eq!(emission.total_weight, 0);
}

#[test]
fn test_initialize_rejects_inverted_window() {
    let env = Env::default();
    env.mock_all_auths();
    let factory_id = env.register_contract(None, PoolFactory);
    let factory = PoolFactoryClient::new(&env, &factory_id);
    let admin = Address::generate(&env);
    let token = Address::generate(&env);

    let result = factory.try_initialize(
        &admin,
        &token,
        &token,
        &ILV_PER_SECOND,
        &SECONDS_PER_UPDATE,
        &END_TIME,
        &INIT_TIME,
    );
    assert_eq!(result, Err(Ok(FactoryError::InvalidConfiguration)));
}

#[test]
fn test_register_pool_tracks_total_weight() {
    let s = setup();
    let (ilv_pool, _) = recording_pool(&s.env);
    let (lp_pool, _) = recording_pool(&s.env);
    let lp_token = Address::generate(&s.env);

    s.factory.register_pool(&s.admin, &ilv_pool, &s.reward, &200, &false);
    s.factory.register_pool(&s.admin, &lp_pool, &lp_token, &800, &false);

    assert_eq!(s.factory.get_emission().total_weight, 1000);
    assert!(s.factory.pool_exists(&ilv_pool));
    assert_eq!(s.factory.pools(&lp_token), Some(lp_pool.clone()));
    assert_eq!(s.factory.get_pool(&lp_pool).unwrap().weight, 800);

    let again = s.factory.try_register_pool(&s.admin, &ilv_pool, &s.reward, &1, &false);
    assert_eq!(again, Err(Ok(FactoryError::PoolAlreadyRegistered)));
}

#[test]
fn test_register_pool_requires_admin() {
    let s = setup();
    let (pool, _) = recording_pool(&s.env);
    let stranger = Address::generate(&s.env);

    let result = s.factory.try_register_pool(&stranger, &pool, &s.reward, &200, &false);
    assert_eq!(result, Err(Ok(FactoryError::Unauthorized)));
}

#[test]
fn test_weight_change_syncs_pools_at_old_weights() {
    let s = setup();
    let (ilv_pool, ilv_client) = recording_pool(&s.env);
    let (lp_pool, lp_client) = recording_pool(&s.env);
    let lp_token = Address::generate(&s.env);

    s.factory.register_pool(&s.admin, &ilv_pool, &s.reward, &200, &false);
    // the first pool was synced before the second one joined
    assert_eq!(ilv_client.last_snapshot().unwrap().total_weight, 200);

    s.factory.register_pool(&s.admin, &lp_pool, &lp_token, &800, &false);
    s.factory.change_pool_weight(&s.admin, &ilv_pool, &100);

    let ilv_snap = ilv_client.last_snapshot().unwrap();
    assert_eq!(ilv_snap.pool_weight, 200);
    assert_eq!(ilv_snap.total_weight, 1000);
    let lp_snap = lp_client.last_snapshot().unwrap();
    assert_eq!(lp_snap.pool_weight, 800);
    assert_eq!(lp_snap.total_weight, 1000);

    assert_eq!(s.factory.get_emission().total_weight, 900);
    assert_eq!(s.factory.emission_snapshot(&ilv_pool).pool_weight, 100);
}

#[test]
fn test_change_weight_of_unknown_pool_fails() {
    let s = setup();
    let unknown = Address::generate(&s.env);
    let result = s.factory.try_change_pool_weight(&s.admin, &unknown, &100);
    assert_eq!(result, Err(Ok(FactoryError::UnknownPool)));
}

#[test]
fn test_emission_decays_after_one_period() {
    let s = setup();
    s.env
        .ledger()
        .with_mut(|li| li.timestamp = INIT_TIME + SECONDS_PER_UPDATE - 1);
    assert_eq!(s.factory.update_emission_rate(), ILV_PER_SECOND);

    let now = INIT_TIME + SECONDS_PER_UPDATE;
    s.env.ledger().with_mut(|li| li.timestamp = now);
    assert_eq!(s.factory.update_emission_rate(), ILV_PER_SECOND * 97 / 100);

    let emission = s.factory.get_emission();
    assert_eq!(emission.last_ratio_update, now);
}

#[test]
fn test_emission_decay_catches_up_after_inactivity() {
    let s = setup();
    s.env
        .ledger()
        .with_mut(|li| li.timestamp = INIT_TIME + 4 * SECONDS_PER_UPDATE + 100);

    let (pool, _) = recording_pool(&s.env);
    let snapshot = s.factory.emission_snapshot(&pool);

    let mut expected = ILV_PER_SECOND;
    for _ in 0..4 {
        expected = expected * 97 / 100;
    }
    assert_eq!(snapshot.ilv_per_second, expected);
    assert_eq!(snapshot.pool_weight, 0);
    assert_eq!(
        s.factory.get_emission().last_ratio_update,
        INIT_TIME + 4 * SECONDS_PER_UPDATE
    );
}

#[test]
fn test_preview_does_not_persist_decay() {
    let s = setup();
    let (pool, _) = recording_pool(&s.env);
    s.env
        .ledger()
        .with_mut(|li| li.timestamp = INIT_TIME + SECONDS_PER_UPDATE);

    let preview = s.factory.preview_emission(&pool);
    assert_eq!(preview.ilv_per_second, ILV_PER_SECOND * 97 / 100);
    assert_eq!(s.factory.get_emission().ilv_per_second, ILV_PER_SECOND);
}

#[test]
fn test_decay_stops_at_end_time() {
    let s = setup();
    s.env
        .ledger()
        .with_mut(|li| li.timestamp = END_TIME + 10 * SECONDS_PER_UPDATE);
    s.factory.update_emission_rate();
    let frozen = s.factory.get_emission();

    s.env
        .ledger()
        .with_mut(|li| li.timestamp = END_TIME + 20 * SECONDS_PER_UPDATE);
    s.factory.update_emission_rate();
    assert_eq!(s.factory.get_emission(), frozen);
    assert!(frozen.last_ratio_update <= END_TIME);
}

#[test]
fn test_set_end_time() {
    let s = setup();
    s.factory.set_end_time(&s.admin, &(END_TIME + 100));
    assert_eq!(s.factory.get_emission().end_time, END_TIME + 100);

    let result = s.factory.try_set_end_time(&s.admin, &INIT_TIME);
    assert_eq!(result, Err(Ok(FactoryError::InvalidConfiguration)));
}

#[test]
fn test_mint_yield_to_registered_pool_only() {
    let s = setup();
    let (pool, _) = recording_pool(&s.env);
    let user = Address::generate(&s.env);
    s.factory.register_pool(&s.admin, &pool, &s.reward, &200, &false);

    s.factory.mint_yield_to(&pool, &user, &500, &false);
    s.factory.mint_yield_to(&pool, &user, &70, &true);
    assert_eq!(TokenClient::new(&s.env, &s.reward).balance(&user), 500);
    assert_eq!(TokenClient::new(&s.env, &s.escrow).balance(&user), 70);

    let stranger = Address::generate(&s.env);
    let result = s.factory.try_mint_yield_to(&stranger, &user, &500, &false);
    assert_eq!(result, Err(Ok(FactoryError::UnknownPool)));

    let zero = s.factory.try_mint_yield_to(&pool, &user, &0, &false);
    assert_eq!(zero, Err(Ok(FactoryError::InvalidAmount)));
}
