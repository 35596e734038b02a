use ilv_shared::ClaimTarget;
use soroban_sdk::{contracttype, Address};

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StakedEvent {
    pub user: Address,
    pub stake_id: u32,
    pub value: i128,
    pub locked_until: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnstakedEvent {
    pub user: Address,
    pub stake_id: u32,
    pub value: i128,
    pub is_yield: bool,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockUpdatedEvent {
    pub user: Address,
    pub stake_id: u32,
    pub locked_from: u64,
    pub locked_until: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncedEvent {
    pub yield_rewards_per_weight: i128,
    pub last_sync: u64,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct YieldClaimedEvent {
    pub user: Address,
    pub amount: i128,
    pub target: ClaimTarget,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevenueReceivedEvent {
    pub amount: i128,
    pub vault_rewards_per_weight: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevenueClaimedEvent {
    pub user: Address,
    pub amount: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FundsMovedEvent {
    pub from: Address,
    pub to: Address,
}

// Migration events

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MerkleClaimedEvent {
    pub user: Address,
    pub index: u64,
    pub weight: i128,
    pub pending_v1_rewards: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct V1StakeImportedEvent {
    pub user: Address,
    pub legacy_id: u32,
    pub stake_id: u32,
    pub value: i128,
    pub weight: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct V1StakeFilledEvent {
    pub user: Address,
    pub legacy_id: u32,
    pub stake_id: u32,
    pub old_weight: i128,
    pub new_weight: i128,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct V1YieldMintedEvent {
    pub user: Address,
    pub amount: i128,
}
