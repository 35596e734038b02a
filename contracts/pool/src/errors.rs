use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum PoolError {
    NotInitialized = 1,
    AlreadyInitialized = 2,
    Unauthorized = 3,
    InvalidAmount = 4,
    InvalidLockDuration = 5,
    LockingNotSupported = 6,
    StakeNotFound = 7,
    StakeLocked = 8,
    LockNotExtended = 9,
    StakeImmutable = 10,
    Paused = 11,
    ArithmeticOverflow = 12,
    UnknownPool = 13,
    NotPrimaryPool = 14,
    NotVault = 15,
    InvalidConfiguration = 16,
    ZeroAddress = 17,
    PoolDisabled = 18,
    DestinationNotEmpty = 19,
    // migration
    MerkleRootNotSet = 20,
    InvalidProof = 21,
    IndexAlreadyClaimed = 22,
    NoLegacyPool = 23,
    AlreadyMigrated = 24,
    YieldStakeNotMigratable = 25,
    StakeUnlocked = 26,
    StakeAfterCutoff = 27,
    NotV1Mirror = 28,
    NotV1YieldStake = 29,
    AlreadyMinted = 30,
    YieldLocked = 31,
}
