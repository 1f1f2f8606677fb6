/// Number of accounts in the generated local fixture.
pub const DEFAULT_LOCAL_ACCOUNT_COUNT: usize = 4;

/// Entity number of the first generated local account (`0.0.1001`).
pub const FIRST_LOCAL_ACCOUNT_NUM: u64 = 1001;

/// Starting balance of generated local accounts, in whole hbar.
pub const DEFAULT_LOCAL_INITIAL_HBAR: u64 = 1_000;

/// Fee the local backend charges the payer of every transaction.
pub const DEFAULT_TRANSACTION_FEE_TINYBARS: i64 = 100_000;

/// Largest topic message the local backend accepts.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024;

/// Largest topic/token memo the ledger accepts.
pub const MAX_MEMO_BYTES: usize = 100;

/// Feature files, relative to the workspace root.
pub const DEFAULT_FEATURES_DIR: &str = "runner/cucumber/features";
