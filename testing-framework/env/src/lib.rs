use std::{env, path::PathBuf};

#[must_use]
pub fn slow_test_env() -> bool {
    env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true")
}

#[must_use]
pub fn debug_tracing() -> bool {
    env::var("LEDGER_TESTS_TRACING").is_ok_and(|val| val.eq_ignore_ascii_case("true"))
}

/// Backend the steps talk to (`local`, `testnet`, `previewnet`, `mainnet`).
#[must_use]
pub fn ledger_backend() -> Option<String> {
    env::var("LEDGER_BACKEND").ok()
}

/// YAML file holding the scenario accounts.
#[must_use]
pub fn ledger_accounts_file() -> Option<PathBuf> {
    env::var_os("LEDGER_ACCOUNTS_FILE").map(PathBuf::from)
}

#[must_use]
pub fn ledger_subscribe_timeout_secs() -> Option<u64> {
    env::var("LEDGER_SUBSCRIBE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
}

#[must_use]
pub fn ledger_mint_failure_timeout_secs() -> Option<u64> {
    env::var("LEDGER_MINT_FAILURE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
}

/// Overrides the fee the local backend charges per transaction.
#[must_use]
pub fn ledger_tx_fee_tinybars() -> Option<i64> {
    env::var("LEDGER_TX_FEE_TINYBARS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
}

#[must_use]
pub fn ledger_junit_output() -> Option<PathBuf> {
    env::var_os("LEDGER_JUNIT_OUTPUT").map(PathBuf::from)
}

/// Times a failed scenario is retried by the auto runner.
#[must_use]
pub fn ledger_cucumber_retries() -> Option<usize> {
    env::var("LEDGER_CUCUMBER_RETRIES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
}
