use std::time::Duration;

use ledger_testing_env as tf_env;

use crate::adjust_timeout;

pub const SUBSCRIBE_TIMEOUT_SECS: u64 = 30;
pub const MINT_FAILURE_TIMEOUT_SECS: u64 = 60;

/// How long a topic subscription waits for the expected messages.
pub fn subscribe_timeout() -> Duration {
    adjust_timeout(Duration::from_secs(
        tf_env::ledger_subscribe_timeout_secs().unwrap_or(SUBSCRIBE_TIMEOUT_SECS),
    ))
}

/// Upper bound for the step expecting a mint to be rejected.
pub fn mint_failure_timeout() -> Duration {
    adjust_timeout(Duration::from_secs(
        tf_env::ledger_mint_failure_timeout_secs().unwrap_or(MINT_FAILURE_TIMEOUT_SECS),
    ))
}
