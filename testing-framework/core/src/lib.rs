pub mod accounts;
pub mod client;
#[cfg(feature = "hedera")]
pub mod hedera;
pub mod ledger;
pub mod local;

pub use accounts::{Account, AccountError, accounts_from_fixture};
pub use client::{LedgerClient, LedgerError, Operator, TopicMessageQuery};
#[cfg(feature = "hedera")]
pub use hedera::HederaLedger;
pub use ledger_testing_config::{IS_DEBUG_TRACING, adjust_timeout};
pub use local::LocalLedger;
