use std::{fmt, fs, path::Path, str::FromStr};

use ledger_testing_env as tf_env;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    constants::{
        DEFAULT_LOCAL_ACCOUNT_COUNT, DEFAULT_LOCAL_INITIAL_HBAR, DEFAULT_MAX_MESSAGE_BYTES,
        DEFAULT_TRANSACTION_FEE_TINYBARS, FIRST_LOCAL_ACCOUNT_NUM,
    },
    validation::{FixtureError, validate_fixture},
};

/// Network a fixture (and the steps using it) targets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerNetwork {
    #[default]
    Local,
    Testnet,
    Previewnet,
    Mainnet,
}

impl LedgerNetwork {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Testnet => "testnet",
            Self::Previewnet => "previewnet",
            Self::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for LedgerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerNetwork {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "host" | "memory" => Ok(Self::Local),
            "testnet" => Ok(Self::Testnet),
            "previewnet" => Ok(Self::Previewnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(FixtureError::UnknownNetwork {
                value: other.to_owned(),
            }),
        }
    }
}

/// One pre-funded account the scenarios may use.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AccountFixture {
    /// `shard.realm.num`
    pub id: String,
    /// ED25519 key, raw or DER hex.
    pub private_key: String,
    /// Genesis balance on the local backend; ignored by real networks.
    #[serde(default)]
    pub initial_hbar: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LocalLedgerParams {
    #[serde(default = "default_transaction_fee")]
    pub transaction_fee_tinybars: i64,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default = "default_initial_hbar")]
    pub default_initial_hbar: u64,
}

impl Default for LocalLedgerParams {
    fn default() -> Self {
        Self {
            transaction_fee_tinybars: default_transaction_fee(),
            max_message_bytes: default_max_message_bytes(),
            default_initial_hbar: default_initial_hbar(),
        }
    }
}

fn default_transaction_fee() -> i64 {
    tf_env::ledger_tx_fee_tinybars().unwrap_or(DEFAULT_TRANSACTION_FEE_TINYBARS)
}

const fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

const fn default_initial_hbar() -> u64 {
    DEFAULT_LOCAL_INITIAL_HBAR
}

/// Accounts and backend parameters shared by every scenario in a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LedgerFixtureConfig {
    #[serde(default)]
    pub network: Option<LedgerNetwork>,
    pub accounts: Vec<AccountFixture>,
    #[serde(default)]
    pub local: LocalLedgerParams,
}

impl LedgerFixtureConfig {
    /// Parses and validates a YAML fixture.
    pub fn from_yaml_str(raw: &str) -> Result<Self, FixtureError> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|source| FixtureError::Parse { source })?;
        validate_fixture(&config)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let raw = fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw)?;
        info!(
            path = %path.display(),
            accounts = config.accounts.len(),
            "loaded account fixture"
        );
        Ok(config)
    }

    /// Loads `LEDGER_ACCOUNTS_FILE` when set, otherwise falls back to the
    /// generated local fixture.
    pub fn from_env() -> Result<Self, FixtureError> {
        match tf_env::ledger_accounts_file() {
            Some(path) => Self::load(&path),
            None => {
                debug!("LEDGER_ACCOUNTS_FILE not set; using generated local fixture");
                Self::generated(LocalLedgerParams::default())
            }
        }
    }

    /// The generated local fixture with `local` parameters, validated like a
    /// loaded one so env overrides such as `LEDGER_TX_FEE_TINYBARS` are checked.
    pub fn generated(local: LocalLedgerParams) -> Result<Self, FixtureError> {
        let config = Self {
            local,
            ..Self::local_default()
        };
        validate_fixture(&config)?;
        Ok(config)
    }

    /// Deterministic fixture for the in-process ledger: accounts
    /// `0.0.1001..` with keys derived from their position.
    #[must_use]
    pub fn local_default() -> Self {
        let accounts = (0..DEFAULT_LOCAL_ACCOUNT_COUNT)
            .map(|index| {
                let seed = [(index + 1) as u8; 32];
                AccountFixture {
                    id: format!("0.0.{}", FIRST_LOCAL_ACCOUNT_NUM + index as u64),
                    private_key: hex::encode(seed),
                    initial_hbar: None,
                }
            })
            .collect();

        Self {
            network: Some(LedgerNetwork::Local),
            accounts,
            local: LocalLedgerParams::default(),
        }
    }

    #[must_use]
    pub fn account(&self, index: usize) -> Option<&AccountFixture> {
        self.accounts.get(index)
    }

    /// Genesis balance of the account at `index` on the local backend.
    #[must_use]
    pub fn initial_hbar(&self, index: usize) -> u64 {
        self.account(index)
            .and_then(|account| account.initial_hbar)
            .unwrap_or(self.local.default_initial_hbar)
    }
}
