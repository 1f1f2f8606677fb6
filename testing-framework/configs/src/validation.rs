use std::{collections::HashSet, io, path::PathBuf};

use thiserror::Error;

use crate::accounts::LedgerFixtureConfig;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read account fixture {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse account fixture: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },
    #[error("account fixture lists no accounts")]
    NoAccounts,
    #[error("account {id} is listed more than once")]
    DuplicateAccount { id: String },
    #[error("account id `{id}` is not of the form shard.realm.num")]
    MalformedAccountId { id: String },
    #[error("account {id} has an empty private key")]
    EmptyPrivateKey { id: String },
    #[error("local transaction fee must be >= 0 (got {fee})")]
    NegativeFee { fee: i64 },
    #[error("local max message size must be > 0")]
    ZeroMessageLimit,
    #[error("unknown ledger network: {value}")]
    UnknownNetwork { value: String },
}

/// Checks the invariants the steps rely on before any scenario runs.
pub fn validate_fixture(config: &LedgerFixtureConfig) -> Result<(), FixtureError> {
    if config.accounts.is_empty() {
        return Err(FixtureError::NoAccounts);
    }

    let mut seen = HashSet::new();
    for account in &config.accounts {
        if !is_entity_id(&account.id) {
            return Err(FixtureError::MalformedAccountId {
                id: account.id.clone(),
            });
        }
        if !seen.insert(account.id.as_str()) {
            return Err(FixtureError::DuplicateAccount {
                id: account.id.clone(),
            });
        }
        if account.private_key.trim().is_empty() {
            return Err(FixtureError::EmptyPrivateKey {
                id: account.id.clone(),
            });
        }
    }

    if config.local.transaction_fee_tinybars < 0 {
        return Err(FixtureError::NegativeFee {
            fee: config.local.transaction_fee_tinybars,
        });
    }

    if config.local.max_message_bytes == 0 {
        return Err(FixtureError::ZeroMessageLimit);
    }

    Ok(())
}

fn is_entity_id(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('.').collect();
    parts.len() == 3 && parts.iter().all(|part| part.parse::<u64>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountFixture;

    fn fixture(ids: &[&str]) -> LedgerFixtureConfig {
        let mut config = LedgerFixtureConfig::local_default();
        config.accounts = ids
            .iter()
            .map(|id| AccountFixture {
                id: (*id).to_owned(),
                private_key: "01".repeat(32),
                initial_hbar: None,
            })
            .collect();
        config
    }

    #[test]
    fn rejects_empty_fixture() {
        let err = validate_fixture(&fixture(&[])).unwrap_err();
        assert!(matches!(err, FixtureError::NoAccounts));
    }

    #[test]
    fn rejects_duplicate_accounts() {
        let err = validate_fixture(&fixture(&["0.0.5", "0.0.5"])).unwrap_err();
        assert!(matches!(err, FixtureError::DuplicateAccount { id } if id == "0.0.5"));
    }

    #[test]
    fn rejects_malformed_ids() {
        for id in ["5", "0.0", "0.0.x", "0.0.5.1"] {
            let err = validate_fixture(&fixture(&[id])).unwrap_err();
            assert!(matches!(err, FixtureError::MalformedAccountId { .. }), "{id}");
        }
    }

    #[test]
    fn rejects_blank_keys() {
        let mut config = fixture(&["0.0.5"]);
        config.accounts[0].private_key = "  ".to_owned();
        let err = validate_fixture(&config).unwrap_err();
        assert!(matches!(err, FixtureError::EmptyPrivateKey { .. }));
    }

    #[test]
    fn rejects_bad_local_params() {
        let mut config = fixture(&["0.0.5"]);
        config.local.transaction_fee_tinybars = -1;
        assert!(matches!(
            validate_fixture(&config).unwrap_err(),
            FixtureError::NegativeFee { fee: -1 }
        ));

        let mut config = fixture(&["0.0.5"]);
        config.local.max_message_bytes = 0;
        assert!(matches!(
            validate_fixture(&config).unwrap_err(),
            FixtureError::ZeroMessageLimit
        ));
    }
}
