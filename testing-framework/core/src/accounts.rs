use ledger_testing_config::{AccountFixture, LedgerFixtureConfig};
use thiserror::Error;

use crate::{
    client::Operator,
    ledger::{AccountId, EntityIdError, KeyError, PrivateKey, PublicKey},
};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("fixture account `{id}` has an invalid id: {source}")]
    Id {
        id: String,
        #[source]
        source: EntityIdError,
    },
    #[error("fixture account `{id}` has an invalid private key: {source}")]
    Key {
        id: String,
        #[source]
        source: KeyError,
    },
}

/// A fixture account with its id and key parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub private_key: PrivateKey,
}

impl Account {
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.private_key.public_key()
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        Operator::new(self.id, self.private_key.clone())
    }
}

impl TryFrom<&AccountFixture> for Account {
    type Error = AccountError;

    fn try_from(fixture: &AccountFixture) -> Result<Self, Self::Error> {
        let id = fixture.id.parse().map_err(|source| AccountError::Id {
            id: fixture.id.clone(),
            source,
        })?;
        let private_key =
            PrivateKey::from_str_ed25519(&fixture.private_key).map_err(|source| {
                AccountError::Key {
                    id: fixture.id.clone(),
                    source,
                }
            })?;
        Ok(Self { id, private_key })
    }
}

/// Parses every account of the fixture, in fixture order.
pub fn accounts_from_fixture(config: &LedgerFixtureConfig) -> Result<Vec<Account>, AccountError> {
    config.accounts.iter().map(Account::try_from).collect()
}
