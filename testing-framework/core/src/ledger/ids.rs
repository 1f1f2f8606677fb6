use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity id `{value}` is not of the form shard.realm.num")]
    Malformed { value: String },
    #[error("transaction id `{value}` is not of the form shard.realm.num@seconds.nanos")]
    MalformedTransactionId { value: String },
}

/// `shard.realm.num` triple shared by every ledger entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityNum {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl EntityNum {
    #[must_use]
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl fmt::Display for EntityNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for EntityNum {
    type Err = EntityIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || EntityIdError::Malformed {
            value: value.to_owned(),
        };

        let mut parts = value.trim().split('.');
        let mut next = || -> Result<u64, EntityIdError> {
            parts
                .next()
                .and_then(|part| part.parse::<u64>().ok())
                .ok_or_else(malformed)
        };
        let id = Self::new(next()?, next()?, next()?);

        if parts.next().is_some() {
            return Err(malformed());
        }
        Ok(id)
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay,
            DeserializeFromStr,
        )]
        pub struct $name(pub EntityNum);

        impl $name {
            #[must_use]
            pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
                Self(EntityNum::new(shard, realm, num))
            }

            #[must_use]
            pub const fn num(&self) -> u64 {
                self.0.num
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.parse().map(Self)
            }
        }
    };
}

entity_id!(
    /// Ledger account.
    AccountId
);
entity_id!(
    /// Consensus topic.
    TopicId
);
entity_id!(
    /// Fungible token type.
    TokenId
);

static VALID_START_NONCE: AtomicU32 = AtomicU32::new(0);

/// Payer account plus the instant the transaction becomes valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Duration,
}

impl TransactionId {
    /// New id for `account_id`, unique within the process even when called
    /// twice in the same clock tick.
    #[must_use]
    pub fn generate(account_id: AccountId) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let nonce = VALID_START_NONCE.fetch_add(1, Ordering::Relaxed) % 1_000;

        Self {
            account_id,
            valid_start: now + Duration::from_nanos(u64::from(nonce)),
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:09}",
            self.account_id,
            self.valid_start.as_secs(),
            self.valid_start.subsec_nanos()
        )
    }
}

impl FromStr for TransactionId {
    type Err = EntityIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || EntityIdError::MalformedTransactionId {
            value: value.to_owned(),
        };

        let (account, start) = value.split_once('@').ok_or_else(malformed)?;
        let (secs, nanos) = start.split_once('.').ok_or_else(malformed)?;
        // Nanos are always rendered as nine digits.
        if nanos.len() != 9 || !nanos.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let secs = secs.parse::<u64>().map_err(|_| malformed())?;
        let nanos = nanos.parse::<u32>().map_err(|_| malformed())?;

        Ok(Self {
            account_id: account.parse().map_err(|_| malformed())?,
            valid_start: Duration::new(secs, nanos),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_entity_ids() {
        let id: AccountId = "0.0.4501".parse().unwrap();
        assert_eq!(id, AccountId::new(0, 0, 4501));
        assert_eq!(id.to_string(), "0.0.4501");
        assert_eq!(id.num(), 4501);

        let token: TokenId = " 1.2.3 ".parse().unwrap();
        assert_eq!(token.to_string(), "1.2.3");
    }

    #[test]
    fn rejects_malformed_entity_ids() {
        for raw in ["", "0.0", "0.0.1.2", "a.b.c", "0.0.-1"] {
            assert!(raw.parse::<TopicId>().is_err(), "{raw}");
        }
    }

    #[test]
    fn transaction_ids_are_unique_and_parse_back() {
        let account = AccountId::new(0, 0, 1001);
        let first = TransactionId::generate(account);
        let second = TransactionId::generate(account);
        assert_ne!(first, second);

        let parsed: TransactionId = first.to_string().parse().unwrap();
        assert_eq!(parsed, first);
    }

    #[test]
    fn transaction_id_rendering_pads_nanos() {
        let id = TransactionId {
            account_id: AccountId::new(0, 0, 7),
            valid_start: Duration::new(1_700_000_000, 1),
        };
        assert_eq!(id.to_string(), "0.0.7@1700000000.000000001");
    }

    #[test]
    fn transaction_ids_need_nine_nano_digits() {
        for raw in ["0.0.7@1.5", "0.0.7@1.0000000050", "0.0.7@1.+00000005", "0.0.7@1"] {
            assert!(raw.parse::<TransactionId>().is_err(), "{raw}");
        }
        let id: TransactionId = "0.0.7@1.000000005".parse().unwrap();
        assert_eq!(id.valid_start, Duration::new(1, 5));
    }
}
