use std::{collections::BTreeMap, time::SystemTime};

use super::{AccountId, Hbar, Status, TokenId, TopicId, TransactionId};

/// Outcome of a submitted transaction once it reached consensus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub status: Status,
    pub topic_id: Option<TopicId>,
    pub token_id: Option<TokenId>,
    pub topic_sequence_number: Option<u64>,
    pub total_supply: Option<u64>,
}

impl TransactionReceipt {
    #[must_use]
    pub const fn new(transaction_id: TransactionId, status: Status) -> Self {
        Self {
            transaction_id,
            status,
            topic_id: None,
            token_id: None,
            topic_sequence_number: None,
            total_supply: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub hbars: Hbar,
    /// Every associated token, including zero balances.
    pub tokens: BTreeMap<TokenId, u64>,
}

impl AccountBalance {
    /// Balance of `token_id`, zero when the account does not hold it.
    #[must_use]
    pub fn token(&self, token_id: &TokenId) -> u64 {
        self.tokens.get(token_id).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_associated(&self, token_id: &TokenId) -> bool {
        self.tokens.contains_key(token_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicInfo {
    pub topic_id: TopicId,
    pub memo: String,
    pub sequence_number: u64,
    pub has_submit_key: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenInfo {
    pub token_id: TokenId,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub total_supply: u64,
    pub treasury_account_id: AccountId,
    pub has_supply_key: bool,
}

/// Message delivered by a topic subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicMessage {
    pub topic_id: TopicId,
    pub sequence_number: u64,
    pub consensus_timestamp: SystemTime,
    pub contents: Vec<u8>,
}

impl TopicMessage {
    #[must_use]
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}
