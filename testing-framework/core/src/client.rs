use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::{
    AccountBalance, AccountId, PrivateKey, Status, TokenId, TokenInfo, TopicId, TopicInfo,
    TopicMessage, Transaction, TransactionError, TransactionId, TransactionReceipt,
};

/// Account that pays for and signs transactions by default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operator {
    pub account_id: AccountId,
    pub private_key: PrivateKey,
}

impl Operator {
    #[must_use]
    pub const fn new(account_id: AccountId, private_key: PrivateKey) -> Self {
        Self {
            account_id,
            private_key,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction `{transaction_id}` failed pre-check with status {status}")]
    PreCheck {
        status: Status,
        transaction_id: TransactionId,
    },
    #[error("receipt for transaction `{transaction_id}` failed with status {status}")]
    ReceiptStatus {
        status: Status,
        transaction_id: TransactionId,
    },
    #[error("query failed with status {status}")]
    QueryStatus { status: Status },
    #[error("client has no operator; call set_operator first")]
    NoOperator,
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl LedgerError {
    /// Status code the ledger reported, when the failure carries one.
    #[must_use]
    pub const fn status(&self) -> Option<&Status> {
        match self {
            Self::PreCheck { status, .. }
            | Self::ReceiptStatus { status, .. }
            | Self::QueryStatus { status } => Some(status),
            _ => None,
        }
    }
}

/// Subscription to a topic's message stream, starting at its first message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TopicMessageQuery {
    pub topic_id: TopicId,
    pub limit: usize,
    pub timeout: Duration,
}

impl TopicMessageQuery {
    #[must_use]
    pub const fn new(topic_id: TopicId) -> Self {
        Self {
            topic_id,
            limit: 1,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The operations the steps need from a ledger client SDK.
#[async_trait]
pub trait LedgerClient: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn set_operator(&self, operator: Operator);

    fn operator(&self) -> Option<Operator>;

    async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError>;

    async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, LedgerError>;

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError>;

    /// Collects up to `query.limit` messages, returning early with whatever
    /// arrived once `query.timeout` elapses.
    async fn topic_messages(
        &self,
        query: TopicMessageQuery,
    ) -> Result<Vec<TopicMessage>, LedgerError>;

    /// Submits the transaction and waits for its receipt. Unfrozen
    /// transactions are frozen with the operator as payer; the operator
    /// always signs. A non-success receipt is returned as an error.
    async fn execute(&self, transaction: Transaction) -> Result<TransactionReceipt, LedgerError>;
}

impl Transaction {
    /// Freezes against `client`, paying with its operator unless a
    /// transaction id was pinned.
    pub fn freeze_with<C>(self, client: &C) -> Result<Self, TransactionError>
    where
        C: LedgerClient + ?Sized,
    {
        self.freeze(client.operator().map(|operator| operator.account_id))
    }
}
