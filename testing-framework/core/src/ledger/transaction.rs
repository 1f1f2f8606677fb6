use std::{collections::HashSet, fmt};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::{AccountId, Key, PrivateKey, PublicKey, SignatureBytes, TokenId, TopicId, TransactionId};

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction must be frozen before it can be signed")]
    NotFrozen,
    #[error("transaction is frozen and can no longer be modified")]
    AlreadyFrozen,
    #[error("transaction has no payer: set a transaction id or a client operator")]
    NoPayer,
    #[error("failed to encode transaction body: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopicCreate {
    pub memo: String,
    pub submit_key: Option<Key>,
}

impl TopicCreate {
    #[must_use]
    pub fn new(memo: impl Into<String>) -> Self {
        Self {
            memo: memo.into(),
            submit_key: None,
        }
    }

    #[must_use]
    pub fn submit_key(mut self, key: impl Into<Key>) -> Self {
        self.submit_key = Some(key.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopicMessageSubmit {
    pub topic_id: TopicId,
    pub message: Vec<u8>,
}

impl TopicMessageSubmit {
    #[must_use]
    pub fn new(topic_id: TopicId, message: impl Into<Vec<u8>>) -> Self {
        Self {
            topic_id,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenCreate {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub treasury_account_id: AccountId,
    pub supply_key: Option<Key>,
}

impl TokenCreate {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        treasury_account_id: AccountId,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: 0,
            initial_supply: 0,
            treasury_account_id,
            supply_key: None,
        }
    }

    #[must_use]
    pub const fn decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    #[must_use]
    pub const fn initial_supply(mut self, supply: u64) -> Self {
        self.initial_supply = supply;
        self
    }

    #[must_use]
    pub fn supply_key(mut self, key: impl Into<Key>) -> Self {
        self.supply_key = Some(key.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenMint {
    pub token_id: TokenId,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenAssociate {
    pub account_id: AccountId,
    pub token_ids: Vec<TokenId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub token_id: TokenId,
    pub account_id: AccountId,
    pub amount: i64,
}

/// Token movements settled atomically; debits are negative amounts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub token_transfers: Vec<TokenTransfer>,
}

impl Transfer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` for the account; repeated token/account pairs merge.
    #[must_use]
    pub fn token_transfer(mut self, token_id: TokenId, account_id: AccountId, amount: i64) -> Self {
        match self
            .token_transfers
            .iter_mut()
            .find(|entry| entry.token_id == token_id && entry.account_id == account_id)
        {
            Some(entry) => entry.amount = entry.amount.saturating_add(amount),
            None => self.token_transfers.push(TokenTransfer {
                token_id,
                account_id,
                amount,
            }),
        }
        self
    }

    /// Accounts whose signature the transfer needs.
    pub fn debited_accounts(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.token_transfers
            .iter()
            .filter(|entry| entry.amount < 0)
            .map(|entry| entry.account_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionBody {
    TopicCreate(TopicCreate),
    TopicMessageSubmit(TopicMessageSubmit),
    TokenCreate(TokenCreate),
    TokenMint(TokenMint),
    TokenAssociate(TokenAssociate),
    Transfer(Transfer),
}

impl TransactionBody {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TopicCreate(_) => "topic_create",
            Self::TopicMessageSubmit(_) => "topic_message_submit",
            Self::TokenCreate(_) => "token_create",
            Self::TokenMint(_) => "token_mint",
            Self::TokenAssociate(_) => "token_associate",
            Self::Transfer(_) => "transfer",
        }
    }
}

macro_rules! body_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for TransactionBody {
                fn from(body: $variant) -> Self {
                    Self::$variant(body)
                }
            }
        )*
    };
}

body_from!(
    TopicCreate,
    TopicMessageSubmit,
    TokenCreate,
    TokenMint,
    TokenAssociate,
    Transfer
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: SignatureBytes,
}

#[derive(Serialize)]
struct SignedBody<'a> {
    transaction_id: &'a TransactionId,
    body: &'a TransactionBody,
}

/// A transaction moving through build → freeze → sign → execute.
///
/// Signatures cover the frozen body bytes. The signing keys are kept as well
/// because SDK backends sign their own encoding of the body; they are only
/// visible inside this crate and never printed.
#[derive(Clone)]
pub struct Transaction {
    body: TransactionBody,
    transaction_id: Option<TransactionId>,
    frozen: Option<Vec<u8>>,
    signatures: Vec<SignaturePair>,
    signers: Vec<PrivateKey>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("body", &self.body)
            .field("transaction_id", &self.transaction_id)
            .field("frozen", &self.is_frozen())
            .field("signatures", &self.signatures)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    #[must_use]
    pub fn new(body: impl Into<TransactionBody>) -> Self {
        Self {
            body: body.into(),
            transaction_id: None,
            frozen: None,
            signatures: Vec::new(),
            signers: Vec::new(),
        }
    }

    /// Pins the transaction id and with it the paying account.
    pub fn with_transaction_id(mut self, id: TransactionId) -> Result<Self, TransactionError> {
        if self.is_frozen() {
            return Err(TransactionError::AlreadyFrozen);
        }
        self.transaction_id = Some(id);
        Ok(self)
    }

    /// Fixes the body. Without an explicit transaction id one is generated
    /// for `default_payer` (normally the client operator).
    pub fn freeze(mut self, default_payer: Option<AccountId>) -> Result<Self, TransactionError> {
        if self.is_frozen() {
            return Ok(self);
        }

        let transaction_id = match self.transaction_id {
            Some(id) => id,
            None => TransactionId::generate(default_payer.ok_or(TransactionError::NoPayer)?),
        };
        let bytes = serde_json::to_vec(&SignedBody {
            transaction_id: &transaction_id,
            body: &self.body,
        })
        .map_err(|source| TransactionError::Encode { source })?;

        debug!(
            %transaction_id,
            kind = self.body.kind(),
            bytes = bytes.len(),
            "transaction frozen"
        );

        self.transaction_id = Some(transaction_id);
        self.frozen = Some(bytes);
        Ok(self)
    }

    /// Adds a signature from `key`; signing twice with one key is a no-op.
    pub fn sign(mut self, key: &PrivateKey) -> Result<Self, TransactionError> {
        let bytes = self.frozen.as_deref().ok_or(TransactionError::NotFrozen)?;
        let public_key = key.public_key();
        if self
            .signatures
            .iter()
            .any(|pair| pair.public_key == public_key)
        {
            return Ok(self);
        }

        let signature = key.sign(bytes);
        self.signatures.push(SignaturePair {
            public_key,
            signature,
        });
        self.signers.push(key.clone());
        Ok(self)
    }

    #[must_use]
    pub const fn body(&self) -> &TransactionBody {
        &self.body
    }

    #[must_use]
    pub const fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    #[must_use]
    pub fn payer(&self) -> Option<AccountId> {
        self.transaction_id.map(|id| id.account_id)
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    #[must_use]
    pub fn signatures(&self) -> &[SignaturePair] {
        &self.signatures
    }

    #[must_use]
    pub(crate) fn signers(&self) -> &[PrivateKey] {
        &self.signers
    }

    /// Public keys whose signature verifies against the frozen body, or
    /// `None` when any attached signature is invalid.
    #[must_use]
    pub fn verified_signers(&self) -> Option<HashSet<PublicKey>> {
        let bytes = self.frozen.as_deref()?;
        self.signatures
            .iter()
            .map(|pair| {
                pair.public_key
                    .verify(bytes, &pair.signature)
                    .then_some(pair.public_key)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(num: u64) -> AccountId {
        AccountId::new(0, 0, num)
    }

    #[test]
    fn transfer_entries_merge_per_account() {
        let token = TokenId::new(0, 0, 9);
        let transfer = Transfer::new()
            .token_transfer(token, account(1), -10)
            .token_transfer(token, account(2), 10)
            .token_transfer(token, account(1), -5);

        assert_eq!(transfer.token_transfers.len(), 2);
        assert_eq!(transfer.token_transfers[0].amount, -15);
        assert_eq!(transfer.debited_accounts().collect::<Vec<_>>(), vec![account(1)]);
    }

    #[test]
    fn signing_requires_a_frozen_transaction() {
        let key = PrivateKey::from_bytes(&[1; 32]);
        let tx = Transaction::new(TopicCreate::new("memo"));

        assert!(matches!(tx.sign(&key), Err(TransactionError::NotFrozen)));
    }

    #[test]
    fn freezing_needs_a_payer() {
        let tx = Transaction::new(TopicCreate::new("memo"));
        assert!(matches!(tx.freeze(None), Err(TransactionError::NoPayer)));
    }

    #[test]
    fn explicit_transaction_id_sets_the_payer() {
        let id = TransactionId::generate(account(2));
        let tx = Transaction::new(TopicCreate::new("memo"))
            .with_transaction_id(id)
            .unwrap()
            .freeze(Some(account(1)))
            .unwrap();

        assert_eq!(tx.payer(), Some(account(2)));
        assert!(matches!(
            tx.with_transaction_id(id),
            Err(TransactionError::AlreadyFrozen)
        ));
    }

    #[test]
    fn signatures_cover_the_frozen_body() {
        let first = PrivateKey::from_bytes(&[1; 32]);
        let second = PrivateKey::from_bytes(&[2; 32]);
        let tx = Transaction::new(TopicMessageSubmit::new(TopicId::new(0, 0, 5), "hi"))
            .freeze(Some(account(1)))
            .unwrap()
            .sign(&first)
            .unwrap()
            .sign(&second)
            .unwrap()
            .sign(&first)
            .unwrap();

        assert_eq!(tx.signatures().len(), 2);
        assert_eq!(tx.signers().len(), 2);

        let signers = tx.verified_signers().unwrap();
        assert!(signers.contains(&first.public_key()));
        assert!(signers.contains(&second.public_key()));
    }

    #[test]
    fn debug_output_leaves_out_signing_keys() {
        let key = PrivateKey::from_bytes(&[9; 32]);
        let tx = Transaction::new(TopicCreate::new("memo"))
            .freeze(Some(account(1)))
            .unwrap()
            .sign(&key)
            .unwrap();

        let rendered = format!("{tx:?}");
        assert!(!rendered.contains(&hex::encode(key.to_bytes())));
        assert!(!rendered.contains("PrivateKey"));
        assert!(rendered.contains("frozen: true"));
    }
}
