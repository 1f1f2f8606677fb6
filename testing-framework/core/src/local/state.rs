use std::{
    collections::{BTreeMap, HashMap, HashSet},
    time::SystemTime,
};

use ledger_testing_config::{LocalLedgerParams, constants::MAX_MEMO_BYTES};
use tracing::debug;

use crate::{
    client::LedgerError,
    ledger::{
        AccountBalance, AccountId, Hbar, Key, PublicKey, Status, TokenAssociate, TokenCreate,
        TokenId, TokenInfo, TokenMint, TopicCreate, TopicId, TopicInfo, TopicMessage,
        TopicMessageSubmit, Transaction, TransactionBody, TransactionError, TransactionId,
        TransactionReceipt, Transfer,
    },
};

#[derive(Debug)]
struct AccountEntry {
    key: Key,
    hbars: Hbar,
    tokens: BTreeMap<TokenId, u64>,
}

#[derive(Debug)]
struct TopicEntry {
    memo: String,
    submit_key: Option<Key>,
    messages: Vec<TopicMessage>,
}

#[derive(Debug)]
struct TokenEntry {
    name: String,
    symbol: String,
    decimals: u32,
    total_supply: u64,
    treasury: AccountId,
    supply_key: Option<Key>,
}

/// Everything the in-process ledger knows. Transactions are validated in
/// full before any balance changes, so a failed body leaves no trace apart
/// from the fee.
#[derive(Debug)]
pub(super) struct LedgerState {
    accounts: HashMap<AccountId, AccountEntry>,
    topics: HashMap<TopicId, TopicEntry>,
    tokens: HashMap<TokenId, TokenEntry>,
    seen_transactions: HashSet<TransactionId>,
    next_entity_num: u64,
    fee: Hbar,
    max_message_bytes: usize,
}

type BodyResult = Result<TransactionReceipt, Status>;

impl LedgerState {
    pub(super) fn genesis(
        accounts: impl IntoIterator<Item = (AccountId, PublicKey, Hbar)>,
        params: &LocalLedgerParams,
    ) -> Self {
        let accounts: HashMap<_, _> = accounts
            .into_iter()
            .map(|(id, key, hbars)| {
                (
                    id,
                    AccountEntry {
                        key: key.into(),
                        hbars,
                        tokens: BTreeMap::new(),
                    },
                )
            })
            .collect();
        let next_entity_num = accounts.keys().map(AccountId::num).max().unwrap_or(1000) + 1;

        Self {
            accounts,
            topics: HashMap::new(),
            tokens: HashMap::new(),
            seen_transactions: HashSet::new(),
            next_entity_num,
            fee: Hbar::from_tinybars(params.transaction_fee_tinybars),
            max_message_bytes: params.max_message_bytes,
        }
    }

    pub(super) fn balance(&self, account_id: AccountId) -> Result<AccountBalance, Status> {
        let account = self
            .accounts
            .get(&account_id)
            .ok_or(Status::InvalidAccountId)?;
        Ok(AccountBalance {
            account_id,
            hbars: account.hbars,
            tokens: account.tokens.clone(),
        })
    }

    pub(super) fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, Status> {
        let topic = self.topics.get(&topic_id).ok_or(Status::InvalidTopicId)?;
        Ok(TopicInfo {
            topic_id,
            memo: topic.memo.clone(),
            sequence_number: topic.messages.len() as u64,
            has_submit_key: topic.submit_key.is_some(),
        })
    }

    pub(super) fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, Status> {
        let token = self.tokens.get(&token_id).ok_or(Status::InvalidTokenId)?;
        Ok(TokenInfo {
            token_id,
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            total_supply: token.total_supply,
            treasury_account_id: token.treasury,
            has_supply_key: token.supply_key.is_some(),
        })
    }

    /// The first `limit` messages of the topic, in sequence order.
    pub(super) fn messages(
        &self,
        topic_id: TopicId,
        limit: usize,
    ) -> Result<Vec<TopicMessage>, Status> {
        let topic = self.topics.get(&topic_id).ok_or(Status::InvalidTopicId)?;
        Ok(topic.messages.iter().take(limit).cloned().collect())
    }

    /// Pre-checks, charges the fee and applies a frozen, signed transaction.
    pub(super) fn apply(&mut self, tx: &Transaction) -> Result<TransactionReceipt, LedgerError> {
        let transaction_id = tx
            .transaction_id()
            .ok_or(TransactionError::NotFrozen)?;
        let precheck = |status| LedgerError::PreCheck {
            status,
            transaction_id,
        };

        if self.seen_transactions.contains(&transaction_id) {
            return Err(precheck(Status::DuplicateTransaction));
        }

        let signers = tx
            .verified_signers()
            .ok_or_else(|| precheck(Status::InvalidSignature))?;

        let payer = self
            .accounts
            .get(&transaction_id.account_id)
            .ok_or_else(|| precheck(Status::PayerAccountNotFound))?;
        if !payer.key.is_satisfied_by(&signers) {
            return Err(precheck(Status::InvalidSignature));
        }
        if payer.hbars < self.fee {
            return Err(precheck(Status::InsufficientPayerBalance));
        }

        self.seen_transactions.insert(transaction_id);
        if let Some(payer) = self.accounts.get_mut(&transaction_id.account_id) {
            payer.hbars = payer.hbars - self.fee;
        }

        debug!(
            %transaction_id,
            kind = tx.body().kind(),
            signers = signers.len(),
            "applying transaction"
        );

        let receipt = TransactionReceipt::new(transaction_id, Status::Success);
        let result = match tx.body() {
            TransactionBody::TopicCreate(body) => self.create_topic(body, receipt),
            TransactionBody::TopicMessageSubmit(body) => {
                self.submit_message(body, &signers, receipt)
            }
            TransactionBody::TokenCreate(body) => self.create_token(body, &signers, receipt),
            TransactionBody::TokenMint(body) => self.mint(body, &signers, receipt),
            TransactionBody::TokenAssociate(body) => self.associate(body, &signers, receipt),
            TransactionBody::Transfer(body) => self.transfer(body, &signers, receipt),
        };

        result.map_err(|status| LedgerError::ReceiptStatus {
            status,
            transaction_id,
        })
    }

    fn next_num(&mut self) -> u64 {
        let num = self.next_entity_num;
        self.next_entity_num += 1;
        num
    }

    fn require_account_key(
        &self,
        account_id: AccountId,
        signers: &HashSet<PublicKey>,
        missing: Status,
    ) -> Result<(), Status> {
        let account = self.accounts.get(&account_id).ok_or(missing)?;
        if account.key.is_satisfied_by(signers) {
            Ok(())
        } else {
            Err(Status::InvalidSignature)
        }
    }

    fn create_topic(&mut self, body: &TopicCreate, mut receipt: TransactionReceipt) -> BodyResult {
        if body.memo.len() > MAX_MEMO_BYTES {
            return Err(Status::MemoTooLong);
        }

        let topic_id = TopicId::new(0, 0, self.next_num());
        self.topics.insert(
            topic_id,
            TopicEntry {
                memo: body.memo.clone(),
                submit_key: body.submit_key.clone(),
                messages: Vec::new(),
            },
        );

        receipt.topic_id = Some(topic_id);
        Ok(receipt)
    }

    fn submit_message(
        &mut self,
        body: &TopicMessageSubmit,
        signers: &HashSet<PublicKey>,
        mut receipt: TransactionReceipt,
    ) -> BodyResult {
        let max_message_bytes = self.max_message_bytes;
        let topic = self
            .topics
            .get_mut(&body.topic_id)
            .ok_or(Status::InvalidTopicId)?;

        if body.message.is_empty() {
            return Err(Status::InvalidTopicMessage);
        }
        if body.message.len() > max_message_bytes {
            return Err(Status::MessageSizeTooLarge);
        }
        if let Some(key) = &topic.submit_key {
            if !key.is_satisfied_by(signers) {
                return Err(Status::InvalidSignature);
            }
        }

        let sequence_number = topic.messages.len() as u64 + 1;
        topic.messages.push(TopicMessage {
            topic_id: body.topic_id,
            sequence_number,
            consensus_timestamp: SystemTime::now(),
            contents: body.message.clone(),
        });

        receipt.topic_sequence_number = Some(sequence_number);
        Ok(receipt)
    }

    fn create_token(
        &mut self,
        body: &TokenCreate,
        signers: &HashSet<PublicKey>,
        mut receipt: TransactionReceipt,
    ) -> BodyResult {
        if body.name.is_empty() {
            return Err(Status::MissingTokenName);
        }
        if body.symbol.is_empty() {
            return Err(Status::MissingTokenSymbol);
        }
        if body.initial_supply > i64::MAX as u64 {
            return Err(Status::InvalidTokenMintAmount);
        }
        self.require_account_key(
            body.treasury_account_id,
            signers,
            Status::InvalidTreasuryAccountForToken,
        )?;

        let token_id = TokenId::new(0, 0, self.next_num());
        self.tokens.insert(
            token_id,
            TokenEntry {
                name: body.name.clone(),
                symbol: body.symbol.clone(),
                decimals: body.decimals,
                total_supply: body.initial_supply,
                treasury: body.treasury_account_id,
                supply_key: body.supply_key.clone(),
            },
        );
        if let Some(treasury) = self.accounts.get_mut(&body.treasury_account_id) {
            treasury.tokens.insert(token_id, body.initial_supply);
        }

        receipt.token_id = Some(token_id);
        receipt.total_supply = Some(body.initial_supply);
        Ok(receipt)
    }

    fn mint(
        &mut self,
        body: &TokenMint,
        signers: &HashSet<PublicKey>,
        mut receipt: TransactionReceipt,
    ) -> BodyResult {
        let token = self
            .tokens
            .get_mut(&body.token_id)
            .ok_or(Status::InvalidTokenId)?;
        let supply_key = token
            .supply_key
            .as_ref()
            .ok_or(Status::TokenHasNoSupplyKey)?;
        if !supply_key.is_satisfied_by(signers) {
            return Err(Status::InvalidSignature);
        }
        if body.amount == 0 {
            return Err(Status::InvalidTokenMintAmount);
        }
        let total_supply = token
            .total_supply
            .checked_add(body.amount)
            .filter(|total| *total <= i64::MAX as u64)
            .ok_or(Status::InvalidTokenMintAmount)?;

        token.total_supply = total_supply;
        let treasury = token.treasury;
        if let Some(account) = self.accounts.get_mut(&treasury) {
            *account.tokens.entry(body.token_id).or_default() += body.amount;
        }

        receipt.total_supply = Some(total_supply);
        Ok(receipt)
    }

    fn associate(
        &mut self,
        body: &TokenAssociate,
        signers: &HashSet<PublicKey>,
        receipt: TransactionReceipt,
    ) -> BodyResult {
        self.require_account_key(body.account_id, signers, Status::InvalidAccountId)?;

        let Some(account) = self.accounts.get(&body.account_id) else {
            return Err(Status::InvalidAccountId);
        };
        for token_id in &body.token_ids {
            if !self.tokens.contains_key(token_id) {
                return Err(Status::InvalidTokenId);
            }
            if account.tokens.contains_key(token_id) {
                return Err(Status::TokenAlreadyAssociatedToAccount);
            }
        }

        if let Some(account) = self.accounts.get_mut(&body.account_id) {
            for token_id in &body.token_ids {
                account.tokens.insert(*token_id, 0);
            }
        }
        Ok(receipt)
    }

    fn transfer(
        &mut self,
        body: &Transfer,
        signers: &HashSet<PublicKey>,
        receipt: TransactionReceipt,
    ) -> BodyResult {
        if body.token_transfers.is_empty() {
            return Err(Status::EmptyTokenTransferBody);
        }

        let mut sums: HashMap<TokenId, i128> = HashMap::new();
        for entry in &body.token_transfers {
            *sums.entry(entry.token_id).or_default() += i128::from(entry.amount);
        }
        if sums.values().any(|sum| *sum != 0) {
            return Err(Status::TransfersNotZeroSumForToken);
        }

        let mut staged: HashMap<(AccountId, TokenId), u64> = HashMap::new();
        for entry in &body.token_transfers {
            if !self.tokens.contains_key(&entry.token_id) {
                return Err(Status::InvalidTokenId);
            }
            let account = self
                .accounts
                .get(&entry.account_id)
                .ok_or(Status::InvalidAccountId)?;
            let current = *account
                .tokens
                .get(&entry.token_id)
                .ok_or(Status::TokenNotAssociatedToAccount)?;
            if entry.amount < 0 && !account.key.is_satisfied_by(signers) {
                return Err(Status::InvalidSignature);
            }

            let updated = i128::from(current) + i128::from(entry.amount);
            let updated = u64::try_from(updated).map_err(|_| Status::InsufficientTokenBalance)?;
            staged.insert((entry.account_id, entry.token_id), updated);
        }

        for ((account_id, token_id), balance) in staged {
            if let Some(account) = self.accounts.get_mut(&account_id) {
                account.tokens.insert(token_id, balance);
            }
        }
        Ok(receipt)
    }
}
