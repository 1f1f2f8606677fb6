//! In-process ledger double used for offline scenario runs.

mod state;

use std::sync::{Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use ledger_testing_config::LedgerFixtureConfig;
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, info, warn};

use self::state::LedgerState;
use crate::{
    accounts::{Account, AccountError, accounts_from_fixture},
    client::{LedgerClient, LedgerError, Operator, TopicMessageQuery},
    ledger::{
        AccountBalance, AccountId, Hbar, Status, TokenId, TokenInfo, TopicId, TopicInfo,
        TopicMessage, Transaction, TransactionBody, TransactionReceipt,
    },
};

/// Ledger kept in memory: balances, topics and tokens live for as long as
/// the value does, and every transaction settles immediately.
#[derive(Debug)]
pub struct LocalLedger {
    state: Mutex<LedgerState>,
    operator: RwLock<Option<Operator>>,
    published: Notify,
}

impl LocalLedger {
    /// Genesis with the given accounts, funded per the fixture.
    #[must_use]
    pub fn new(accounts: &[Account], config: &LedgerFixtureConfig) -> Self {
        let genesis = accounts.iter().enumerate().map(|(index, account)| {
            (
                account.id,
                account.public_key(),
                Hbar::from_hbars(config.initial_hbar(index)),
            )
        });

        info!(
            accounts = accounts.len(),
            fee_tinybars = config.local.transaction_fee_tinybars,
            "starting local ledger"
        );

        Self {
            state: Mutex::new(LedgerState::genesis(genesis, &config.local)),
            operator: RwLock::new(None),
            published: Notify::new(),
        }
    }

    pub fn from_fixture(config: &LedgerFixtureConfig) -> Result<Self, AccountError> {
        let accounts = accounts_from_fixture(config)?;
        Ok(Self::new(&accounts, config))
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn query_failed(status: Status) -> LedgerError {
    LedgerError::QueryStatus { status }
}

#[async_trait]
impl LedgerClient for LocalLedger {
    fn name(&self) -> &'static str {
        "local"
    }

    fn set_operator(&self, operator: Operator) {
        debug!(account = %operator.account_id, "local ledger operator set");
        *self
            .operator
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(operator);
    }

    fn operator(&self) -> Option<Operator> {
        self.operator
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn account_balance(&self, account_id: AccountId) -> Result<AccountBalance, LedgerError> {
        self.state().balance(account_id).map_err(query_failed)
    }

    async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, LedgerError> {
        self.state().topic_info(topic_id).map_err(query_failed)
    }

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError> {
        self.state().token_info(token_id).map_err(query_failed)
    }

    async fn topic_messages(
        &self,
        query: TopicMessageQuery,
    ) -> Result<Vec<TopicMessage>, LedgerError> {
        let deadline = Instant::now() + query.timeout;

        loop {
            // Registered before reading so a publish in between still wakes us.
            let notified = self.published.notified();
            let messages = self
                .state()
                .messages(query.topic_id, query.limit)
                .map_err(query_failed)?;

            if messages.len() >= query.limit {
                return Ok(messages);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!(
                    topic = %query.topic_id,
                    received = messages.len(),
                    wanted = query.limit,
                    "topic subscription timed out"
                );
                return Ok(messages);
            }
        }
    }

    async fn execute(&self, transaction: Transaction) -> Result<TransactionReceipt, LedgerError> {
        let operator = self.operator();
        let mut transaction = transaction.freeze(operator.as_ref().map(|op| op.account_id))?;
        if let Some(operator) = &operator {
            transaction = transaction.sign(&operator.private_key)?;
        }

        let kind = transaction.body().kind();
        let publishes = matches!(transaction.body(), TransactionBody::TopicMessageSubmit(_));
        let result = self.state().apply(&transaction);

        match &result {
            Ok(receipt) => {
                info!(
                    transaction_id = %receipt.transaction_id,
                    kind,
                    status = %receipt.status,
                    "transaction reached consensus"
                );
                if publishes {
                    self.published.notify_waiters();
                }
            }
            Err(err) => warn!(kind, error = %err, "transaction rejected"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::ledger::{
        KeyList, TokenAssociate, TokenCreate, TokenMint, TopicCreate, TopicMessageSubmit,
        TransactionId, Transfer,
    };

    struct Fixture {
        ledger: LocalLedger,
        accounts: Vec<Account>,
        fee: Hbar,
    }

    fn fixture() -> Fixture {
        let config = LedgerFixtureConfig::local_default();
        let accounts = accounts_from_fixture(&config).unwrap();
        let ledger = LocalLedger::new(&accounts, &config);
        ledger.set_operator(accounts[0].operator());
        Fixture {
            ledger,
            fee: Hbar::from_tinybars(config.local.transaction_fee_tinybars),
            accounts,
        }
    }

    fn receipt_status(err: &LedgerError) -> Option<&Status> {
        match err {
            LedgerError::ReceiptStatus { status, .. } => Some(status),
            _ => None,
        }
    }

    async fn create_token(f: &Fixture, supply: u64, with_supply_key: bool) -> TokenId {
        let treasury = &f.accounts[0];
        let mut body = TokenCreate::new("Test Token", "HTT", treasury.id)
            .decimals(2)
            .initial_supply(supply);
        if with_supply_key {
            body = body.supply_key(treasury.public_key());
        }
        f.ledger
            .execute(Transaction::new(body))
            .await
            .unwrap()
            .token_id
            .unwrap()
    }

    async fn associate(f: &Fixture, account: &Account, token_id: TokenId) {
        let tx = Transaction::new(TokenAssociate {
            account_id: account.id,
            token_ids: vec![token_id],
        })
        .freeze_with(&f.ledger)
        .unwrap()
        .sign(&account.private_key)
        .unwrap();
        f.ledger.execute(tx).await.unwrap();
    }

    #[tokio::test]
    async fn genesis_balances_come_from_the_fixture() {
        let f = fixture();
        let balance = f.ledger.account_balance(f.accounts[1].id).await.unwrap();
        assert_eq!(balance.hbars, Hbar::from_hbars(1_000));
        assert!(balance.tokens.is_empty());

        let err = f
            .ledger
            .account_balance(AccountId::new(0, 0, 1))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(&Status::InvalidAccountId));
    }

    #[tokio::test]
    async fn published_messages_reach_subscribers() {
        let f = Arc::new(fixture());
        let topic_id = f
            .ledger
            .execute(Transaction::new(
                TopicCreate::new("Taxi rides").submit_key(f.accounts[0].public_key()),
            ))
            .await
            .unwrap()
            .topic_id
            .unwrap();

        let subscriber = {
            let f = Arc::clone(&f);
            tokio::spawn(async move {
                f.ledger
                    .topic_messages(
                        TopicMessageQuery::new(topic_id)
                            .limit(2)
                            .timeout(Duration::from_secs(5)),
                    )
                    .await
            })
        };

        for message in ["Hello", "World"] {
            let receipt = f
                .ledger
                .execute(Transaction::new(TopicMessageSubmit::new(topic_id, message)))
                .await
                .unwrap();
            assert_eq!(receipt.status, Status::Success);
        }

        let messages = subscriber.await.unwrap().unwrap();
        let contents: Vec<_> = messages.iter().map(TopicMessage::contents_lossy).collect();
        assert_eq!(contents, vec!["Hello", "World"]);
        assert_eq!(messages[1].sequence_number, 2);

        let info = f.ledger.topic_info(topic_id).await.unwrap();
        assert_eq!(info.memo, "Taxi rides");
        assert_eq!(info.sequence_number, 2);
    }

    #[tokio::test]
    async fn subscription_returns_what_arrived_before_the_timeout() {
        let f = fixture();
        let topic_id = f
            .ledger
            .execute(Transaction::new(TopicCreate::new("quiet")))
            .await
            .unwrap()
            .topic_id
            .unwrap();

        let messages = f
            .ledger
            .topic_messages(
                TopicMessageQuery::new(topic_id).timeout(Duration::from_millis(20)),
            )
            .await
            .unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn threshold_submit_key_needs_enough_signatures() {
        let f = fixture();
        let (first, second) = (&f.accounts[0], &f.accounts[1]);
        let two_of_two = KeyList::threshold(
            vec![first.public_key().into(), second.public_key().into()],
            2,
        )
        .unwrap();
        let topic_id = f
            .ledger
            .execute(Transaction::new(TopicCreate::new("guarded").submit_key(two_of_two)))
            .await
            .unwrap()
            .topic_id
            .unwrap();

        let err = f
            .ledger
            .execute(Transaction::new(TopicMessageSubmit::new(topic_id, "x")))
            .await
            .unwrap_err();
        assert_eq!(receipt_status(&err), Some(&Status::InvalidSignature));

        let tx = Transaction::new(TopicMessageSubmit::new(topic_id, "x"))
            .freeze_with(&f.ledger)
            .unwrap()
            .sign(&second.private_key)
            .unwrap();
        f.ledger.execute(tx).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_topic_messages() {
        let f = fixture();
        let topic_id = f
            .ledger
            .execute(Transaction::new(TopicCreate::new("")))
            .await
            .unwrap()
            .topic_id
            .unwrap();

        let empty = f
            .ledger
            .execute(Transaction::new(TopicMessageSubmit::new(topic_id, "")))
            .await
            .unwrap_err();
        assert_eq!(receipt_status(&empty), Some(&Status::InvalidTopicMessage));

        let large = f
            .ledger
            .execute(Transaction::new(TopicMessageSubmit::new(
                topic_id,
                vec![b'a'; 1025],
            )))
            .await
            .unwrap_err();
        assert_eq!(receipt_status(&large), Some(&Status::MessageSizeTooLarge));

        let memo = f
            .ledger
            .execute(Transaction::new(TopicCreate::new("m".repeat(101))))
            .await
            .unwrap_err();
        assert_eq!(receipt_status(&memo), Some(&Status::MemoTooLong));
    }

    #[tokio::test]
    async fn mint_requires_a_supply_key() {
        let f = fixture();
        let mintable = create_token(&f, 0, true).await;
        let fixed = create_token(&f, 1_000, false).await;

        let receipt = f
            .ledger
            .execute(Transaction::new(TokenMint {
                token_id: mintable,
                amount: 100,
            }))
            .await
            .unwrap();
        assert_eq!(receipt.total_supply, Some(100));
        assert_eq!(f.ledger.token_info(mintable).await.unwrap().total_supply, 100);

        let err = f
            .ledger
            .execute(Transaction::new(TokenMint {
                token_id: fixed,
                amount: 100,
            }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TOKEN_HAS_NO_SUPPLY_KEY"));

        let info = f.ledger.token_info(fixed).await.unwrap();
        assert_eq!(info.total_supply, 1_000);
        assert_eq!(info.treasury_account_id, f.accounts[0].id);
        assert!(!info.has_supply_key);
    }

    #[tokio::test]
    async fn transfers_move_tokens_and_charge_the_payer() {
        let f = fixture();
        let (first, second) = (&f.accounts[0], &f.accounts[1]);
        let token_id = create_token(&f, 100, false).await;
        associate(&f, second, token_id).await;

        let before = f.ledger.account_balance(first.id).await.unwrap().hbars;
        let tx = Transaction::new(
            Transfer::new()
                .token_transfer(token_id, first.id, -10)
                .token_transfer(token_id, second.id, 10),
        )
        .freeze_with(&f.ledger)
        .unwrap()
        .sign(&first.private_key)
        .unwrap();
        f.ledger.execute(tx).await.unwrap();

        let first_balance = f.ledger.account_balance(first.id).await.unwrap();
        let second_balance = f.ledger.account_balance(second.id).await.unwrap();
        assert_eq!(first_balance.token(&token_id), 90);
        assert_eq!(second_balance.token(&token_id), 10);
        assert_eq!(first_balance.hbars, before - f.fee);
    }

    #[tokio::test]
    async fn explicit_payer_pays_and_must_sign() {
        let f = fixture();
        let (first, second) = (&f.accounts[0], &f.accounts[1]);
        let token_id = create_token(&f, 100, false).await;
        associate(&f, second, token_id).await;

        let second_before = f.ledger.account_balance(second.id).await.unwrap().hbars;
        let first_before = f.ledger.account_balance(first.id).await.unwrap().hbars;

        let transfer = Transfer::new()
            .token_transfer(token_id, first.id, -5)
            .token_transfer(token_id, second.id, 5);

        let unsigned = Transaction::new(transfer.clone())
            .with_transaction_id(TransactionId::generate(second.id))
            .unwrap();
        let err = f.ledger.execute(unsigned).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::PreCheck {
                status: Status::InvalidSignature,
                ..
            }
        ));

        let signed = Transaction::new(transfer)
            .with_transaction_id(TransactionId::generate(second.id))
            .unwrap()
            .freeze_with(&f.ledger)
            .unwrap()
            .sign(&second.private_key)
            .unwrap();
        f.ledger.execute(signed).await.unwrap();

        assert_eq!(
            f.ledger.account_balance(second.id).await.unwrap().hbars,
            second_before - f.fee
        );
        assert_eq!(
            f.ledger.account_balance(first.id).await.unwrap().hbars,
            first_before
        );
    }

    #[tokio::test]
    async fn transfer_validation_leaves_balances_untouched() {
        let f = fixture();
        let (first, second, third) = (&f.accounts[0], &f.accounts[1], &f.accounts[2]);
        let token_id = create_token(&f, 100, false).await;
        associate(&f, second, token_id).await;

        let cases = [
            (
                Transfer::new()
                    .token_transfer(token_id, first.id, -10)
                    .token_transfer(token_id, second.id, 5),
                Status::TransfersNotZeroSumForToken,
            ),
            (
                Transfer::new()
                    .token_transfer(token_id, first.id, -10)
                    .token_transfer(token_id, third.id, 10),
                Status::TokenNotAssociatedToAccount,
            ),
            (
                Transfer::new()
                    .token_transfer(token_id, first.id, -500)
                    .token_transfer(token_id, second.id, 500),
                Status::InsufficientTokenBalance,
            ),
            (
                Transfer::new()
                    .token_transfer(token_id, second.id, -1)
                    .token_transfer(token_id, first.id, 1),
                Status::InvalidSignature,
            ),
            (Transfer::new(), Status::EmptyTokenTransferBody),
        ];

        for (transfer, expected) in cases {
            let err = f
                .ledger
                .execute(Transaction::new(transfer))
                .await
                .unwrap_err();
            assert_eq!(receipt_status(&err), Some(&expected));
        }

        assert_eq!(
            f.ledger
                .account_balance(first.id)
                .await
                .unwrap()
                .token(&token_id),
            100
        );
        assert_eq!(
            f.ledger
                .account_balance(second.id)
                .await
                .unwrap()
                .token(&token_id),
            0
        );
    }

    #[tokio::test]
    async fn minting_nothing_is_rejected() {
        let f = fixture();
        let token_id = create_token(&f, 10, true).await;

        let err = f
            .ledger
            .execute(Transaction::new(TokenMint {
                token_id,
                amount: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(receipt_status(&err), Some(&Status::InvalidTokenMintAmount));
        assert!(err.to_string().contains("INVALID_TOKEN_MINT_AMOUNT"));
        assert_eq!(f.ledger.token_info(token_id).await.unwrap().total_supply, 10);
    }

    #[tokio::test]
    async fn payer_without_hbars_is_turned_away() {
        let mut config = LedgerFixtureConfig::local_default();
        config.accounts[1].initial_hbar = Some(0);
        let accounts = accounts_from_fixture(&config).unwrap();
        let ledger = LocalLedger::new(&accounts, &config);
        let broke = &accounts[1];

        let tx = Transaction::new(TopicCreate::new("unpaid"))
            .with_transaction_id(TransactionId::generate(broke.id))
            .unwrap()
            .freeze_with(&ledger)
            .unwrap()
            .sign(&broke.private_key)
            .unwrap();
        let err = ledger.execute(tx).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::PreCheck {
                status: Status::InsufficientPayerBalance,
                ..
            }
        ));
        assert_eq!(
            ledger.account_balance(broke.id).await.unwrap().hbars,
            Hbar::from_tinybars(0)
        );
    }

    #[tokio::test]
    async fn reused_transaction_ids_are_rejected() {
        let f = fixture();
        let tx = Transaction::new(TopicCreate::new("once"))
            .freeze_with(&f.ledger)
            .unwrap();

        f.ledger.execute(tx.clone()).await.unwrap();
        let err = f.ledger.execute(tx).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::PreCheck {
                status: Status::DuplicateTransaction,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn associating_twice_fails() {
        let f = fixture();
        let second = &f.accounts[1];
        let token_id = create_token(&f, 1, false).await;
        associate(&f, second, token_id).await;

        let tx = Transaction::new(TokenAssociate {
            account_id: second.id,
            token_ids: vec![token_id],
        })
        .freeze_with(&f.ledger)
        .unwrap()
        .sign(&second.private_key)
        .unwrap();
        let err = f.ledger.execute(tx).await.unwrap_err();
        assert_eq!(
            receipt_status(&err),
            Some(&Status::TokenAlreadyAssociatedToAccount)
        );
    }
}
