use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
};

use cucumber::World;
use ledger_testing_config::{
    FixtureError, LedgerFixtureConfig, LedgerNetwork, validation::validate_fixture,
};
use ledger_testing_core::{
    Account, AccountError, LedgerClient, LedgerError, LocalLedger, accounts_from_fixture,
    ledger::{
        AccountBalance, AccountId, Hbar, KeyError, KeyList, PrivateKey, TokenAssociate,
        TokenCreate, TokenId, TokenMint, TopicId, Transaction, TransactionError,
        TransactionReceipt, Transfer,
    },
};
use ledger_testing_env as tf_env;
use thiserror::Error;
use tracing::{debug, info};

pub const TOKEN_NAME: &str = "Test Token";
pub const TOKEN_SYMBOL: &str = "HTT";
pub const TOKEN_DECIMALS: u32 = 2;

/// Position of a scenario account in the fixture.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AccountSlot {
    First,
    Second,
    Third,
    Fourth,
}

impl AccountSlot {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
            Self::Fourth => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Second => "second",
            Self::Third => "third",
            Self::Fourth => "fourth",
        }
    }
}

impl fmt::Display for AccountSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountSlot {
    type Err = StepError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "second" => Ok(Self::Second),
            "third" => Ok(Self::Third),
            "fourth" => Ok(Self::Fourth),
            other => Err(StepError::InvalidArgument {
                message: format!("unknown account position `{other}`"),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("the {slot} account has not been introduced in this scenario")]
    MissingAccount { slot: AccountSlot },
    #[error("the fixture has {available} accounts; the {slot} account needs at least {}", .slot.index() + 1)]
    MissingFixtureAccount { slot: AccountSlot, available: usize },
    #[error("no fixture account can sign for {account_id}")]
    MissingSigner { account_id: AccountId },
    #[error("no topic has been created in this scenario")]
    MissingTopic,
    #[error("no token has been created in this scenario")]
    MissingToken,
    #[error("no threshold key has been built in this scenario")]
    MissingThresholdKey,
    #[error("no transfer transaction is pending")]
    MissingPendingTransfer,
    #[error("no transaction has been submitted in this scenario")]
    MissingReceipt,
    #[error("no hbar balance was recorded for the {slot} account")]
    MissingSnapshot { slot: AccountSlot },
    #[error("unsupported ledger backend: {value}")]
    UnsupportedBackend { value: String },
    #[error("backend `{backend}` needs the `hedera` feature of ledger-cucumber")]
    BackendUnavailable { backend: LedgerNetwork },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("failed to load account fixture: {source}")]
    Fixture {
        #[source]
        source: FixtureError,
    },
    #[error("invalid fixture account: {source}")]
    Account {
        #[source]
        source: AccountError,
    },
    #[error("invalid key: {source}")]
    Key {
        #[source]
        source: KeyError,
    },
    #[error("failed to build transaction: {source}")]
    Transaction {
        #[source]
        source: TransactionError,
    },
    #[error("{source}")]
    Ledger {
        #[source]
        source: LedgerError,
    },
    #[error("{what}: expected {expected}, got {actual}")]
    Assertion {
        what: String,
        expected: String,
        actual: String,
    },
    #[error("{what} did not finish within {seconds}s")]
    Timeout { what: &'static str, seconds: u64 },
}

impl From<LedgerError> for StepError {
    fn from(source: LedgerError) -> Self {
        Self::Ledger { source }
    }
}

impl From<TransactionError> for StepError {
    fn from(source: TransactionError) -> Self {
        Self::Transaction { source }
    }
}

impl From<KeyError> for StepError {
    fn from(source: KeyError) -> Self {
        Self::Key { source }
    }
}

pub type StepResult = Result<(), StepError>;

/// Per-scenario state. The client is created on first use; with the local
/// backend that means every scenario starts from a fresh genesis.
#[derive(World, Debug, Default)]
pub struct LedgerWorld {
    pub backend: Option<LedgerNetwork>,
    client: Option<Arc<dyn LedgerClient>>,
    fixture: Option<LedgerFixtureConfig>,
    fixture_accounts: Vec<Account>,
    accounts: BTreeMap<AccountSlot, Account>,
    pub threshold_key: Option<KeyList>,
    pub topic_id: Option<TopicId>,
    pub token_id: Option<TokenId>,
    pub pending_transfer: Option<Transaction>,
    pub last_receipt: Option<TransactionReceipt>,
    hbar_snapshots: BTreeMap<AccountSlot, Hbar>,
}

impl LedgerWorld {
    pub fn set_backend(&mut self, backend: LedgerNetwork) -> StepResult {
        if self.client.is_some() && self.backend != Some(backend) {
            return Err(StepError::InvalidArgument {
                message: format!("backend is already connected; cannot switch to {backend}"),
            });
        }
        self.backend = Some(backend);
        Ok(())
    }

    /// Uses an already-loaded fixture instead of `LEDGER_ACCOUNTS_FILE`.
    pub fn set_fixture(&mut self, fixture: LedgerFixtureConfig) -> StepResult {
        validate_fixture(&fixture).map_err(|source| StepError::Fixture { source })?;
        self.fixture_accounts =
            accounts_from_fixture(&fixture).map_err(|source| StepError::Account { source })?;
        self.fixture = Some(fixture);
        Ok(())
    }

    fn ensure_fixture(&mut self) -> StepResult {
        if self.fixture.is_none() {
            let fixture =
                LedgerFixtureConfig::from_env().map_err(|source| StepError::Fixture { source })?;
            self.set_fixture(fixture)?;
        }
        Ok(())
    }

    fn resolve_backend(&self) -> Result<LedgerNetwork, StepError> {
        if let Some(backend) = self.backend {
            return Ok(backend);
        }
        if let Some(raw) = tf_env::ledger_backend() {
            return parse_backend(&raw);
        }
        Ok(self
            .fixture
            .as_ref()
            .and_then(|fixture| fixture.network)
            .unwrap_or_default())
    }

    /// The scenario's ledger client, connecting on first use.
    pub fn client(&mut self) -> Result<Arc<dyn LedgerClient>, StepError> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }

        self.ensure_fixture()?;
        let backend = self.resolve_backend()?;
        let client: Arc<dyn LedgerClient> = match backend {
            LedgerNetwork::Local => {
                let fixture =
                    self.fixture
                        .as_ref()
                        .ok_or_else(|| StepError::InvalidArgument {
                            message: "account fixture is not loaded".to_owned(),
                        })?;
                Arc::new(LocalLedger::new(&self.fixture_accounts, fixture))
            }
            network => sdk_client(network)?,
        };

        debug!(backend = %backend, client = client.name(), "ledger client ready");
        self.backend = Some(backend);
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    pub fn fixture_account(&mut self, slot: AccountSlot) -> Result<Account, StepError> {
        self.ensure_fixture()?;
        self.fixture_accounts
            .get(slot.index())
            .cloned()
            .ok_or(StepError::MissingFixtureAccount {
                slot,
                available: self.fixture_accounts.len(),
            })
    }

    pub fn account(&self, slot: AccountSlot) -> Result<&Account, StepError> {
        self.accounts
            .get(&slot)
            .ok_or(StepError::MissingAccount { slot })
    }

    /// The scenario account in `slot`, or the fixture's account at that
    /// position when the scenario has not introduced one.
    pub fn account_or_fixture(&mut self, slot: AccountSlot) -> Result<Account, StepError> {
        match self.accounts.get(&slot) {
            Some(account) => Ok(account.clone()),
            None => self.fixture_account(slot),
        }
    }

    /// Records the fixture account for `slot` and its current hbar balance.
    pub async fn introduce_account(&mut self, slot: AccountSlot) -> Result<Account, StepError> {
        let account = self.fixture_account(slot)?;
        let client = self.client()?;
        let balance = client.account_balance(account.id).await?;

        info!(%slot, account = %account.id, hbars = %balance.hbars, "account introduced");
        self.hbar_snapshots.insert(slot, balance.hbars);
        self.accounts.insert(slot, account.clone());
        Ok(account)
    }

    pub async fn use_as_operator(&mut self, slot: AccountSlot) -> Result<Account, StepError> {
        let account = self.introduce_account(slot).await?;
        self.client()?.set_operator(account.operator());
        Ok(account)
    }

    /// Makes the first account the operator unless one is already set.
    pub fn ensure_operator(&mut self) -> Result<Arc<dyn LedgerClient>, StepError> {
        let client = self.client()?;
        if client.operator().is_none() {
            let first = self.account_or_fixture(AccountSlot::First)?;
            debug!(account = %first.id, "defaulting operator to the first account");
            client.set_operator(first.operator());
        }
        Ok(client)
    }

    pub fn topic_id(&self) -> Result<TopicId, StepError> {
        self.topic_id.ok_or(StepError::MissingTopic)
    }

    pub fn token_id(&self) -> Result<TokenId, StepError> {
        self.token_id.ok_or(StepError::MissingToken)
    }

    pub fn threshold_key(&self) -> Result<KeyList, StepError> {
        self.threshold_key
            .clone()
            .ok_or(StepError::MissingThresholdKey)
    }

    pub async fn balance(&mut self, slot: AccountSlot) -> Result<AccountBalance, StepError> {
        let account_id = self.account(slot)?.id;
        Ok(self.client()?.account_balance(account_id).await?)
    }

    pub async fn assert_hbars_above(&mut self, slot: AccountSlot, hbars: u64) -> StepResult {
        let actual = self.balance(slot).await?.hbars;
        let floor = Hbar::from_hbars(hbars);
        if actual > floor {
            Ok(())
        } else {
            Err(StepError::Assertion {
                what: format!("hbar balance of the {slot} account"),
                expected: format!("more than {floor}"),
                actual: actual.to_string(),
            })
        }
    }

    pub async fn assert_hbars_at_least(&mut self, slot: AccountSlot, hbars: u64) -> StepResult {
        let actual = self.balance(slot).await?.hbars;
        let floor = Hbar::from_hbars(hbars);
        if actual >= floor {
            Ok(())
        } else {
            Err(StepError::Assertion {
                what: format!("hbar balance of the {slot} account"),
                expected: format!("at least {floor}"),
                actual: actual.to_string(),
            })
        }
    }

    /// Re-records the hbar balance of every introduced account.
    pub async fn snapshot_hbars(&mut self) -> StepResult {
        let client = self.client()?;
        for (slot, account) in &self.accounts {
            let balance = client.account_balance(account.id).await?;
            self.hbar_snapshots.insert(*slot, balance.hbars);
        }
        Ok(())
    }

    pub async fn assert_paid_fee(&mut self, slot: AccountSlot) -> StepResult {
        let before = *self
            .hbar_snapshots
            .get(&slot)
            .ok_or(StepError::MissingSnapshot { slot })?;
        let after = self.balance(slot).await?.hbars;
        if after < before {
            debug!(%slot, fee = %(before - after), "fee charged");
            Ok(())
        } else {
            Err(StepError::Assertion {
                what: format!("hbar balance of the {slot} account after paying a fee"),
                expected: format!("less than {before}"),
                actual: after.to_string(),
            })
        }
    }

    pub async fn token_balance(&mut self, slot: AccountSlot) -> Result<u64, StepError> {
        let token_id = self.token_id()?;
        Ok(self.balance(slot).await?.token(&token_id))
    }

    pub async fn assert_token_balance(&mut self, slot: AccountSlot, expected: u64) -> StepResult {
        let actual = self.token_balance(slot).await?;
        expect_eq(format!("{TOKEN_SYMBOL} balance of the {slot} account"), expected, actual)
    }

    /// Freezes `transaction` against the scenario client and signs it with
    /// each of `keys`, without submitting it.
    pub fn prepare(
        &mut self,
        transaction: Transaction,
        keys: &[&PrivateKey],
    ) -> Result<Transaction, StepError> {
        let client = self.ensure_operator()?;
        let mut transaction = transaction.freeze_with(client.as_ref())?;
        for key in keys {
            transaction = transaction.sign(key)?;
        }
        Ok(transaction)
    }

    /// Submits and records the receipt.
    pub async fn submit(&mut self, transaction: Transaction) -> Result<TransactionReceipt, StepError> {
        let client = self.ensure_operator()?;
        let receipt = client.execute(transaction).await?;
        self.last_receipt = Some(receipt.clone());
        Ok(receipt)
    }

    pub async fn sign_and_submit(
        &mut self,
        transaction: Transaction,
        keys: &[&PrivateKey],
    ) -> Result<TransactionReceipt, StepError> {
        let transaction = self.prepare(transaction, keys)?;
        self.submit(transaction).await
    }

    /// Creates the scenario token with the first account as treasury.
    pub async fn create_token(
        &mut self,
        initial_supply: u64,
        with_supply_key: bool,
    ) -> Result<TokenId, StepError> {
        let treasury = self.account_or_fixture(AccountSlot::First)?;
        let mut body = TokenCreate::new(TOKEN_NAME, TOKEN_SYMBOL, treasury.id)
            .decimals(TOKEN_DECIMALS)
            .initial_supply(initial_supply);
        if with_supply_key {
            body = body.supply_key(treasury.public_key());
        }

        let receipt = self
            .sign_and_submit(Transaction::new(body), &[&treasury.private_key])
            .await?;
        let token_id = receipt.token_id.ok_or_else(|| StepError::Assertion {
            what: "token create receipt".to_owned(),
            expected: "a token id".to_owned(),
            actual: "none".to_owned(),
        })?;

        info!(%token_id, initial_supply, with_supply_key, "token created");
        self.token_id = Some(token_id);
        Ok(token_id)
    }

    /// Mints `amount` of the scenario token, signed by the treasury.
    pub async fn mint(&mut self, amount: u64) -> Result<TransactionReceipt, StepError> {
        let token_id = self.token_id()?;
        let treasury = self.account_or_fixture(AccountSlot::First)?;
        self.sign_and_submit(
            Transaction::new(TokenMint { token_id, amount }),
            &[&treasury.private_key],
        )
        .await
    }

    fn signer_for(&mut self, account_id: AccountId) -> Result<Account, StepError> {
        self.ensure_fixture()?;
        self.accounts
            .values()
            .chain(&self.fixture_accounts)
            .find(|account| account.id == account_id)
            .cloned()
            .ok_or(StepError::MissingSigner { account_id })
    }

    /// Moves scenario tokens between the token treasury and `slot` until
    /// the account holds exactly `target`. Other accounts are always left
    /// associated with the token.
    pub async fn arrange_token_balance(&mut self, slot: AccountSlot, target: u64) -> StepResult {
        let token_id = self.token_id()?;
        let account = self.account(slot)?.clone();
        let client = self.ensure_operator()?;
        let info = client.token_info(token_id).await?;
        let treasury = self.signer_for(info.treasury_account_id)?;
        let balance = client.account_balance(account.id).await?;
        let current = balance.token(&token_id);

        if account.id == treasury.id {
            if current == target {
                return Ok(());
            }
            if current < target && info.has_supply_key {
                self.mint(target - current).await?;
                return Ok(());
            }
            return Err(StepError::InvalidArgument {
                message: format!(
                    "the {slot} account is the token treasury and holds {current} {TOKEN_SYMBOL}; \
                     it cannot be brought to {target}"
                ),
            });
        }

        if !balance.is_associated(&token_id) {
            self.sign_and_submit(
                Transaction::new(TokenAssociate {
                    account_id: account.id,
                    token_ids: vec![token_id],
                }),
                &[&account.private_key],
            )
            .await?;
        }
        if current == target {
            return Ok(());
        }

        let (from, to, amount) = if current < target {
            // Mintable tokens fund the account with fresh supply so the
            // treasury keeps whatever balance it was arranged to hold.
            let missing = target - current;
            if info.has_supply_key {
                self.mint(missing).await?;
            } else {
                let available = client.account_balance(treasury.id).await?.token(&token_id);
                if available < missing {
                    return Err(StepError::InvalidArgument {
                        message: format!(
                            "treasury holds {available} {TOKEN_SYMBOL}, {missing} needed, and the token cannot be minted"
                        ),
                    });
                }
            }
            (&treasury, &account, missing)
        } else {
            (&account, &treasury, current - target)
        };

        let amount = signed_amount(amount)?;
        let transfer = Transfer::new()
            .token_transfer(token_id, from.id, -amount)
            .token_transfer(token_id, to.id, amount);
        self.sign_and_submit(Transaction::new(transfer), &[&from.private_key])
            .await?;

        debug!(%slot, account = %account.id, target, "token balance arranged");
        Ok(())
    }
}

/// Process-wide clients, one per network, so scenarios share connection
/// pools without ever crossing networks.
#[cfg_attr(not(feature = "hedera"), allow(dead_code))]
struct NetworkClients<T> {
    clients: Mutex<HashMap<LedgerNetwork, Arc<T>>>,
}

#[cfg_attr(not(feature = "hedera"), allow(dead_code))]
impl<T> NetworkClients<T> {
    fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn get_or_connect<E>(
        &self,
        network: LedgerNetwork,
        connect: impl FnOnce(LedgerNetwork) -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(&network) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(connect(network)?);
        clients.insert(network, Arc::clone(&client));
        Ok(client)
    }
}

#[cfg(feature = "hedera")]
fn sdk_client(network: LedgerNetwork) -> Result<Arc<dyn LedgerClient>, StepError> {
    use std::sync::LazyLock;

    use ledger_testing_core::HederaLedger;

    static SDK_CLIENTS: LazyLock<NetworkClients<HederaLedger>> = LazyLock::new(NetworkClients::new);

    let client = SDK_CLIENTS.get_or_connect(network, HederaLedger::for_network)?;
    Ok(client as Arc<dyn LedgerClient>)
}

#[cfg(not(feature = "hedera"))]
fn sdk_client(network: LedgerNetwork) -> Result<Arc<dyn LedgerClient>, StepError> {
    Err(StepError::BackendUnavailable { backend: network })
}

pub fn parse_backend(value: &str) -> Result<LedgerNetwork, StepError> {
    value
        .parse()
        .map_err(|_: FixtureError| StepError::UnsupportedBackend {
            value: value.trim().to_owned(),
        })
}

pub fn signed_amount(amount: u64) -> Result<i64, StepError> {
    i64::try_from(amount).map_err(|_| StepError::InvalidArgument {
        message: format!("token amount {amount} is too large"),
    })
}

pub fn expect_eq<T>(what: impl Into<String>, expected: T, actual: T) -> StepResult
where
    T: PartialEq + fmt::Display,
{
    if expected == actual {
        Ok(())
    } else {
        Err(StepError::Assertion {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}
