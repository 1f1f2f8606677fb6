//! [`LedgerClient`] backed by the Hedera SDK, for runs against a public
//! network. Only compiled with the `hedera` feature.

use std::{
    sync::RwLock,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use futures::StreamExt as _;
use ledger_testing_config::LedgerNetwork;
use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    client::{LedgerClient, LedgerError, Operator, TopicMessageQuery},
    ledger::{
        AccountBalance, AccountId, Hbar, Key, PrivateKey, PublicKey, Status, TokenId, TokenInfo,
        TopicId, TopicInfo, TopicMessage, Transaction, TransactionBody, TransactionId,
        TransactionReceipt,
    },
};

const BACKEND: &str = "hedera";

/// Shares one SDK client (and its connection pool) across all scenarios.
pub struct HederaLedger {
    client: hedera::Client,
    network: LedgerNetwork,
    operator: RwLock<Option<Operator>>,
}

impl std::fmt::Debug for HederaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HederaLedger")
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl HederaLedger {
    pub fn for_network(network: LedgerNetwork) -> Result<Self, LedgerError> {
        let client = match network {
            LedgerNetwork::Testnet => hedera::Client::for_testnet(),
            LedgerNetwork::Previewnet => hedera::Client::for_previewnet(),
            LedgerNetwork::Mainnet => hedera::Client::for_mainnet(),
            LedgerNetwork::Local => {
                return Err(backend_error(
                    "the local network is served in-process, not through the SDK",
                ));
            }
        };
        info!(network = %network, "hedera client created");

        Ok(Self {
            client,
            network,
            operator: RwLock::new(None),
        })
    }

    async fn submit(&self, transaction: &Transaction) -> Result<hedera::TransactionReceipt, LedgerError> {
        let transaction_id = transaction
            .transaction_id()
            .ok_or_else(|| backend_error("transaction reached the SDK unfrozen"))?;
        let sdk_id = sdk_transaction_id(transaction_id)?;
        let signers = transaction
            .signers()
            .iter()
            .map(sdk_private_key)
            .collect::<Result<Vec<_>, _>>()?;

        // The SDK builders share no public trait, so each body is driven
        // through the same steps by this macro.
        macro_rules! run {
            ($builder:expr) => {{
                let mut sdk = $builder;
                sdk.transaction_id(sdk_id);
                sdk.freeze_with(&self.client)
                    .map_err(|err| sdk_error(err, transaction_id))?;
                for key in &signers {
                    sdk.sign(key.clone());
                }
                let response = sdk
                    .execute(&self.client)
                    .await
                    .map_err(|err| sdk_error(err, transaction_id))?;
                response
                    .get_receipt(&self.client)
                    .await
                    .map_err(|err| sdk_error(err, transaction_id))?
            }};
        }

        let receipt = match transaction.body() {
            TransactionBody::TopicCreate(body) => {
                let mut sdk = hedera::TopicCreateTransaction::new();
                sdk.topic_memo(body.memo.clone());
                if let Some(key) = &body.submit_key {
                    sdk.submit_key(sdk_key(key)?);
                }
                run!(sdk)
            }
            TransactionBody::TopicMessageSubmit(body) => {
                let mut sdk = hedera::TopicMessageSubmitTransaction::new();
                sdk.topic_id(sdk_id_of::<hedera::TopicId>(&body.topic_id)?)
                    .message(body.message.clone());
                run!(sdk)
            }
            TransactionBody::TokenCreate(body) => {
                let mut sdk = hedera::TokenCreateTransaction::new();
                sdk.name(body.name.clone())
                    .symbol(body.symbol.clone())
                    .decimals(body.decimals)
                    .initial_supply(body.initial_supply)
                    .treasury_account_id(sdk_id_of::<hedera::AccountId>(&body.treasury_account_id)?);
                if let Some(key) = &body.supply_key {
                    sdk.supply_key(sdk_key(key)?);
                }
                run!(sdk)
            }
            TransactionBody::TokenMint(body) => {
                let mut sdk = hedera::TokenMintTransaction::new();
                sdk.token_id(sdk_id_of::<hedera::TokenId>(&body.token_id)?)
                    .amount(body.amount);
                run!(sdk)
            }
            TransactionBody::TokenAssociate(body) => {
                let token_ids = body
                    .token_ids
                    .iter()
                    .map(sdk_id_of::<hedera::TokenId>)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut sdk = hedera::TokenAssociateTransaction::new();
                sdk.account_id(sdk_id_of::<hedera::AccountId>(&body.account_id)?)
                    .token_ids(token_ids);
                run!(sdk)
            }
            TransactionBody::Transfer(body) => {
                let mut sdk = hedera::TransferTransaction::new();
                for entry in &body.token_transfers {
                    sdk.token_transfer(
                        sdk_id_of::<hedera::TokenId>(&entry.token_id)?,
                        sdk_id_of::<hedera::AccountId>(&entry.account_id)?,
                        entry.amount,
                    );
                }
                run!(sdk)
            }
        };

        Ok(receipt)
    }
}

fn backend_error(message: impl Into<String>) -> LedgerError {
    LedgerError::Backend {
        backend: BACKEND,
        message: message.into(),
    }
}

fn sdk_status(status: hedera::Status) -> Status {
    Status::from_name(&format!("{status:?}"))
}

fn sdk_error(err: hedera::Error, transaction_id: TransactionId) -> LedgerError {
    match err {
        hedera::Error::ReceiptStatus { status, .. } => LedgerError::ReceiptStatus {
            status: sdk_status(status),
            transaction_id,
        },
        hedera::Error::TransactionPreCheckStatus { status, .. } => LedgerError::PreCheck {
            status: sdk_status(status),
            transaction_id,
        },
        other => backend_error(other.to_string()),
    }
}

fn query_error(err: hedera::Error) -> LedgerError {
    match err {
        hedera::Error::QueryPreCheckStatus { status, .. }
        | hedera::Error::QueryNoPaymentPreCheckStatus { status, .. } => LedgerError::QueryStatus {
            status: sdk_status(status),
        },
        other => backend_error(other.to_string()),
    }
}

/// Entity ids share the `shard.realm.num` text form on both sides.
fn sdk_id_of<T>(id: &impl ToString) -> Result<T, LedgerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let text = id.to_string();
    text.parse()
        .map_err(|err| backend_error(format!("SDK rejected id `{text}`: {err}")))
}

fn from_sdk_id<T>(id: &impl ToString) -> Result<T, LedgerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let text = id.to_string();
    text.parse()
        .map_err(|err| backend_error(format!("SDK returned unexpected id `{text}`: {err}")))
}

fn sdk_transaction_id(id: TransactionId) -> Result<hedera::TransactionId, LedgerError> {
    let nanos = i128::try_from(id.valid_start.as_nanos())
        .map_err(|_| backend_error("transaction valid start out of range"))?;
    let valid_start = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|err| backend_error(err.to_string()))?;
    Ok(hedera::TransactionId {
        account_id: sdk_id_of(&id.account_id)?,
        valid_start,
        nonce: None,
        scheduled: false,
    })
}

fn sdk_private_key(key: &PrivateKey) -> Result<hedera::PrivateKey, LedgerError> {
    hedera::PrivateKey::from_bytes_ed25519(&key.to_bytes())
        .map_err(|err| backend_error(err.to_string()))
}

fn sdk_public_key(key: &PublicKey) -> Result<hedera::PublicKey, LedgerError> {
    hedera::PublicKey::from_bytes_ed25519(&key.to_bytes())
        .map_err(|err| backend_error(err.to_string()))
}

fn sdk_key(key: &Key) -> Result<hedera::Key, LedgerError> {
    match key {
        Key::Single(public_key) => Ok(hedera::Key::Single(sdk_public_key(public_key)?)),
        Key::List(list) => {
            let keys = list.keys.iter().map(sdk_key).collect::<Result<Vec<_>, _>>()?;
            Ok(hedera::Key::KeyList(hedera::KeyList {
                keys,
                threshold: list.threshold,
            }))
        }
    }
}

fn into_receipt(
    transaction_id: TransactionId,
    receipt: hedera::TransactionReceipt,
) -> Result<TransactionReceipt, LedgerError> {
    receipt_from_parts(
        transaction_id,
        receipt.status,
        receipt.topic_id.as_ref(),
        receipt.token_id.as_ref(),
        receipt.topic_sequence_number,
        receipt.total_supply,
    )
}

/// A zero sequence number means the receipt is not for a topic message.
fn receipt_from_parts(
    transaction_id: TransactionId,
    status: hedera::Status,
    topic_id: Option<&hedera::TopicId>,
    token_id: Option<&hedera::TokenId>,
    topic_sequence_number: u64,
    total_supply: u64,
) -> Result<TransactionReceipt, LedgerError> {
    let mut converted = TransactionReceipt::new(transaction_id, sdk_status(status));
    converted.topic_id = topic_id.map(from_sdk_id).transpose()?;
    converted.token_id = token_id.map(from_sdk_id).transpose()?;
    converted.topic_sequence_number = (topic_sequence_number > 0).then_some(topic_sequence_number);
    converted.total_supply = Some(total_supply);
    Ok(converted)
}

#[async_trait]
impl LedgerClient for HederaLedger {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn set_operator(&self, operator: Operator) {
        match (
            sdk_id_of::<hedera::AccountId>(&operator.account_id),
            sdk_private_key(&operator.private_key),
        ) {
            (Ok(account_id), Ok(private_key)) => {
                self.client.set_operator(account_id, private_key);
                debug!(account = %operator.account_id, "hedera operator set");
            }
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "operator could not be handed to the SDK");
            }
        }
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
        let balance = hedera::AccountBalanceQuery::new()
            .account_id(sdk_id_of::<hedera::AccountId>(&account_id)?)
            .execute(&self.client)
            .await
            .map_err(query_error)?;

        #[allow(deprecated)]
        let tokens = balance
            .tokens
            .iter()
            .map(|(token_id, amount)| Ok((from_sdk_id(token_id)?, *amount)))
            .collect::<Result<_, LedgerError>>()?;

        Ok(AccountBalance {
            account_id,
            hbars: Hbar::from_tinybars(balance.hbars.to_tinybars()),
            tokens,
        })
    }

    async fn topic_info(&self, topic_id: TopicId) -> Result<TopicInfo, LedgerError> {
        let info = hedera::TopicInfoQuery::new()
            .topic_id(sdk_id_of::<hedera::TopicId>(&topic_id)?)
            .execute(&self.client)
            .await
            .map_err(query_error)?;

        Ok(TopicInfo {
            topic_id,
            memo: info.topic_memo,
            sequence_number: info.sequence_number,
            has_submit_key: info.submit_key.is_some(),
        })
    }

    async fn token_info(&self, token_id: TokenId) -> Result<TokenInfo, LedgerError> {
        let info = hedera::TokenInfoQuery::new()
            .token_id(sdk_id_of::<hedera::TokenId>(&token_id)?)
            .execute(&self.client)
            .await
            .map_err(query_error)?;

        Ok(TokenInfo {
            token_id,
            name: info.name,
            symbol: info.symbol,
            decimals: info.decimals,
            total_supply: info.total_supply,
            treasury_account_id: from_sdk_id(&info.treasury_account_id)?,
            has_supply_key: info.supply_key.is_some(),
        })
    }

    async fn topic_messages(
        &self,
        query: TopicMessageQuery,
    ) -> Result<Vec<TopicMessage>, LedgerError> {
        let deadline = Instant::now() + query.timeout;
        let mut stream = hedera::TopicMessageQuery::new()
            .topic_id(sdk_id_of::<hedera::TopicId>(&query.topic_id)?)
            .start_time(OffsetDateTime::UNIX_EPOCH)
            .subscribe(&self.client);

        let mut messages = Vec::with_capacity(query.limit);
        while messages.len() < query.limit {
            let Ok(next) = tokio::time::timeout_at(deadline, stream.next()).await else {
                debug!(topic = %query.topic_id, received = messages.len(), "subscription timed out");
                break;
            };
            let Some(message) = next else { break };
            let message = message.map_err(query_error)?;
            messages.push(TopicMessage {
                topic_id: query.topic_id,
                sequence_number: message.sequence_number,
                consensus_timestamp: sdk_timestamp(message.consensus_timestamp),
                contents: message.contents,
            });
        }

        Ok(messages)
    }

    async fn execute(&self, transaction: Transaction) -> Result<TransactionReceipt, LedgerError> {
        let operator = self.operator();
        let mut transaction = transaction.freeze(operator.as_ref().map(|op| op.account_id))?;
        if let Some(operator) = &operator {
            transaction = transaction.sign(&operator.private_key)?;
        }
        let transaction_id = transaction
            .transaction_id()
            .ok_or_else(|| backend_error("frozen transaction lost its id"))?;

        let receipt = into_receipt(transaction_id, self.submit(&transaction).await?)?;
        if !receipt.status.is_success() {
            return Err(LedgerError::ReceiptStatus {
                status: receipt.status,
                transaction_id,
            });
        }

        info!(
            %transaction_id,
            kind = transaction.body().kind(),
            status = %receipt.status,
            "transaction reached consensus"
        );
        Ok(receipt)
    }
}

fn sdk_timestamp(timestamp: OffsetDateTime) -> SystemTime {
    let nanos = timestamp.unix_timestamp_nanos();
    u64::try_from(nanos)
        .map(|nanos| SystemTime::UNIX_EPOCH + Duration::from_nanos(nanos))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use crate::ledger::KeyList;

    use super::*;

    fn transaction_id() -> TransactionId {
        TransactionId {
            account_id: AccountId::new(0, 0, 1001),
            valid_start: Duration::new(1_700_000_000, 5),
        }
    }

    #[test]
    fn status_names_map_to_ledger_codes() {
        assert_eq!(sdk_status(hedera::Status::Success), Status::Success);
        assert_eq!(
            sdk_status(hedera::Status::TokenHasNoSupplyKey),
            Status::TokenHasNoSupplyKey
        );
        assert_eq!(
            sdk_status(hedera::Status::InsufficientPayerBalance),
            Status::InsufficientPayerBalance
        );
        assert_eq!(
            sdk_status(hedera::Status::InvalidNodeAccount),
            Status::Other("INVALID_NODE_ACCOUNT".to_owned())
        );
    }

    #[test]
    fn transaction_ids_keep_payer_and_valid_start() {
        let sdk = sdk_transaction_id(transaction_id()).unwrap();
        assert_eq!(sdk.account_id.to_string(), "0.0.1001");
        assert_eq!(sdk.valid_start.unix_timestamp_nanos(), 1_700_000_000_000_000_005);
        assert_eq!(sdk.nonce, None);
        assert!(!sdk.scheduled);
    }

    #[test]
    fn threshold_keys_keep_their_threshold() {
        let first = PrivateKey::from_bytes(&[1; 32]).public_key();
        let second = PrivateKey::from_bytes(&[2; 32]).public_key();
        let key: Key = KeyList::threshold(vec![first.into(), second.into()], 1)
            .unwrap()
            .into();

        let hedera::Key::KeyList(list) = sdk_key(&key).unwrap() else {
            panic!("threshold key became a single key");
        };
        assert_eq!(list.threshold, Some(1));
        assert_eq!(list.keys.len(), 2);
        let hedera::Key::Single(sdk_first) = &list.keys[0] else {
            panic!("nested key is not a single key");
        };
        assert_eq!(sdk_first.to_bytes_raw(), first.to_bytes().to_vec());
    }

    #[test]
    fn private_keys_survive_the_sdk_round_trip() {
        let key = PrivateKey::from_bytes(&[7; 32]);
        let sdk = sdk_private_key(&key).unwrap();
        assert_eq!(sdk.public_key().to_bytes_raw(), key.public_key().to_bytes().to_vec());
    }

    #[test]
    fn receipts_carry_created_entities() {
        let topic: hedera::TopicId = "0.0.42".parse().unwrap();
        let receipt = receipt_from_parts(
            transaction_id(),
            hedera::Status::Success,
            Some(&topic),
            None,
            0,
            0,
        )
        .unwrap();
        assert_eq!(receipt.status, Status::Success);
        assert_eq!(receipt.topic_id, Some(TopicId::new(0, 0, 42)));
        assert_eq!(receipt.token_id, None);
        assert_eq!(receipt.topic_sequence_number, None);

        let token: hedera::TokenId = "0.0.77".parse().unwrap();
        let receipt = receipt_from_parts(
            transaction_id(),
            hedera::Status::Success,
            None,
            Some(&token),
            3,
            1_100,
        )
        .unwrap();
        assert_eq!(receipt.token_id, Some(TokenId::new(0, 0, 77)));
        assert_eq!(receipt.topic_sequence_number, Some(3));
        assert_eq!(receipt.total_supply, Some(1_100));
    }
}
