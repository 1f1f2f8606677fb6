//! Ledger entities, keys and records as the steps see them, independent of
//! the backend serving them.

mod hbar;
mod ids;
mod keys;
mod records;
mod status;
mod transaction;

pub use hbar::{Hbar, TINYBARS_PER_HBAR};
pub use ids::{AccountId, EntityIdError, EntityNum, TokenId, TopicId, TransactionId};
pub use keys::{Key, KeyError, KeyList, PrivateKey, PublicKey, SignatureBytes};
pub use records::{AccountBalance, TokenInfo, TopicInfo, TopicMessage, TransactionReceipt};
pub use status::Status;
pub use transaction::{
    SignaturePair, TokenAssociate, TokenCreate, TokenMint, TokenTransfer, TopicCreate,
    TopicMessageSubmit, Transaction, TransactionBody, TransactionError, Transfer,
};
