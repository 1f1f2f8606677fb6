use std::fmt;

use serde::Serialize;

/// Ledger response code. Renders in the ledger's SCREAMING_SNAKE form so
/// that error text can be matched against the codes the network reports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    Success,
    InvalidSignature,
    InsufficientPayerBalance,
    InsufficientTokenBalance,
    InvalidAccountId,
    InvalidTopicId,
    InvalidTokenId,
    InvalidTopicMessage,
    MessageSizeTooLarge,
    MemoTooLong,
    MissingTokenName,
    MissingTokenSymbol,
    InvalidTreasuryAccountForToken,
    TokenHasNoSupplyKey,
    InvalidTokenMintAmount,
    TokenNotAssociatedToAccount,
    TokenAlreadyAssociatedToAccount,
    TransfersNotZeroSumForToken,
    EmptyTokenTransferBody,
    DuplicateTransaction,
    PayerAccountNotFound,
    /// Any code this enum does not name, kept verbatim.
    Other(String),
}

impl Status {
    const NAMED: [Self; 21] = [
        Self::Success,
        Self::InvalidSignature,
        Self::InsufficientPayerBalance,
        Self::InsufficientTokenBalance,
        Self::InvalidAccountId,
        Self::InvalidTopicId,
        Self::InvalidTokenId,
        Self::InvalidTopicMessage,
        Self::MessageSizeTooLarge,
        Self::MemoTooLong,
        Self::MissingTokenName,
        Self::MissingTokenSymbol,
        Self::InvalidTreasuryAccountForToken,
        Self::TokenHasNoSupplyKey,
        Self::InvalidTokenMintAmount,
        Self::TokenNotAssociatedToAccount,
        Self::TokenAlreadyAssociatedToAccount,
        Self::TransfersNotZeroSumForToken,
        Self::EmptyTokenTransferBody,
        Self::DuplicateTransaction,
        Self::PayerAccountNotFound,
    ];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "SUCCESS",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::InsufficientPayerBalance => "INSUFFICIENT_PAYER_BALANCE",
            Self::InsufficientTokenBalance => "INSUFFICIENT_TOKEN_BALANCE",
            Self::InvalidAccountId => "INVALID_ACCOUNT_ID",
            Self::InvalidTopicId => "INVALID_TOPIC_ID",
            Self::InvalidTokenId => "INVALID_TOKEN_ID",
            Self::InvalidTopicMessage => "INVALID_TOPIC_MESSAGE",
            Self::MessageSizeTooLarge => "MESSAGE_SIZE_TOO_LARGE",
            Self::MemoTooLong => "MEMO_TOO_LONG",
            Self::MissingTokenName => "MISSING_TOKEN_NAME",
            Self::MissingTokenSymbol => "MISSING_TOKEN_SYMBOL",
            Self::InvalidTreasuryAccountForToken => "INVALID_TREASURY_ACCOUNT_FOR_TOKEN",
            Self::TokenHasNoSupplyKey => "TOKEN_HAS_NO_SUPPLY_KEY",
            Self::InvalidTokenMintAmount => "INVALID_TOKEN_MINT_AMOUNT",
            Self::TokenNotAssociatedToAccount => "TOKEN_NOT_ASSOCIATED_TO_ACCOUNT",
            Self::TokenAlreadyAssociatedToAccount => "TOKEN_ALREADY_ASSOCIATED_TO_ACCOUNT",
            Self::TransfersNotZeroSumForToken => "TRANSFERS_NOT_ZERO_SUM_FOR_TOKEN",
            Self::EmptyTokenTransferBody => "EMPTY_TOKEN_TRANSFER_BODY",
            Self::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            Self::PayerAccountNotFound => "PAYER_ACCOUNT_NOT_FOUND",
            Self::Other(name) => name,
        }
    }

    /// Maps a code name as SDKs report it, either `TOKEN_HAS_NO_SUPPLY_KEY`
    /// or `TokenHasNoSupplyKey`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let normalized = if name.contains('_') || name.chars().all(|c| !c.is_lowercase()) {
            name.to_ascii_uppercase()
        } else {
            camel_to_screaming_snake(name)
        };

        Self::NAMED
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .unwrap_or(Self::Other(normalized))
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }
}

fn camel_to_screaming_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 8);
    for (index, c) in name.chars().enumerate() {
        if c.is_uppercase() && index > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_sdk_code_names() {
        assert_eq!(
            Status::from_name("TokenHasNoSupplyKey"),
            Status::TokenHasNoSupplyKey
        );
        assert_eq!(
            Status::from_name("TOKEN_HAS_NO_SUPPLY_KEY"),
            Status::TokenHasNoSupplyKey
        );
        assert_eq!(Status::from_name("Success"), Status::Success);
        assert_eq!(
            Status::from_name("AccountDeleted"),
            Status::Other("ACCOUNT_DELETED".to_owned())
        );
    }

    #[test]
    fn renders_screaming_snake() {
        assert_eq!(Status::InvalidSignature.to_string(), "INVALID_SIGNATURE");
        assert!(Status::Success.is_success());
        assert!(!Status::InvalidSignature.is_success());
    }
}
