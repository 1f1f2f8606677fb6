use std::{collections::HashSet, fmt, str::FromStr};

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::Serialize;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// DER header of a PKCS#8 ED25519 private key; the 32 key bytes follow.
const ED25519_PRIVATE_DER_PREFIX: &str = "302e020100300506032b657004220420";

/// DER header of an SPKI ED25519 public key; the 32 key bytes follow.
const ED25519_PUBLIC_DER_PREFIX: &str = "302a300506032b6570032100";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key is not valid hex: {message}")]
    Hex { message: String },
    #[error("expected 32 key bytes, got {len}")]
    Length { len: usize },
    #[error("bytes are not a valid ED25519 public key")]
    InvalidPublicKey,
    #[error("threshold {threshold} is out of range for a list of {keys} keys")]
    Threshold { threshold: u32, keys: usize },
}

fn decode_key_hex(raw: &str, der_prefix: &str) -> Result<[u8; 32], KeyError> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    let raw = raw
        .strip_prefix(der_prefix)
        .or_else(|| raw.strip_prefix(&der_prefix.to_ascii_uppercase()))
        .unwrap_or(raw);

    let bytes = hex::decode(raw).map_err(|err| KeyError::Hex {
        message: err.to_string(),
    })?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| KeyError::Length { len })
}

/// ED25519 signing key of an account.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            inner: SigningKey::from_bytes(bytes),
        }
    }

    /// Accepts raw hex (optionally `0x`-prefixed) or DER-encoded hex.
    pub fn from_str_ed25519(raw: &str) -> Result<Self, KeyError> {
        decode_key_hex(raw, ED25519_PRIVATE_DER_PREFIX).map(|bytes| Self::from_bytes(&bytes))
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.inner.verifying_key().to_bytes(),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.inner.sign(message).to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ED25519_PRIVATE_DER_PREFIX}{}",
            hex::encode(self.to_bytes())
        )
    }
}

impl FromStr for PrivateKey {
    type Err = KeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::from_str_ed25519(raw)
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for PrivateKey {}

/// ED25519 verifying key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes: *bytes })
    }

    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 32] {
        self.bytes
    }

    /// Strict ED25519 verification of `signature` over `message`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        key.verify_strict(message, &Signature::from_bytes(&signature.0))
            .is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ED25519_PUBLIC_DER_PREFIX}{}", hex::encode(self.bytes))
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        decode_key_hex(raw, ED25519_PUBLIC_DER_PREFIX).and_then(|bytes| Self::from_bytes(&bytes))
    }
}

/// Raw 64-byte ED25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; 64]);

impl fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({})", hex::encode(self.0))
    }
}

/// Key structure guarding an account, topic or token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Single(PublicKey),
    List(KeyList),
}

/// `threshold` of `keys` must sign; `None` means all of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyList {
    pub keys: Vec<Key>,
    pub threshold: Option<u32>,
}

impl KeyList {
    pub fn threshold(keys: Vec<Key>, threshold: u32) -> Result<Self, KeyError> {
        if threshold == 0 || threshold as usize > keys.len() {
            return Err(KeyError::Threshold {
                threshold,
                keys: keys.len(),
            });
        }
        Ok(Self {
            keys,
            threshold: Some(threshold),
        })
    }

    #[must_use]
    pub fn required(&self) -> usize {
        self.threshold
            .map_or(self.keys.len(), |threshold| threshold as usize)
    }
}

impl Key {
    /// Whether signatures from `signers` meet this key's requirements.
    #[must_use]
    pub fn is_satisfied_by(&self, signers: &HashSet<PublicKey>) -> bool {
        match self {
            Self::Single(key) => signers.contains(key),
            Self::List(list) => {
                let satisfied = list
                    .keys
                    .iter()
                    .filter(|key| key.is_satisfied_by(signers))
                    .count();
                satisfied >= list.required()
            }
        }
    }
}

impl From<PublicKey> for Key {
    fn from(key: PublicKey) -> Self {
        Self::Single(key)
    }
}

impl From<KeyList> for Key {
    fn from(list: KeyList) -> Self {
        Self::List(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(seed: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[seed; 32])
    }

    #[test]
    fn parses_raw_and_der_private_keys() {
        let raw = "01".repeat(32);
        let from_raw = PrivateKey::from_str_ed25519(&raw).unwrap();
        let from_prefixed = PrivateKey::from_str_ed25519(&format!("0x{raw}")).unwrap();
        let from_der = PrivateKey::from_str_ed25519(&from_raw.to_string()).unwrap();

        assert_eq!(from_raw, key(1));
        assert_eq!(from_prefixed, from_raw);
        assert_eq!(from_der, from_raw);
        assert!(from_raw.to_string().starts_with(ED25519_PRIVATE_DER_PREFIX));
    }

    #[test]
    fn rejects_bad_key_material() {
        assert!(matches!(
            PrivateKey::from_str_ed25519("zz"),
            Err(KeyError::Hex { .. })
        ));
        assert!(matches!(
            PrivateKey::from_str_ed25519("0102"),
            Err(KeyError::Length { len: 2 })
        ));
    }

    #[test]
    fn public_key_round_trips_through_der() {
        let public = key(7).public_key();
        let parsed: PublicKey = public.to_string().parse().unwrap();
        assert_eq!(parsed, public);
    }

    #[test]
    fn signatures_verify_only_for_the_signed_message() {
        let signer = key(3);
        let signature = signer.sign(b"body");

        assert!(signer.public_key().verify(b"body", &signature));
        assert!(!signer.public_key().verify(b"other", &signature));
        assert!(!key(4).public_key().verify(b"body", &signature));
    }

    #[test]
    fn threshold_key_needs_enough_signers() {
        let (a, b) = (key(1).public_key(), key(2).public_key());
        let one_of_two: Key = KeyList::threshold(vec![a.into(), b.into()], 1)
            .unwrap()
            .into();
        let two_of_two: Key = KeyList::threshold(vec![a.into(), b.into()], 2)
            .unwrap()
            .into();

        let only_a: HashSet<_> = [a].into_iter().collect();
        let both: HashSet<_> = [a, b].into_iter().collect();

        assert!(one_of_two.is_satisfied_by(&only_a));
        assert!(!two_of_two.is_satisfied_by(&only_a));
        assert!(two_of_two.is_satisfied_by(&both));
        assert!(!one_of_two.is_satisfied_by(&HashSet::new()));
    }

    #[test]
    fn threshold_must_fit_the_list() {
        let keys = vec![Key::from(key(1).public_key())];
        assert!(KeyList::threshold(keys.clone(), 0).is_err());
        assert!(KeyList::threshold(keys.clone(), 2).is_err());
        assert!(KeyList::threshold(keys, 1).is_ok());
    }
}
