//! secp256k1 signing for custody accounts
//!
//! The payload is treated as opaque bytes: it is hashed with Keccak-256 and the
//! digest is signed with a recoverable, low-S ECDSA signature. Signatures are
//! laid out `R (32) || S (32) || V (1)` with `V` the recovery id (0 or 1).

use std::fmt;

use alloy_primitives::keccak256;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::account::{Address, KeyHandle};
use crate::encoding;

pub const SIGNATURE_LEN: usize = 65;
const RAW_KEY_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature does not recover to a public key")]
    Recovery,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RawKeyError {
    #[error("raw key must be 64 hex characters, got {0}")]
    Length(usize),
    #[error("raw key is not valid hex")]
    Hex,
    #[error("raw key is not a valid secp256k1 scalar")]
    Scalar,
}

/// 65-byte recoverable signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignerError> {
        let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| SignerError::MalformedSignature)?;
        Ok(Self(array))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Recover the address that produced this signature over `payload`
    pub fn recover_address(&self, payload: &[u8]) -> Result<Address, SignerError> {
        let signature = EcdsaSignature::from_slice(&self.0[..64]).map_err(|_| SignerError::MalformedSignature)?;
        let recovery_id = RecoveryId::from_byte(self.v()).ok_or(SignerError::MalformedSignature)?;
        let digest = keccak256(payload);
        let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id)
            .map_err(|_| SignerError::Recovery)?;
        Ok(address_of(&key))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", encoding::encode_hex(&self.0))
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encoding::encode_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = encoding::decode_hex(&s).map_err(serde::de::Error::custom)?;
        Signature::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Stateless signing capability. Holds nothing between calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct Signer;

impl Signer {
    pub fn sign(&self, key: &KeyHandle, payload: &[u8]) -> Result<Signature, SignerError> {
        let digest = keccak256(payload);
        let (signature, recovery_id) = key
            .signing_key()
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(Signature(out))
    }
}

/// `keccak256(uncompressed_pubkey[1..])[12..]`
pub fn address_of(key: &VerifyingKey) -> Address {
    let uncompressed = key.to_encoded_point(false);
    let hash = keccak256(&uncompressed.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}

/// Fresh random key
pub fn generate_key() -> KeyHandle {
    KeyHandle::new(SigningKey::random(&mut OsRng))
}

/// Parse a hex private key (optional `0x`, exactly 64 hex chars)
pub fn parse_raw_key(raw: &str) -> Result<KeyHandle, RawKeyError> {
    let digits = encoding::strip_0x(raw.trim());
    if digits.len() != RAW_KEY_HEX_LEN {
        return Err(RawKeyError::Length(digits.len()));
    }
    let bytes = Zeroizing::new(hex::decode(digits).map_err(|_| RawKeyError::Hex)?);
    SigningKey::from_slice(&bytes)
        .map(KeyHandle::new)
        .map_err(|_| RawKeyError::Scalar)
}

/// Raw scalar bytes for sealing. Only keystore backends call this.
pub(crate) fn secret_bytes(key: &KeyHandle) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(key.signing_key().to_bytes().to_vec())
}

/// Rebuild a key handle from an unsealed scalar
pub(crate) fn key_from_secret(bytes: &[u8]) -> Result<KeyHandle, RawKeyError> {
    SigningKey::from_slice(bytes)
        .map(KeyHandle::new)
        .map_err(|_| RawKeyError::Scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn test_address_known_vector() {
        let key = parse_raw_key(KEY_ONE).unwrap();
        let expected: Address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf".parse().unwrap();
        assert_eq!(key.address(), expected);
    }

    #[test]
    fn test_sign_layout_and_recovery() {
        let key = generate_key();
        let sig = Signer.sign(&key, b"msg").unwrap();

        assert_eq!(sig.to_bytes().len(), SIGNATURE_LEN);
        assert!(sig.v() <= 1);
        assert_eq!(sig.recover_address(b"msg").unwrap(), key.address());
        assert_ne!(sig.recover_address(b"other").ok(), Some(key.address()));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = parse_raw_key(KEY_ONE).unwrap();
        let a = Signer.sign(&key, b"payload").unwrap();
        let b = Signer.sign(&key, b"payload").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_payload_signs() {
        let key = generate_key();
        let sig = Signer.sign(&key, b"").unwrap();
        assert_eq!(sig.recover_address(b"").unwrap(), key.address());
    }

    #[test]
    fn test_parse_raw_key_errors() {
        assert_eq!(parse_raw_key("0x1234").unwrap_err(), RawKeyError::Length(4));
        let not_hex = format!("0x{}", "zz".repeat(32));
        assert_eq!(parse_raw_key(&not_hex).unwrap_err(), RawKeyError::Hex);
        let zero = format!("0x{}", "00".repeat(32));
        assert_eq!(parse_raw_key(&zero).unwrap_err(), RawKeyError::Scalar);
        let over_order = "f".repeat(64);
        assert_eq!(parse_raw_key(&over_order).unwrap_err(), RawKeyError::Scalar);
    }

    #[test]
    fn test_secret_round_trip() {
        let key = generate_key();
        let secret = secret_bytes(&key);
        let restored = key_from_secret(&secret).unwrap();
        assert_eq!(restored.address(), key.address());
    }

    #[test]
    fn test_signature_json() {
        let key = generate_key();
        let sig = Signer.sign(&key, b"json").unwrap();
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json.len(), 2 + 2 + 130);
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
        assert!(serde_json::from_str::<Signature>("\"0x1234\"").is_err());
    }
}
