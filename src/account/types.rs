//! Account type definitions

use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::encoding;

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// 20-byte account identifier derived from the account's public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::Length(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must be 20 bytes, got {0}")]
    Length(usize),
    #[error("address is not valid hex")]
    Hex,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = encoding::decode_hex(s).map_err(|_| AddressError::Hex)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Externally visible account record. Key material never travels with it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    /// Informational locator, e.g. `keystore:///var/keys/UTC--...`
    pub url: String,
}

/// Unlocked key material, usable only by the signer.
///
/// Not serializable and redacted in `Debug`. The scalar is wiped when the
/// last clone is dropped.
#[derive(Clone)]
pub struct KeyHandle(Arc<SigningKey>);

impl KeyHandle {
    pub(crate) fn new(key: SigningKey) -> Self {
        Self(Arc::new(key))
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }

    /// Address controlled by this key
    pub fn address(&self) -> Address {
        crate::signer::address_of(self.0.verifying_key())
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHandle({}, <redacted>)", self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse_and_display() {
        let addr: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(addr.0[19], 0xff);
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ff");

        let bare: Address = "00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert_eq!("0x1234".parse::<Address>(), Err(AddressError::Length(2)));
        assert_eq!("0xzz".parse::<Address>(), Err(AddressError::Hex));
    }

    #[test]
    fn test_account_json_shape() {
        let account = Account {
            address: Address([0x11; ADDRESS_LEN]),
            url: "memory://test".to_string(),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["address"], "0x1111111111111111111111111111111111111111");
        assert_eq!(json["url"], "memory://test");
    }

    #[test]
    fn test_key_handle_debug_is_redacted() {
        let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
        let secret_hex = hex::encode(key.to_bytes());
        let handle = KeyHandle::new(key);
        let rendered = format!("{:?}", handle);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&secret_hex));
    }
}
