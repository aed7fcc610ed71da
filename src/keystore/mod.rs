//! Pluggable key storage backends
//!
//! A backend persists sealed key material and is the only place a passphrase
//! is checked. The custody core sees accounts and short-lived `KeyHandle`s,
//! never the sealed bytes.

pub mod file;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::account::auth::AuthError;
use crate::account::{Account, Address, KeyHandle};
use crate::config::{BackendKind, KeystoreConfig};

pub use file::FileKeystore;
pub use memory::MemoryKeystore;

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("account not found: {0}")]
    NotFound(Address),
    #[error("invalid passphrase")]
    InvalidPassphrase,
    #[error("invalid account config: {0}")]
    InvalidConfig(String),
    #[error("account already exists: {0}")]
    AlreadyExists(Address),
    #[error("keystore unavailable: {0}")]
    Unavailable(String),
    #[error("keystore error: {0}")]
    Backend(String),
}

impl From<AuthError> for KeystoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidPassphrase => KeystoreError::InvalidPassphrase,
            other => KeystoreError::Backend(other.to_string()),
        }
    }
}

/// Account-creation config understood by the built-in backends.
///
/// Wire form is the JSON object `{"passphrase": "..."}`.
#[derive(Deserialize)]
pub struct NewAccountConfig {
    pub passphrase: String,
}

impl NewAccountConfig {
    pub fn parse(raw: &[u8]) -> Result<Self, KeystoreError> {
        serde_json::from_slice(raw).map_err(|e| KeystoreError::InvalidConfig(e.to_string()))
    }
}

impl fmt::Debug for NewAccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccountConfig")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Storage backend capability used by the custody service
#[async_trait]
pub trait KeyBackend: Send + Sync {
    /// Short backend name for status and logs
    fn name(&self) -> &'static str;

    /// Acquire backend resources and list every stored account
    async fn open(&self) -> Result<Vec<Account>, KeystoreError>;

    /// Release whatever `open` acquired. Must be safe without a prior `open`.
    async fn close(&self);

    /// Verify `passphrase` for `address` and return usable key material
    async fn unlock(&self, address: &Address, passphrase: &str) -> Result<KeyHandle, KeystoreError>;

    /// Generate and store a fresh key; `config` is backend-defined
    async fn new_account(&self, config: &[u8]) -> Result<Account, KeystoreError>;

    /// Store an externally supplied key; `config` is backend-defined
    async fn import_raw_key(&self, key: KeyHandle, config: &[u8]) -> Result<Account, KeystoreError>;
}

/// Build the backend selected in the config
pub fn build_backend(config: &KeystoreConfig) -> Arc<dyn KeyBackend> {
    match config.backend {
        BackendKind::File => Arc::new(FileKeystore::new(config.path.clone(), config.kdf.clone())),
        BackendKind::Memory => Arc::new(MemoryKeystore::new(config.kdf.clone())),
    }
}
