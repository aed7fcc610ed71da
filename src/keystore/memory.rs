//! In-process keystore. Keys live for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{KeyBackend, KeystoreError, NewAccountConfig};
use crate::account::auth::{seal, unseal, KdfSettings, SealedKey};
use crate::account::{Account, Address, KeyHandle};
use crate::signer;

pub struct MemoryKeystore {
    kdf: KdfSettings,
    keys: RwLock<HashMap<Address, SealedKey>>,
}

impl MemoryKeystore {
    pub fn new(kdf: KdfSettings) -> Self {
        Self {
            kdf,
            keys: RwLock::new(HashMap::new()),
        }
    }

    fn account_for(address: Address) -> Account {
        Account {
            address,
            url: format!("memory://{}", address),
        }
    }

    async fn store(&self, key: KeyHandle, passphrase: String) -> Result<Account, KeystoreError> {
        let address = key.address();
        if self.keys.read().await.contains_key(&address) {
            return Err(KeystoreError::AlreadyExists(address));
        }

        let kdf = self.kdf.clone();
        let sealed = tokio::task::spawn_blocking(move || seal(&signer::secret_bytes(&key), &passphrase, &kdf))
            .await
            .map_err(|e| KeystoreError::Backend(format!("keystore task failed: {}", e)))??;

        let mut keys = self.keys.write().await;
        if keys.contains_key(&address) {
            return Err(KeystoreError::AlreadyExists(address));
        }
        keys.insert(address, sealed);
        info!("Stored key for {} in memory keystore", address);

        Ok(Self::account_for(address))
    }
}

#[async_trait]
impl KeyBackend for MemoryKeystore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self) -> Result<Vec<Account>, KeystoreError> {
        let keys = self.keys.read().await;
        Ok(keys.keys().copied().map(Self::account_for).collect())
    }

    async fn close(&self) {
        debug!("Memory keystore closed");
    }

    async fn unlock(&self, address: &Address, passphrase: &str) -> Result<KeyHandle, KeystoreError> {
        let sealed = {
            let keys = self.keys.read().await;
            keys.get(address).cloned().ok_or(KeystoreError::NotFound(*address))?
        };

        // KDF work stays off the async workers.
        let passphrase = passphrase.to_string();
        tokio::task::spawn_blocking(move || -> Result<KeyHandle, KeystoreError> {
            let secret = unseal(&sealed, &passphrase)?;
            signer::key_from_secret(&secret).map_err(|e| KeystoreError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| KeystoreError::Backend(format!("keystore task failed: {}", e)))?
    }

    async fn new_account(&self, config: &[u8]) -> Result<Account, KeystoreError> {
        let config = NewAccountConfig::parse(config)?;
        self.store(signer::generate_key(), config.passphrase).await
    }

    async fn import_raw_key(&self, key: KeyHandle, config: &[u8]) -> Result<Account, KeystoreError> {
        let config = NewAccountConfig::parse(config)?;
        self.store(key, config.passphrase).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &[u8] = br#"{"passphrase":"pw"}"#;

    fn keystore() -> MemoryKeystore {
        MemoryKeystore::new(KdfSettings::Pbkdf2 { iterations: 16 })
    }

    #[tokio::test]
    async fn test_new_account_unlock() {
        let ks = keystore();
        let account = ks.new_account(CONFIG).await.unwrap();
        assert!(account.url.starts_with("memory://0x"));

        let key = ks.unlock(&account.address, "pw").await.unwrap();
        assert_eq!(key.address(), account.address);

        assert!(matches!(
            ks.unlock(&account.address, "nope").await,
            Err(KeystoreError::InvalidPassphrase)
        ));
        assert!(matches!(
            ks.unlock(&Address([9; 20]), "pw").await,
            Err(KeystoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_import_duplicate() {
        let ks = keystore();
        let key = signer::generate_key();
        let account = ks.import_raw_key(key.clone(), CONFIG).await.unwrap();
        assert_eq!(account.address, key.address());

        assert!(matches!(
            ks.import_raw_key(key, CONFIG).await,
            Err(KeystoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_open_lists_accounts() {
        let ks = keystore();
        assert!(ks.open().await.unwrap().is_empty());
        let a = ks.new_account(CONFIG).await.unwrap();
        let b = ks.new_account(CONFIG).await.unwrap();

        let listed = ks.open().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a));
        assert!(listed.contains(&b));
    }

    #[tokio::test]
    async fn test_bad_config() {
        let ks = keystore();
        assert!(matches!(ks.new_account(b"{").await, Err(KeystoreError::InvalidConfig(_))));
    }
}
