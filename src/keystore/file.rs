//! Encrypted key files on disk
//!
//! One JSON file per account, named `UTC--<timestamp>--<address>`. Files that
//! do not parse are skipped at open time so a stray file cannot take the
//! whole keystore down.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{KeyBackend, KeystoreError, NewAccountConfig};
use crate::account::auth::{seal, unseal, KdfSettings, SealedKey};
use crate::account::{Account, Address, KeyHandle};
use crate::signer;

pub const KEY_FILE_VERSION: u32 = 1;

/// On-disk key file
#[derive(Serialize, Deserialize, Debug)]
pub struct KeyFile {
    pub address: Address,
    pub id: String,
    pub version: u32,
    pub crypto: SealedKey,
}

pub struct FileKeystore {
    dir: PathBuf,
    kdf: KdfSettings,
    index: RwLock<HashMap<Address, PathBuf>>,
}

impl FileKeystore {
    pub fn new(dir: PathBuf, kdf: KdfSettings) -> Self {
        Self {
            dir,
            kdf,
            index: RwLock::new(HashMap::new()),
        }
    }

    fn account_for(address: Address, path: &Path) -> Account {
        Account {
            address,
            url: format!("keystore://{}", path.display()),
        }
    }

    async fn store(&self, key: KeyHandle, passphrase: String) -> Result<Account, KeystoreError> {
        let address = key.address();
        if self.index.read().await.contains_key(&address) {
            return Err(KeystoreError::AlreadyExists(address));
        }

        let dir = self.dir.clone();
        let kdf = self.kdf.clone();
        let path = tokio::task::spawn_blocking(move || -> Result<PathBuf, KeystoreError> {
            // The index is empty until `open`; the directory is authoritative.
            if let Some(existing) = existing_key_file(&dir, &address)? {
                debug!("Key file for {} already at {}", address, existing.display());
                return Err(KeystoreError::AlreadyExists(address));
            }
            let crypto = seal(&signer::secret_bytes(&key), &passphrase, &kdf)?;
            let file = KeyFile {
                address,
                id: uuid::Uuid::new_v4().to_string(),
                version: KEY_FILE_VERSION,
                crypto,
            };
            write_key_file(&dir, &file)
        })
        .await
        .map_err(|e| KeystoreError::Backend(format!("keystore task failed: {}", e)))??;

        let mut index = self.index.write().await;
        if index.contains_key(&address) {
            // Lost a race with a concurrent import of the same key.
            let _ = fs::remove_file(&path);
            return Err(KeystoreError::AlreadyExists(address));
        }
        index.insert(address, path.clone());
        info!("Wrote key file for {} to {}", address, path.display());

        Ok(Self::account_for(address, &path))
    }
}

fn key_file_name(address: &Address) -> String {
    format!(
        "UTC--{}--{}",
        chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.9fZ"),
        hex::encode(address.as_bytes())
    )
}

fn write_key_file(dir: &Path, file: &KeyFile) -> Result<PathBuf, KeystoreError> {
    fs::create_dir_all(dir).map_err(|e| KeystoreError::Unavailable(format!("{}: {}", dir.display(), e)))?;

    let json = serde_json::to_vec_pretty(file).map_err(|e| KeystoreError::Backend(e.to_string()))?;
    let name = key_file_name(&file.address);
    let path = dir.join(&name);
    let tmp = dir.join(format!("{}.tmp", name));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let write = || -> std::io::Result<()> {
        let mut out = options.open(&tmp)?;
        out.write_all(&json)?;
        out.sync_all()?;
        fs::rename(&tmp, &path)
    };
    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        KeystoreError::Backend(format!("writing {}: {}", path.display(), e))
    })?;

    Ok(path)
}

fn read_key_file(path: &Path) -> Result<KeyFile, KeystoreError> {
    let data = fs::read(path).map_err(|e| KeystoreError::Backend(format!("reading {}: {}", path.display(), e)))?;
    serde_json::from_slice(&data).map_err(|e| KeystoreError::Backend(format!("parsing {}: {}", path.display(), e)))
}

/// Key file already stored for `address`, matched by file name
fn existing_key_file(dir: &Path, address: &Address) -> Result<Option<PathBuf>, KeystoreError> {
    if !dir.exists() {
        return Ok(None);
    }
    let suffix = format!("--{}", hex::encode(address.as_bytes()));
    let entries = fs::read_dir(dir).map_err(|e| KeystoreError::Unavailable(format!("{}: {}", dir.display(), e)))?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("UTC--") && name.ends_with(&suffix))
        }))
}

fn scan_dir(dir: &Path) -> Result<Vec<(Address, PathBuf)>, KeystoreError> {
    fs::create_dir_all(dir).map_err(|e| KeystoreError::Unavailable(format!("{}: {}", dir.display(), e)))?;
    let entries = fs::read_dir(dir).map_err(|e| KeystoreError::Unavailable(format!("{}: {}", dir.display(), e)))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Skipping unreadable keystore entry: {}", e);
                continue;
            }
        };
        if !path.is_file() || path.extension().is_some_and(|ext| ext == "tmp") {
            continue;
        }
        match read_key_file(&path) {
            Ok(file) => found.push((file.address, path)),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    Ok(found)
}

#[async_trait]
impl KeyBackend for FileKeystore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn open(&self) -> Result<Vec<Account>, KeystoreError> {
        let dir = self.dir.clone();
        let found = tokio::task::spawn_blocking(move || scan_dir(&dir))
            .await
            .map_err(|e| KeystoreError::Unavailable(format!("keystore scan failed: {}", e)))??;

        let mut index = self.index.write().await;
        index.clear();
        for (address, path) in found {
            if let Some(previous) = index.insert(address, path) {
                warn!("Duplicate key files for {}, ignoring {}", address, previous.display());
            }
        }
        let accounts: Vec<Account> = index
            .iter()
            .map(|(address, path)| Self::account_for(*address, path))
            .collect();
        info!("Opened file keystore at {} ({} accounts)", self.dir.display(), index.len());

        Ok(accounts)
    }

    async fn close(&self) {
        debug!("File keystore at {} closed", self.dir.display());
    }

    async fn unlock(&self, address: &Address, passphrase: &str) -> Result<KeyHandle, KeystoreError> {
        let path = self
            .index
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or(KeystoreError::NotFound(*address))?;

        let passphrase = passphrase.to_string();
        let key = tokio::task::spawn_blocking(move || -> Result<KeyHandle, KeystoreError> {
            let file = read_key_file(&path)?;
            let secret = unseal(&file.crypto, &passphrase)?;
            signer::key_from_secret(&secret).map_err(|e| KeystoreError::Backend(e.to_string()))
        })
        .await
        .map_err(|e| KeystoreError::Backend(format!("keystore task failed: {}", e)))??;

        if key.address() != *address {
            return Err(KeystoreError::Backend(format!("key file for {} holds a different key", address)));
        }
        Ok(key)
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
