//! Custody service: the single entry point behind the RPC surface.
//!
//! Resolves addresses against the directory, drives the lock manager and
//! hands unlocked keys to the signer. Key material never leaves this module
//! except as a signature.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::account::{Account, Address, Directory};
use crate::error::{CustodyError, ErrorKind, Operation};
use crate::keystore::KeyBackend;
use crate::lifecycle::{Lifecycle, Phase};
use crate::lock::{LockManager, LockStatus};
use crate::signer::{self, Signature, Signer};

pub struct CustodyService {
    backend: Arc<dyn KeyBackend>,
    directory: Directory,
    locks: LockManager,
    signer: Signer,
    lifecycle: Lifecycle,
}

/// Duration of a timed unlock given in nanoseconds; non-positive means already expired.
fn unlock_duration(duration_ns: i64) -> Duration {
    u64::try_from(duration_ns).map(Duration::from_nanos).unwrap_or(Duration::ZERO)
}

impl CustodyService {
    pub fn new(backend: Arc<dyn KeyBackend>) -> Self {
        Self {
            directory: Directory::new(),
            locks: LockManager::new(backend.clone()),
            signer: Signer,
            lifecycle: Lifecycle::new(backend.clone()),
            backend,
        }
    }

    fn require_known(&self, operation: Operation, address: &Address) -> Result<(), CustodyError> {
        if self.directory.contains(address) {
            Ok(())
        } else {
            Err(CustodyError::not_found(operation, *address))
        }
    }

    /// Free-form health line
    pub async fn status(&self) -> String {
        let phase = match self.lifecycle.phase().await {
            Phase::Open => "open",
            Phase::Closed => "closed",
        };
        format!("OK: {} backend {}, {} accounts", self.backend.name(), phase, self.directory.len())
    }

    /// The built-in backends take no open-time secret; `passphrase` is accepted for wire compatibility.
    pub async fn open(&self, _passphrase: &str) -> Result<(), CustodyError> {
        self.lifecycle
            .open(&self.directory)
            .await
            .map(|_| ())
            .map_err(|e| CustodyError::from_keystore(Operation::Open, e))
    }

    pub async fn close(&self) {
        self.lifecycle.close(&self.locks).await;
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.directory.snapshot()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.directory.contains(address)
    }

    pub async fn sign(&self, address: &Address, payload: &[u8]) -> Result<Signature, CustodyError> {
        self.require_known(Operation::Sign, address)?;

        self.locks
            .with_unlocked_key(address, |key| self.signer.sign(key, payload))
            .await
            .map_err(|e| CustodyError::from_lock(Operation::Sign, *address, e))?
            .map_err(|e| CustodyError::new(Operation::Sign, ErrorKind::BackendError, e.to_string()).with_address(*address))
    }

    pub async fn unlock_and_sign(
        &self,
        address: &Address,
        payload: &[u8],
        passphrase: &str,
    ) -> Result<Signature, CustodyError> {
        self.require_known(Operation::UnlockAndSign, address)?;

        self.locks
            .unlock_sign_relock(address, passphrase, |key| self.signer.sign(key, payload))
            .await
            .map_err(|e| CustodyError::from_lock(Operation::UnlockAndSign, *address, e))?
            .map_err(|e| {
                CustodyError::new(Operation::UnlockAndSign, ErrorKind::BackendError, e.to_string()).with_address(*address)
            })
    }

    pub async fn timed_unlock(&self, address: &Address, password: &str, duration_ns: i64) -> Result<(), CustodyError> {
        self.require_known(Operation::TimedUnlock, address)?;

        self.locks
            .unlock_timed(address, password, unlock_duration(duration_ns))
            .await
            .map_err(|e| CustodyError::from_lock(Operation::TimedUnlock, *address, e))
    }

    /// Never fails; unknown addresses are ignored.
    pub async fn lock(&self, address: &Address) {
        if !self.directory.contains(address) {
            debug!("Lock of unknown account {} ignored", address);
        }
        self.locks.lock(address).await;
    }

    pub async fn lock_status(&self, address: &Address) -> LockStatus {
        self.locks.status(address).await
    }

    pub async fn new_account(&self, config: &[u8]) -> Result<Account, CustodyError> {
        let account = self
            .backend
            .new_account(config)
            .await
            .map_err(|e| CustodyError::from_keystore(Operation::NewAccount, e))?;

        self.directory.insert(account.clone());
        info!("Created account {}", account.address);
        Ok(account)
    }

    pub async fn import_raw_key(&self, raw_key: &str, config: &[u8]) -> Result<Account, CustodyError> {
        let key = signer::parse_raw_key(raw_key)
            .map_err(|e| CustodyError::new(Operation::ImportRawKey, ErrorKind::InvalidKey, e.to_string()))?;

        let account = self
            .backend
            .import_raw_key(key, config)
            .await
            .map_err(|e| CustodyError::from_keystore(Operation::ImportRawKey, e))?;

        self.directory.insert(account.clone());
        info!("Imported account {}", account.address);
        Ok(account)
    }
}
