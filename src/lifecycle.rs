use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::account::Directory;
use crate::keystore::{KeyBackend, KeystoreError};
use crate::lock::LockManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Open,
}

/// Open/Close bookends around the backend.
///
/// Both are idempotent. Close is safe without a prior Open, and the service
/// may be opened again after closing.
pub struct Lifecycle {
    backend: Arc<dyn KeyBackend>,
    phase: Mutex<Phase>,
}

impl Lifecycle {
    pub fn new(backend: Arc<dyn KeyBackend>) -> Self {
        Self {
            backend,
            phase: Mutex::new(Phase::Closed),
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.lock().await
    }

    /// Acquire the backend and load its accounts. Returns how many were new to the directory.
    pub async fn open(&self, directory: &Directory) -> Result<usize, KeystoreError> {
        let mut phase = self.phase.lock().await;
        if *phase == Phase::Open {
            debug!("Open on already open {} backend ignored", self.backend.name());
            return Ok(0);
        }

        let accounts = self.backend.open().await?;
        let loaded = accounts.into_iter().filter(|account| directory.insert(account.clone())).count();
        *phase = Phase::Open;
        info!("{} backend open, {} accounts loaded", self.backend.name(), loaded);
        Ok(loaded)
    }

    /// Lock every account, then release the backend
    pub async fn close(&self, locks: &LockManager) {
        let mut phase = self.phase.lock().await;
        locks.lock_all().await;
        if *phase == Phase::Closed {
            debug!("Close on {} backend that was not open", self.backend.name());
            return;
        }

        self.backend.close().await;
        *phase = Phase::Closed;
        info!("{} backend closed", self.backend.name());
    }
}
