//! Per-account lock state machine
//!
//! Every account has one `LockCell` behind its own async mutex, so operations
//! on one address are serialized while different addresses never contend.
//! The mutex is held across passphrase verification, which makes each
//! transition linearizable per address.
//!
//! Timed unlocks arm an expiry task. Each transition bumps the cell's
//! generation and aborts the previous task; a task that still wakes up only
//! commits if its generation is current. Expiry is also checked at use time,
//! so a signature is never produced at or after the deadline.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::account::{Address, KeyHandle};
use crate::keystore::{KeyBackend, KeystoreError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("unknown account")]
    NotFound,
    #[error("passphrase verification failed")]
    InvalidCredential,
    #[error("account is locked")]
    AccountLocked,
    #[error("{0}")]
    Backend(String),
}

impl From<KeystoreError> for LockError {
    fn from(err: KeystoreError) -> Self {
        match err {
            KeystoreError::NotFound(_) => LockError::NotFound,
            KeystoreError::InvalidPassphrase => LockError::InvalidCredential,
            other => LockError::Backend(other.to_string()),
        }
    }
}

/// Observable lock state of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Locked,
    Unlocked,
    TimedUnlocked { expires_at: Instant },
}

enum LockState {
    Locked,
    Unlocked(KeyHandle),
    TimedUnlocked { key: KeyHandle, expires_at: Instant },
}

struct LockCell {
    state: LockState,
    /// Expiry token. Bumped on every transition.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Default for LockCell {
    fn default() -> Self {
        Self {
            state: LockState::Locked,
            generation: 0,
            timer: None,
        }
    }
}

impl LockCell {
    /// Apply a transition, cancelling any pending expiry. Returns the new generation.
    fn transition(&mut self, state: LockState) -> u64 {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation = self.generation.wrapping_add(1);
        self.state = state;
        self.generation
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.state, LockState::TimedUnlocked { expires_at, .. } if now >= expires_at)
    }

    fn usable_key(&self, now: Instant) -> Option<&KeyHandle> {
        match &self.state {
            LockState::Unlocked(key) => Some(key),
            LockState::TimedUnlocked { key, expires_at } if now < *expires_at => Some(key),
            _ => None,
        }
    }

    fn status(&self, now: Instant) -> LockStatus {
        match &self.state {
            LockState::Locked => LockStatus::Locked,
            LockState::Unlocked(_) => LockStatus::Unlocked,
            LockState::TimedUnlocked { expires_at, .. } if now < *expires_at => LockStatus::TimedUnlocked {
                expires_at: *expires_at,
            },
            LockState::TimedUnlocked { .. } => LockStatus::Locked,
        }
    }
}

impl Drop for LockCell {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

type SharedCell = Arc<Mutex<LockCell>>;

pub struct LockManager {
    backend: Arc<dyn KeyBackend>,
    cells: DashMap<Address, SharedCell>,
}

impl LockManager {
    pub fn new(backend: Arc<dyn KeyBackend>) -> Self {
        Self {
            backend,
            cells: DashMap::new(),
        }
    }

    /// Cell for `address`, created `Locked` on first use
    fn cell(&self, address: &Address) -> SharedCell {
        self.cells
            .entry(*address)
            .or_insert_with(|| Arc::new(Mutex::new(LockCell::default())))
            .clone()
    }

    fn existing_cell(&self, address: &Address) -> Option<SharedCell> {
        self.cells.get(address).map(|cell| cell.clone())
    }

    async fn verify(&self, address: &Address, passphrase: &str) -> Result<KeyHandle, LockError> {
        self.backend.unlock(address, passphrase).await.map_err(|e| {
            if matches!(e, KeystoreError::InvalidPassphrase) {
                warn!("Passphrase rejected for {}", address);
            }
            LockError::from(e)
        })
    }

    /// Unlock until explicitly locked
    pub async fn unlock_indefinite(&self, address: &Address, passphrase: &str) -> Result<(), LockError> {
        let cell = self.cell(address);
        let mut guard = cell.lock().await;
        let key = self.verify(address, passphrase).await?;

        guard.transition(LockState::Unlocked(key));
        debug!("Unlocked {} until locked", address);
        Ok(())
    }

    /// Unlock until `duration` elapses. A zero duration leaves the account locked.
    pub async fn unlock_timed(&self, address: &Address, passphrase: &str, duration: Duration) -> Result<(), LockError> {
        let cell = self.cell(address);
        let mut guard = cell.lock().await;
        let key = self.verify(address, passphrase).await?;

        if duration.is_zero() {
            drop(key);
            guard.transition(LockState::Locked);
            debug!("Timed unlock of {} already expired, relocked", address);
            return Ok(());
        }

        let expires_at = Instant::now() + duration;
        let generation = guard.transition(LockState::TimedUnlocked { key, expires_at });
        guard.timer = Some(spawn_expiry(Arc::downgrade(&cell), *address, generation, expires_at));
        debug!("Unlocked {} for {:?}", address, duration);
        Ok(())
    }

    /// Lock unconditionally. Idempotent, never fails.
    pub async fn lock(&self, address: &Address) {
        let Some(cell) = self.existing_cell(address) else {
            return;
        };
        cell.lock().await.transition(LockState::Locked);
        debug!("Locked {}", address);
    }

    /// Lock every account that has ever been unlocked
    pub async fn lock_all(&self) {
        let cells: Vec<(Address, SharedCell)> = self
            .cells
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        for (address, cell) in cells {
            cell.lock().await.transition(LockState::Locked);
            trace!("Locked {}", address);
        }
    }

    /// Run `f` with the key if the account is currently unlocked
    pub async fn with_unlocked_key<T>(
        &self,
        address: &Address,
        f: impl FnOnce(&KeyHandle) -> T,
    ) -> Result<T, LockError> {
        let Some(cell) = self.existing_cell(address) else {
            return Err(LockError::AccountLocked);
        };
        let mut guard = cell.lock().await;
        let now = Instant::now();

        if guard.is_expired(now) {
            guard.transition(LockState::Locked);
            debug!("Timed unlock of {} expired at use", address);
            return Err(LockError::AccountLocked);
        }

        guard.usable_key(now).map(f).ok_or(LockError::AccountLocked)
    }

    /// Verify, run `f` with the key, then lock, as one step for this address.
    ///
    /// A rejected passphrase leaves the state untouched. Once verification
    /// succeeds the account ends up `Locked` whatever it was before.
    pub async fn unlock_sign_relock<T>(
        &self,
        address: &Address,
        passphrase: &str,
        f: impl FnOnce(&KeyHandle) -> T,
    ) -> Result<T, LockError> {
        let cell = self.cell(address);
        let mut guard = cell.lock().await;
        let key = self.verify(address, passphrase).await?;

        let out = f(&key);
        drop(key);
        guard.transition(LockState::Locked);
        debug!("One-shot unlock of {} done, relocked", address);
        Ok(out)
    }

    pub async fn status(&self, address: &Address) -> LockStatus {
        match self.existing_cell(address) {
            Some(cell) => cell.lock().await.status(Instant::now()),
            None => LockStatus::Locked,
        }
    }
}

fn spawn_expiry(cell: Weak<Mutex<LockCell>>, address: Address, generation: u64, expires_at: Instant) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep_until(expires_at).await;

        let Some(cell) = cell.upgrade() else {
            return;
        };
        let mut guard = cell.lock().await;
        if guard.generation != generation {
            trace!("Superseded expiry for {} ignored", address);
            return;
        }

        // This task's own handle; drop it rather than abort ourselves.
        guard.timer = None;
        guard.transition(LockState::Locked);
        debug!("Timed unlock of {} expired", address);
    })
}
