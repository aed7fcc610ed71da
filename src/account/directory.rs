//! Account directory: the in-memory index of every account this service holds

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::types::{Account, Address};

/// Address-keyed account index.
///
/// Guarded by one short-lived directory-wide `RwLock`; no lookup ever waits
/// on a per-account lock.
#[derive(Default)]
pub struct Directory {
    accounts: RwLock<HashMap<Address, Account>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `account.address`.
    /// Returns true if the address was not known before.
    pub fn insert(&self, account: Account) -> bool {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts.insert(account.address, account).is_none()
    }

    pub fn get(&self, address: &Address) -> Option<Account> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.get(address).cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.contains_key(address)
    }

    /// Every known account, in no particular order
    pub fn snapshot(&self) -> Vec<Account> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
