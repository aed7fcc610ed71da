use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::Address;
use crate::keystore::KeystoreError;
use crate::lock::LockError;

/// Failure taxonomy visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidCredential,
    AccountLocked,
    InvalidConfig,
    InvalidKey,
    BackendUnavailable,
    BackendError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidCredential => "invalid credential",
            ErrorKind::AccountLocked => "account locked",
            ErrorKind::InvalidConfig => "invalid config",
            ErrorKind::InvalidKey => "invalid key",
            ErrorKind::BackendUnavailable => "backend unavailable",
            ErrorKind::BackendError => "backend error",
        };
        f.write_str(name)
    }
}

/// The externally visible operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Status,
    Open,
    Close,
    Accounts,
    Contains,
    Sign,
    UnlockAndSign,
    TimedUnlock,
    Lock,
    NewAccount,
    ImportRawKey,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Status => "status",
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::Accounts => "accounts",
            Operation::Contains => "contains",
            Operation::Sign => "sign",
            Operation::UnlockAndSign => "unlockAndSign",
            Operation::TimedUnlock => "timedUnlock",
            Operation::Lock => "lock",
            Operation::NewAccount => "newAccount",
            Operation::ImportRawKey => "importRawKey",
        };
        f.write_str(name)
    }
}

/// A failed custody operation.
///
/// Names the operation, the address when there is one, and the kind. The
/// message is built from lower-level errors that never carry key bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}{}: {kind}: {message}", address_suffix(.address))]
pub struct CustodyError {
    pub operation: Operation,
    pub address: Option<Address>,
    pub kind: ErrorKind,
    pub message: String,
}

fn address_suffix(address: &Option<Address>) -> String {
    address.map(|a| format!(" {}", a)).unwrap_or_default()
}

impl CustodyError {
    pub fn new(operation: Operation, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            address: None,
            kind,
            message: message.into(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn not_found(operation: Operation, address: Address) -> Self {
        Self::new(operation, ErrorKind::NotFound, "unknown account").with_address(address)
    }

    pub fn from_lock(operation: Operation, address: Address, err: LockError) -> Self {
        let kind = match &err {
            LockError::NotFound => ErrorKind::NotFound,
            LockError::InvalidCredential => ErrorKind::InvalidCredential,
            LockError::AccountLocked => ErrorKind::AccountLocked,
            LockError::Backend(_) => ErrorKind::BackendError,
        };
        Self::new(operation, kind, err.to_string()).with_address(address)
    }

    pub fn from_keystore(operation: Operation, err: KeystoreError) -> Self {
        let kind = match &err {
            KeystoreError::NotFound(_) => ErrorKind::NotFound,
            KeystoreError::InvalidPassphrase => ErrorKind::InvalidCredential,
            KeystoreError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            KeystoreError::Unavailable(_) => ErrorKind::BackendUnavailable,
            KeystoreError::AlreadyExists(_) | KeystoreError::Backend(_) => ErrorKind::BackendError,
        };
        let address = match &err {
            KeystoreError::NotFound(a) | KeystoreError::AlreadyExists(a) => Some(*a),
            _ => None,
        };
        let mut custody = Self::new(operation, kind, err.to_string());
        custody.address = address;
        custody
    }
}
