//! Account model
//!
//! - 20-byte addresses derived from secp256k1 public keys
//! - The address-keyed directory of known accounts
//! - Passphrase sealing used by the keystore backends

pub mod auth;
pub mod directory;
pub mod types;

pub use directory::Directory;
pub use types::{Account, Address, KeyHandle, ADDRESS_LEN};
