pub mod account;
pub mod cli;
pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod keystore;
pub mod lifecycle;
pub mod lock;
pub mod peer; // raft peer identity codec, not used by the custody flow
pub mod rpc;
pub mod service;
pub mod signer;
