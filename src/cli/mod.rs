pub mod account;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::BackendKind;

pub const DEFAULT_URL: &str = "http://127.0.0.1:9797";

#[derive(Parser)]
#[command(name = "account_custody")]
#[command(about = "Account custody service and client", long_about = None)]
pub struct Cli {
    /// Custody server to talk to (client commands)
    #[arg(long, global = true, default_value = DEFAULT_URL)]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the custody server
    Serve {
        #[arg(long, default_value = "custody.toml")]
        config: PathBuf,
        /// Overrides server.bind_addr
        #[arg(long)]
        bind: Option<String>,
        /// Overrides keystore.path
        #[arg(long)]
        keystore: Option<PathBuf>,
        /// Overrides keystore.backend
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
    },
    /// Print server health
    Status,
    /// Account operations
    Account {
        #[command(subcommand)]
        cmd: account::AccountCommands,
    },
}
