use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;

use crate::account::Address;
use crate::client::RpcClient;
use crate::encoding;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// List accounts held by the server
    List,
    /// Create a fresh account
    New {
        #[arg(long)]
        passphrase: String,
    },
    /// Import a hex private key
    Import {
        #[arg(long)]
        key: String,
        #[arg(long)]
        passphrase: String,
    },
    /// Unlock for a limited time
    Unlock {
        address: Address,
        #[arg(long)]
        passphrase: String,
        /// Seconds; 0 relocks immediately
        #[arg(long, default_value_t = 300)]
        duration: u64,
    },
    Lock {
        address: Address,
    },
    /// Sign data; with --passphrase the account is unlocked for this signature only
    Sign {
        address: Address,
        /// Payload, taken as UTF-8 text unless --hex is set
        data: String,
        #[arg(long)]
        hex: bool,
        #[arg(long)]
        passphrase: Option<String>,
    },
}

fn payload(data: &str, hex: bool) -> Result<Vec<u8>> {
    if hex {
        encoding::decode_hex(data).context("payload is not valid hex")
    } else {
        Ok(data.as_bytes().to_vec())
    }
}

fn duration_nanos(seconds: u64) -> i64 {
    i64::try_from(seconds.saturating_mul(1_000_000_000)).unwrap_or(i64::MAX)
}

pub async fn handle_account_command(client: &RpcClient, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::List => {
            let accounts = client.accounts().await?;
            if accounts.is_empty() {
                println!("No accounts.");
            }
            for account in accounts {
                println!("{}\t{}", account.address, account.url);
            }
        }
        AccountCommands::New { passphrase } => {
            let account = client.new_account(&json!({ "passphrase": passphrase })).await?;
            println!("Created {}", account.address);
            println!("Stored at {}", account.url);
        }
        AccountCommands::Import { key, passphrase } => {
            let account = client
                .import_raw_key(&key, &json!({ "passphrase": passphrase }))
                .await?;
            println!("Imported {}", account.address);
            println!("Stored at {}", account.url);
        }
        AccountCommands::Unlock {
            address,
            passphrase,
            duration,
        } => {
            client
                .timed_unlock(&address, &passphrase, duration_nanos(duration))
                .await?;
            println!("{} unlocked for {}s", address, duration);
        }
        AccountCommands::Lock { address } => {
            client.lock(&address).await?;
            println!("{} locked", address);
        }
        AccountCommands::Sign {
            address,
            data,
            hex,
            passphrase,
        } => {
            let payload = payload(&data, hex)?;
            let sig = match passphrase {
                Some(passphrase) => client.unlock_and_sign(&address, &payload, &passphrase).await?,
                None => client.sign(&address, &payload).await?,
            };
            println!("{}", encoding::encode_hex(&sig.to_bytes()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload() {
        assert_eq!(payload("msg", false).unwrap(), b"msg");
        assert_eq!(payload("0x6d7367", true).unwrap(), b"msg");
        assert!(payload("xyz", true).is_err());
    }

    #[test]
    fn test_duration_nanos() {
        assert_eq!(duration_nanos(0), 0);
        assert_eq!(duration_nanos(2), 2_000_000_000);
        assert_eq!(duration_nanos(u64::MAX), i64::MAX);
    }
}
