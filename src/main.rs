use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use account_custody::cli::{self, Cli, Commands};
use account_custody::client::RpcClient;
use account_custody::config::{BackendKind, CustodyConfig};
use account_custody::keystore;
use account_custody::rpc::RpcServer;
use account_custody::service::CustodyService;

/// RUST_LOG wins over the configured level
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn run_server(
    config_path: PathBuf,
    bind: Option<String>,
    keystore_path: Option<PathBuf>,
    backend: Option<BackendKind>,
) -> Result<()> {
    let mut config = CustodyConfig::load_or_default(&config_path)?;
    if let Some(bind) = bind {
        config.server.bind_addr = bind;
    }
    if let Some(path) = keystore_path {
        config.keystore.path = path;
    }
    if let Some(backend) = backend {
        config.keystore.backend = backend;
    }
    init_tracing(&config.log_level);

    let service = Arc::new(CustodyService::new(keystore::build_backend(&config.keystore)));
    service.open("").await.context("opening keystore")?;
    info!("{}", service.status().await);

    let served = RpcServer::new(service.clone())
        .start(&config.server.bind_addr, shutdown_signal())
        .await
        .with_context(|| format!("RPC server on {}", config.server.bind_addr));

    service.close().await;
    served
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            keystore,
            backend,
        } => run_server(config, bind, keystore, backend).await,
        Commands::Status => {
            let client = RpcClient::new(cli.url);
            println!("{}", client.status().await?);
            Ok(())
        }
        Commands::Account { cmd } => {
            let client = RpcClient::new(cli.url);
            cli::account::handle_account_command(&client, cmd).await
        }
    }
}
