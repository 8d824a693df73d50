//! Demo binary: send a value transfer and track it until the chain confirms
//! it at the configured depth.
//!
//! Needs a reachable node and `TX_CONFIRMER_PRIVATE_KEY` set to a funded
//! account's hex private key.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tx_confirmer::blockchain::{EthereumClient, NonceManager};
use tx_confirmer::config::AppConfig;
use tx_confirmer::confirm::Confirmer;
use tx_confirmer::storage::{PendingTx, PendingTxStore, TxStatus};

#[derive(Parser)]
#[command(name = "tx-confirmer")]
#[command(about = "Send a transfer and poll the chain until it is confirmed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Recipient address; a throwaway address is generated when omitted
    #[arg(long)]
    to: Option<String>,
    /// Amount to transfer, in wei
    #[arg(long, default_value = "1000000000")]
    amount_wei: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Ok(rpc_url) = std::env::var("TX_CONFIRMER_RPC_URL") {
        config.network.rpc_url = rpc_url;
    }

    let private_key = std::env::var("TX_CONFIRMER_PRIVATE_KEY")
        .context("TX_CONFIRMER_PRIVATE_KEY must hold the sender's hex private key")?;

    let client = match config.network.chain_id {
        Some(chain_id) => EthereumClient::new_with_chain_id(&config.network.rpc_url, chain_id)?,
        None => EthereumClient::new(&config.network.rpc_url).await?,
    };

    let wallet = LocalWallet::from_str(private_key.trim())
        .context("TX_CONFIRMER_PRIVATE_KEY is not a valid private key")?
        .with_chain_id(client.chain_id());
    let nonce = NonceManager::init(&client, wallet.address()).await?;

    let to = match &args.to {
        Some(address) => Address::from_str(address).context("invalid --to address")?,
        None => LocalWallet::new(&mut rand::thread_rng()).address(),
    };

    let store = Arc::new(PendingTxStore::new());
    let confirmer = Confirmer::new(client.clone(), 0, config.confirmer.clone())
        .with_on_tx_sent({
            let store = Arc::clone(&store);
            move |tx_hash| {
                store.insert(PendingTx::new(tx_hash));
                Ok(())
            }
        })
        .with_on_tx_confirmed({
            let store = Arc::clone(&store);
            move |tx_hash| {
                store.mark(tx_hash, TxStatus::Confirmed);
                Ok(())
            }
        })
        .with_on_error({
            let store = Arc::clone(&store);
            move |tx_hash, err| {
                store.mark(tx_hash, TxStatus::Failed);
                error!(%tx_hash, error = %err, "giving up on tx");
            }
        });
    confirmer.start()?;

    let gas_price = client.gas_price().await?;
    let raw = client
        .build_transfer(&wallet, nonce.next(), to, U256::from(args.amount_wei), gas_price)
        .await?;

    let tx_hash = confirmer.submit(&raw).await?;
    info!(%tx_hash, to = %format!("{to:#x}"), amount_wei = args.amount_wei, "transfer submitted");

    while confirmer.queue_len() > 0 {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    confirmer.stop().await;

    match store.get(&tx_hash) {
        Some(tx) => info!(%tx_hash, status = ?tx.status, "done"),
        None => error!(%tx_hash, "tx was never recorded"),
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
