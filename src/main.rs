//! Market maker orchestrator entry point.
//!
//! Loads configuration and the wallet roster, starts one trading bot per
//! active wallet, and stops them all on ctrl-c:
//! 1. Reads app config from the environment
//! 2. Wires the swap gateway and RPC balance collaborators
//! 3. Starts a trading bot for every active wallet in the roster
//! 4. Logs cycle and recycle notifications as they arrive

use std::sync::Arc;
use tracing::{error, info};

use maker_runner::config::load_wallet_roster;
use maker_runner::{
    short_key, AppConfig, BotRegistry, CycleCallback, RpcBalanceClient, SwapGatewayClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting maker-runner...");

    let config = AppConfig::from_env()?;
    info!(
        "RPC: {}, swap gateway: {}",
        config.rpc_url, config.swap_gateway_url
    );

    let swap = Arc::new(SwapGatewayClient::new(&config.swap_gateway_url)?);
    let balance = Arc::new(RpcBalanceClient::new(&config.rpc_url)?);
    let registry = Arc::new(BotRegistry::new(swap, balance));

    let wallets = load_wallet_roster(&config.wallet_roster)?;
    info!(
        "Loaded {} wallets from {}",
        wallets.len(),
        config.wallet_roster
    );

    let on_cycle: CycleCallback = Arc::new(|wallet_id, cycles, recycled| {
        if recycled {
            info!("Wallet {} recycled after {} cycles", wallet_id, cycles);
        } else {
            info!("Wallet {} completed cycle {}", wallet_id, cycles);
        }
    });

    for wallet in wallets.into_iter().filter(|w| w.is_active) {
        let key = wallet.public_key.clone();
        if let Err(err) = registry
            .start(wallet, &config.settings, Arc::clone(&on_cycle))
            .await
        {
            error!(
                "Failed to start market making for wallet {}...: {}",
                short_key(&key),
                err
            );
        }
    }

    tokio::signal::ctrl_c().await?;
    let stopped = registry.stop_all().await;
    info!("Shutdown complete, stopped {} bots", stopped);

    Ok(())
}
