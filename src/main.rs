//! Comet Liquidation Bot
//!
//! Watches a Compound III ledger for insolvent accounts and absorbs them
//! through a flash-loan funded liquidator contract. When nothing is
//! liquidatable it buys discounted collateral reserves instead.
//! Transactions go to the public mempool or, with `USE_FLASHBOTS=true`,
//! to a private relay as single-transaction bundles.
//!
//! `comet-liquidator set-asset-config <asset> <max-amount> <true|false>`
//! updates the liquidator's purchase limit for one collateral asset and
//! exits.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::UniswapV3Quoter;
use liquidator_chain::{
    CometLedger, Ledger, LiquidatorContract, PublicSubmitter, RelayClient, RelaySubmitter,
    Submitter, TransactionSigner,
};
use liquidator_core::config::env;
use liquidator_core::{
    AssetAdmin, CallGuard, ExecutionTarget, ExecutorDeps, LiquidationExecutor, LogSink, MainLoop,
    PositionDirectory, RuntimeConfig, TracingSink,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "Fatal startup error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug"));

    let json = std::env::var(env::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

async fn run() -> Result<()> {
    info!("Starting Comet liquidation bot v{}", env!("CARGO_PKG_VERSION"));

    let config = RuntimeConfig::from_env().context("Invalid configuration")?;
    config.log_config();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("set-asset-config") {
        return set_asset_config(&config, &args[1..]).await;
    }

    let cancel = CancellationToken::new();
    let mut main_loop = build(&config, cancel.clone()).await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    let iterations = main_loop.run().await;
    info!(iterations, "Shut down cleanly");
    Ok(())
}

async fn build(config: &RuntimeConfig, cancel: CancellationToken) -> Result<MainLoop> {
    info!("Initializing components...");

    let bot = &config.bot;
    let deployment = &config.deployment;
    let submitter = build_submitter(config, cancel.clone()).await?;

    let ledger: Arc<dyn Ledger> = Arc::new(CometLedger::new(deployment.ledger, &config.rpc_url));
    let liquidator = Arc::new(LiquidatorContract::new(config.liquidator, &config.rpc_url));
    let quoter = Arc::new(UniswapV3Quoter::new(&config.rpc_url, deployment.uniswap));

    let sink: Arc<dyn LogSink> = Arc::new(TracingSink);
    let guard = CallGuard::new(cancel, bot.timeouts.rpc());

    let directory =
        PositionDirectory::new(ledger.clone(), guard.clone(), &bot.directory, sink.clone());

    let executor = LiquidationExecutor::new(
        ExecutorDeps {
            ledger,
            liquidator,
            quoter,
            submitter,
        },
        ExecutionTarget {
            ledger: deployment.ledger,
            liquidator: config.liquidator,
            pair_token: deployment.pair_token,
            pool_fee: deployment.pool_fee,
            reversed_pair: deployment.reversed_pair,
        },
        bot.executor.clone(),
        guard.clone(),
        sink.clone(),
    );

    info!("All components initialized");
    Ok(MainLoop::new(directory, executor, bot.main_loop.clone(), guard, sink))
}

/// Signer plus the submission strategy, fixed for the process lifetime.
async fn build_submitter(
    config: &RuntimeConfig,
    cancel: CancellationToken,
) -> Result<Arc<dyn Submitter>> {
    let bot = &config.bot;
    let deployment = &config.deployment;

    let signer = Arc::new(
        TransactionSigner::connect(&config.private_key, &config.rpc_url, bot.gas.clone())
            .await
            .context("Failed to initialize transaction signer")?,
    );
    if signer.chain_id() != deployment.chain_id {
        bail!(
            "RPC chain id {} does not match deployment {} (chain id {})",
            signer.chain_id(),
            deployment.name,
            deployment.chain_id
        );
    }
    info!(address = %signer.address(), nonce = signer.current_nonce(), "Signer initialized");

    let timeouts = bot.timeouts.submit_timeouts();
    let submitter: Arc<dyn Submitter> = if config.use_relay {
        let relay = RelayClient::new(&config.relay_url);
        info!(relay = %relay.url(), auth = %relay.auth_address(), "Using private relay");
        Arc::new(RelaySubmitter::new(signer, relay, timeouts, cancel)?)
    } else {
        info!("Using public mempool");
        Arc::new(PublicSubmitter::new(signer, timeouts, cancel))
    };

    Ok(submitter)
}

async fn set_asset_config(config: &RuntimeConfig, args: &[String]) -> Result<()> {
    let [asset, max, enabled] = args else {
        bail!("usage: set-asset-config <asset> <max-amount> <true|false>");
    };
    let asset: Address = asset.parse().context("Invalid asset address")?;
    let max: U256 = max.parse().context("Invalid max amount")?;
    let enabled: bool = enabled.parse().context("Invalid enabled flag")?;

    let cancel = CancellationToken::new();
    let submitter = build_submitter(config, cancel.clone()).await?;
    let liquidator = Arc::new(LiquidatorContract::new(config.liquidator, &config.rpc_url));
    let guard = CallGuard::new(cancel, config.bot.timeouts.rpc());
    let admin = AssetAdmin::new(liquidator, submitter, guard, Arc::new(TracingSink));

    let result = admin
        .configure_asset(config.deployment.ledger, asset, max, enabled)
        .await?;
    info!(tx_hash = %result.tx_hash(), result = %result, "Asset config submitted");
    Ok(())
}
