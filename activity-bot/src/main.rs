use activity_clients::ChainClient;
use anyhow::{Result, bail};
use args::{BotConfig, CliArgs};
use clap::Parser;
use env_file::EnvFile;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::ops::{Artifacts, ChainActivity};
use crate::runner::Runner;

mod accounts;
mod args;
mod ops;
mod report;
mod retry;
mod runner;
mod shutdown;
mod tasks;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy()
        .add_directive("alloy=warn".parse()?)
        .add_directive("alloy_transport_http=warn".parse()?)
        .add_directive("hyper_util=warn".parse()?);

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(filter)
        .init();

    // Load configuration
    let cli_args = CliArgs::parse();
    let env_file = EnvFile::load(&cli_args.env_file)?;
    let config = BotConfig::load(cli_args, &env_file)?;
    let accounts = accounts::load_accounts(&env_file)?;
    let artifacts = Artifacts::load(&config.artifacts_dir)?;

    info!("🚀 Starting testnet activity bot");

    let client = ChainClient::connect(config.client_config()).await?;
    if !client.is_connected().await {
        bail!("Cannot reach RPC endpoint {}", config.chain.rpc_url);
    }

    // Setup shutdown handler
    let shutdown_token = CancellationToken::new();
    let shutdown_token_clone = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown::shutdown_signal(shutdown_token_clone).await;
    });

    let tracked = accounts.iter().map(|a| a.address()).collect();
    let setup = ChainActivity::setup(
        client,
        artifacts,
        &accounts[0],
        tracked,
        config.activity_settings(),
    );
    let ops = tokio::select! {
        _ = shutdown_token.cancelled() => {
            warn!("🔴 Program stopped by user during setup");
            return Ok(());
        }
        ops = setup => ops?,
    };

    let mut runner = Runner::new(
        ops,
        accounts,
        config.schedule()?,
        config.runner_config(),
        shutdown_token.clone(),
    );
    let summary = runner.run().await;

    if summary.cancelled {
        warn!(
            iterations_completed = summary.iterations_completed,
            "🔴 Program stopped by user"
        );
    }
    info!(
        iterations_completed = summary.iterations_completed,
        tasks_run = summary.stats.total_invocations(),
        "Shutdown complete"
    );

    shutdown_token.cancel();
    Ok(())
}
