mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nebula_exporter::{
    api::{self, ApiServer, ApiServerConfig},
    caspar::{CasparConfig, CasparProvider},
    config::Settings,
    logging,
    metrics::MetricsAggregator,
};

use crate::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let _log_guard = logging::init_logging(args.log_filter.as_deref(), args.log_dir.as_deref())
        .context("Failed to initialize logging")?;

    let settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load settings from {}", args.config.display()))?;

    let server_config = ApiServerConfig::from_settings(&settings);
    let banner = api::banner(&server_config.bind_address, server_config.port);
    println!("{}", banner);

    let cancel = CancellationToken::new();

    let caspar = CasparProvider::start(CasparConfig::from_settings(&settings), &cancel)
        .await
        .context("Failed to start CasparCG metrics")?;

    let aggregator = Arc::new(MetricsAggregator::new(&settings, caspar.clone()));
    let server = ApiServer::new(server_config, aggregator, banner, cancel.clone());

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signal_token.cancel();
            }
            Err(e) => warn!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });

    server.run().await?;

    if let Some(caspar) = caspar {
        caspar.shutdown();
    }
    info!("Exporter stopped");
    Ok(())
}
