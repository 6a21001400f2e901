//! Switchyard binary entry point.

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use switchyard::balancer::LoadBalancer;
use switchyard::{config, shutdown};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Dual-mode (application/network) load balancer.
#[derive(Debug, Parser)]
#[command(name = "switchyard", version, about)]
struct Flags {
    /// Path to the configuration file (JSON or YAML).
    #[arg(long = "config-file", default_value = "config.json")]
    config_file: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        },
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let flags = Flags::parse();
    let config = config::load(&flags.config_file)?;

    let balancer = LoadBalancer::from_config(&config)?;
    info!(
        kind = balancer.type_name(),
        groups = config.target_groups.len(),
        "load balancer configured"
    );

    let gc = balancer.gc();
    let health = balancer.health_check(Duration::from_secs(config.health_check_interval));
    let listener = balancer.start(&config.listen_addr()).await?;
    info!(addr = %listener.local_addr(), "load balancer started");

    shutdown::wait_for_signal().await;

    // Stop chain: limiter GC, then health tickers, then the listener.
    gc.stop().await;
    health.stop().await;
    listener.stop().await;
    info!("shutdown complete");
    Ok(())
}
