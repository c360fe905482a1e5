//! Cloud services billing collector.
//!
//! This is the main entry point for the collector binary.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cloud_billing_collector::cli::{Cli, LogFormat, LoggingArgs};
use cloud_billing_collector::{app, CollectorConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.logging);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting billing collector");

    let config = CollectorConfig::from_cli(&cli)?;
    tracing::info!(
        job = config.job.name(),
        schedule = ?config.schedule,
        catch_up_days = config.catch_up_days,
        "Collector configuration loaded"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            app::shutdown_signal().await;
            tracing::info!("Shutdown requested");
            cancel.cancel();
        }
    });

    if let Err(e) = app::run(config, cancel).await {
        tracing::error!(error = %e, "Collector failed");
        return Err(e.into());
    }

    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flag.
fn init_tracing(args: &LoggingArgs) {
    let default_directive = match args.log_level {
        0 => "info",
        1 => "info,cloud_billing=debug",
        _ => "info,cloud_billing=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());

    let registry = tracing_subscriber::registry().with(filter);
    match args.log_format {
        LogFormat::Console => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
