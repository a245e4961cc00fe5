//! PatrolWatch - police alert monitor
//!
//! Polls a live traffic map for police alerts inside a region and notifies
//! Pushover users and Discord webhooks about each new one.

use anyhow::Result;
use clap::Parser;
use patrolwatch::{
    app::App,
    cli::{Cli, Command},
    config::Config,
};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        init_tracing("info");
        error!("Failed to load configuration: {}", err);
        // A bad configuration is a setup mistake, not a runtime condition.
        std::process::exit(1);
    });

    init_tracing(&config.log_level);

    if cli.command() == Command::ShowBounds {
        let bounds = config.bounds;
        let center = bounds.center();
        println!("Current monitoring bounds:");
        println!("  Top: {}", bounds.top);
        println!("  Bottom: {}", bounds.bottom);
        println!("  Left: {}", bounds.left);
        println!("  Right: {}", bounds.right);
        println!("  Center: {}", center);
        return Ok(());
    }

    info!("PatrolWatch starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Monitoring Area: {}", config.bounds);
    info!("Poll Interval: {}s", config.interval_seconds);
    info!("Alert Category: {}", config.source.alert_kind);
    info!("Cache File: {}", config.cache.path.display());
    info!("Cache Duration: {}h", config.cache.duration_hours);
    info!("Dry Run: {}", config.dry_run);
    info!("-------------------------------------------------------");

    let mut app = App::builder(config).build()?;

    match cli.command() {
        Command::CheckOnce => {
            let report = app.run_cycle().await;
            info!(?report, "Single check complete.");
        }
        _ => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let monitor = tokio::spawn(app.run(shutdown_rx));

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received. Finishing the current cycle...");
            shutdown_tx.send(true).ok();

            match monitor.await {
                Ok(result) => result?,
                Err(e) => error!("Monitor task panicked: {:?}", e),
            }
        }
    }

    info!("Exiting.");
    Ok(())
}
