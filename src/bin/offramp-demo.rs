//! Demo process for the shutdown coordinator.
//!
//! Registers a few fake resources, starts the signal listener, and waits.
//! Send SIGTERM or SIGINT (Ctrl+C) to watch the coordinated shutdown run.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offramp::{Closer, ShutdownConfig, Signal};

#[derive(Parser)]
#[command(name = "offramp-demo")]
#[command(about = "Graceful shutdown demo", long_about = None)]
struct Cli {
    /// Path to a TOML config file (grace_period_secs, signals).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the grace period in seconds.
    #[arg(long)]
    grace_secs: Option<u64>,

    /// Make one of the demo resources fail on close.
    #[arg(long)]
    inject_failure: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offramp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ShutdownConfig::load(path)?,
        None => ShutdownConfig {
            signals: vec![Signal::Terminate, Signal::Interrupt],
            ..ShutdownConfig::default()
        },
    };
    if let Some(grace) = cli.grace_secs {
        config.grace_period_secs = grace;
        config.validate()?;
    }

    tracing::info!(
        grace_period_secs = config.grace_period_secs,
        signals = ?config.signals,
        "offramp demo starting"
    );

    let closer = Closer::new();
    closer.listen(&config.signals, config.grace_period())?;

    closer.register_named("database pool", |_ctx| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(())
    });
    closer.register_named("message consumer", |ctx| async move {
        // Pretend to drain in-flight messages, but respect the deadline.
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => Ok(()),
            _ = ctx.cancelled() => Err("drain interrupted by deadline".into()),
        }
    });
    if cli.inject_failure {
        closer.register_named("trace exporter", |_ctx| async {
            Err("exporter endpoint unreachable".into())
        });
    }

    tracing::info!("demo resources registered, waiting for a termination signal");
    closer.done().await;

    match closer.outcome() {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(err.into()),
        None => Ok(()),
    }
}
