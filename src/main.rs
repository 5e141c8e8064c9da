use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slidewin::config::SlidewinConfig;
use slidewin::ratelimit::{LimiterBackend, ManualClock, SlidingWindowLimiter};
use slidewin::simulation::{Pacer, TokioPacer, TrafficSimulation, VirtualPacer};

/// Replay synthetic user traffic through a sliding window rate limiter.
#[derive(Debug, Parser)]
#[command(name = "slidewin", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window length in seconds
    #[arg(long)]
    window_secs: Option<f64>,

    /// Maximum admitted messages per user within one window
    #[arg(long)]
    max_requests: Option<u64>,

    /// Messages per batch
    #[arg(long)]
    messages: Option<u32>,

    /// Number of distinct users
    #[arg(long)]
    users: Option<u32>,

    /// Number of batches
    #[arg(long)]
    batches: Option<u32>,

    /// Advance a virtual clock instead of sleeping
    #[arg(long)]
    virtual_time: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Load the configuration file (or defaults) and apply flag overrides.
    fn resolve_config(&self) -> anyhow::Result<SlidewinConfig> {
        let mut config = match &self.config {
            Some(path) => SlidewinConfig::from_file(path)?,
            None => SlidewinConfig::default(),
        };

        if let Some(window_secs) = self.window_secs {
            config.limiter.window_size_secs = window_secs;
        }
        if let Some(max_requests) = self.max_requests {
            config.limiter.max_requests = max_requests;
        }
        if let Some(messages) = self.messages {
            config.simulation.messages = messages;
        }
        if let Some(users) = self.users {
            config.simulation.users = users;
        }
        if let Some(batches) = self.batches {
            config.simulation.batches = batches;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    info!("Starting slidewin traffic simulation");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = cli.resolve_config()?;
    info!(
        window_size_secs = config.limiter.window_size_secs,
        max_requests = config.limiter.max_requests,
        users = config.simulation.users,
        "Configuration loaded"
    );

    if cli.virtual_time {
        let clock = ManualClock::new();
        let limiter = Arc::new(SlidingWindowLimiter::from_config_with_clock(
            &config.limiter,
            clock.clone(),
        )?);
        run(limiter, VirtualPacer::new(clock), &config).await?;
    } else {
        let limiter = Arc::new(SlidingWindowLimiter::from_config(&config.limiter)?);
        run(limiter, TokioPacer, &config).await?;
    }

    info!("Slidewin traffic simulation stopped");
    Ok(())
}

/// Run the simulation until it finishes or a shutdown signal arrives.
async fn run<L, P>(limiter: L, pacer: P, config: &SlidewinConfig) -> anyhow::Result<()>
where
    L: LimiterBackend,
    P: Pacer,
{
    let mut simulation = TrafficSimulation::new(limiter, pacer, config.simulation.clone())?;

    tokio::select! {
        report = simulation.run() => {
            info!(
                messages = report.events.len(),
                admitted = report.admitted(),
                rejected = report.rejected(),
                "Simulation complete"
            );
        }
        _ = shutdown_signal() => {
            info!("Simulation interrupted");
        }
    }

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
