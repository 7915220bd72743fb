mod config;
mod elm;
mod poller;
mod transport;

use anyhow::{Context, Result};
use config::PollerConfig;
use elm::Interrupt;
use poller::Poller;
use tokio::io::BufReader;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = PollerConfig::from_env()?;

    info!("OBD poller starting");
    info!("  Adapter: {:?}", config.adapter);
    info!("  Poll interval: {:?}", config.poll_interval);
    info!("  Convert raw data: {}", config.convert_raw_data);

    let interrupt = Interrupt::new();
    let poller = Poller::new(config.clone(), interrupt.clone());
    info!("  Sensors: {}", poller.sensors().number_of_commands());

    if let Some(path) = &config.replay {
        info!("Replaying recorded results from {}", path.display());
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let lines = poller.replay(BufReader::new(file)).await?;
        info!("Replayed {} lines", lines.len());
        return Ok(());
    }

    // Ctrl-C stops the command currently waiting on the adapter
    let interrupt_clone = interrupt.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping");
                interrupt_clone.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let stream = transport::connect(&config.adapter).await?;
    info!("Connected to adapter");

    let cycles = poller.run(stream).await?;
    info!("Stopped after {} poll cycles", cycles);
    Ok(())
}
