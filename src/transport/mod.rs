//! Adapter links: Wi-Fi (TCP) and serial ELM327 adapters
//!
//! Each connector opens the link once. Reconnection is left to the caller.

pub mod serial;
pub mod tcp;
pub mod traits;

pub use serial::SerialConnector;
pub use tcp::TcpConnector;
pub use traits::{TransportConnector, TransportStream};

use crate::config::AdapterConfig;
use anyhow::{Context, Result};
use tracing::info;

/// Open the link described by `config`
pub async fn connect(config: &AdapterConfig) -> Result<Box<dyn TransportStream>> {
    match config {
        AdapterConfig::Tcp { address } => {
            let connector = TcpConnector::new(address.clone());
            info!("Connecting via {} to {}", connector.name(), address);
            let stream = connector
                .connect()
                .await
                .with_context(|| format!("failed to connect to {}", address))?;
            Ok(Box::new(stream))
        }
        AdapterConfig::Serial { path, baud_rate } => {
            let connector = SerialConnector::new(path.clone(), *baud_rate);
            info!("Connecting via {} to {} @ {} baud", connector.name(), path, baud_rate);
            let stream = connector
                .connect()
                .await
                .with_context(|| format!("failed to open {}", path))?;
            Ok(Box::new(stream))
        }
    }
}
