//! Poller configuration
//!
//! Defaults suit a Wi-Fi ELM327 adapter on its factory address. Every field
//! can be overridden through `OBD_*` environment variables.

use crate::transport::serial::DEFAULT_BAUD_RATE;
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How to reach the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterConfig {
    /// Wi-Fi adapter or emulator, `tcp://host:port`
    Tcp { address: String },
    /// USB or Bluetooth-serial adapter, `serial:///dev/ttyUSB0[@baud]`
    Serial { path: String, baud_rate: u32 },
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig::Tcp {
            address: "192.168.0.10:35000".into(),
        }
    }
}

impl FromStr for AdapterConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(address) = s.strip_prefix("tcp://") {
            if address.is_empty() {
                bail!("missing address in adapter URL: {}", s);
            }
            return Ok(AdapterConfig::Tcp {
                address: address.into(),
            });
        }

        if let Some(rest) = s.strip_prefix("serial://") {
            let (path, baud_rate) = match rest.rsplit_once('@') {
                Some((path, baud)) => (
                    path,
                    baud.parse::<u32>()
                        .with_context(|| format!("invalid baud rate: {}", baud))?,
                ),
                None => (rest, DEFAULT_BAUD_RATE),
            };
            if path.is_empty() {
                bail!("missing device path in adapter URL: {}", s);
            }
            return Ok(AdapterConfig::Serial {
                path: path.into(),
                baud_rate,
            });
        }

        Err(anyhow!("unsupported adapter URL (expected tcp:// or serial://): {}", s))
    }
}

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Adapter link
    pub adapter: AdapterConfig,
    /// Delay between batch dispatches
    pub poll_interval: Duration,
    /// Maximum wait for a single adapter reply
    pub read_timeout: Duration,
    /// Pause between writing a request and reading its reply
    pub response_delay: Option<Duration>,
    /// Decode PID replies into engineering units
    pub convert_raw_data: bool,
    /// Report imperial instead of metric units
    pub imperial_units: bool,
    /// Stop after this many poll cycles
    pub max_cycles: Option<u64>,
    /// Decode a file of recorded raw results instead of polling
    pub replay: Option<PathBuf>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::default(),
            poll_interval: Duration::from_millis(1000),
            read_timeout: Duration::from_secs(5),
            response_delay: None,
            convert_raw_data: true,
            imperial_units: false,
            max_cycles: None,
            replay: None,
        }
    }
}

impl PollerConfig {
    /// Build from defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults overridden by `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(adapter) = lookup("OBD_ADAPTER") {
            config.adapter = adapter.parse()?;
        }
        if let Some(ms) = lookup("OBD_POLL_INTERVAL_MS") {
            config.poll_interval = parse_millis("OBD_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("OBD_READ_TIMEOUT_MS") {
            config.read_timeout = parse_millis("OBD_READ_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = lookup("OBD_RESPONSE_DELAY_MS") {
            let delay = parse_millis("OBD_RESPONSE_DELAY_MS", &ms)?;
            config.response_delay = (!delay.is_zero()).then_some(delay);
        }
        if let Some(flag) = lookup("OBD_CONVERT_RAW") {
            config.convert_raw_data = parse_flag("OBD_CONVERT_RAW", &flag)?;
        }
        if let Some(flag) = lookup("OBD_IMPERIAL") {
            config.imperial_units = parse_flag("OBD_IMPERIAL", &flag)?;
        }

        if let Some(cycles) = lookup("OBD_MAX_CYCLES") {
            let cycles = cycles
                .trim()
                .parse::<u64>()
                .with_context(|| format!("OBD_MAX_CYCLES must be a number, got {:?}", cycles))?;
            config.max_cycles = Some(cycles);
        }
        if let Some(path) = lookup("OBD_REPLAY") {
            config.replay = Some(PathBuf::from(path));
        }

        if config.poll_interval.is_zero() {
            bail!("OBD_POLL_INTERVAL_MS must be greater than zero");
        }

        Ok(config)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number of milliseconds, got {:?}", key, value))?;
    Ok(Duration::from_millis(ms))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{} must be a boolean, got {:?}", key, other)),
    }
}
