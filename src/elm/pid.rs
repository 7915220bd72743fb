//! Mode 01 (current data) PID requests

use super::exchange::{exchange, ExchangeOptions};
use super::response::{check_for_errors, clean_response, parse_hex_bytes, ResponseError};
use async_trait::async_trait;
use obd_shared::{CommandError, InputStream, ObdCommand, OutputStream};
use tracing::{debug, warn};

/// Service mode for current powertrain data
pub const MODE_CURRENT_DATA: u8 = 0x01;

/// Offset added to the mode byte in a positive reply
const POSITIVE_REPLY_OFFSET: u8 = 0x40;

/// How a PID's data bytes map to a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    /// `(256A + B) / 4` rpm
    EngineRpm,
    /// `A` km/h
    VehicleSpeed,
    /// `A - 40` degrees Celsius
    Temperature,
    /// `100A / 255` percent
    Percentage,
}

impl Measurement {
    /// Number of data bytes following the mode/PID header
    pub fn data_bytes(self) -> usize {
        match self {
            Measurement::EngineRpm => 2,
            _ => 1,
        }
    }

    fn format(self, data: &[u8], imperial: bool) -> String {
        match self {
            Measurement::EngineRpm => {
                let rpm = (u32::from(data[0]) * 256 + u32::from(data[1])) / 4;
                format!("{}RPM", rpm)
            }
            Measurement::VehicleSpeed => {
                let kmh = f32::from(data[0]);
                if imperial {
                    format!("{:.2}mph", kmh * 0.621_371)
                } else {
                    format!("{}km/h", data[0])
                }
            }
            Measurement::Temperature => {
                let celsius = f32::from(data[0]) - 40.0;
                if imperial {
                    format!("{:.1}F", celsius * 1.8 + 32.0)
                } else {
                    format!("{:.1}C", celsius)
                }
            }
            Measurement::Percentage => {
                format!("{:.1}%", f32::from(data[0]) * 100.0 / 255.0)
            }
        }
    }
}

/// A mode 01 parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pid {
    pub name: &'static str,
    pub code: u8,
    pub measurement: Measurement,
}

impl Pid {
    pub const fn new(name: &'static str, code: u8, measurement: Measurement) -> Self {
        Self {
            name,
            code,
            measurement,
        }
    }

    /// Request text, e.g. `01 0C`
    pub fn request(&self) -> String {
        format!("{:02X} {:02X}", MODE_CURRENT_DATA, self.code)
    }

    /// Decode a cleaned reply such as `410C1AF8`
    pub fn decode(&self, cleaned: &str, imperial: bool) -> Result<String, ResponseError> {
        check_for_errors(cleaned)?;
        let bytes = parse_hex_bytes(cleaned)?;

        let needed = 2 + self.measurement.data_bytes();
        if bytes.len() < needed
            || bytes[0] != MODE_CURRENT_DATA + POSITIVE_REPLY_OFFSET
            || bytes[1] != self.code
        {
            return Err(ResponseError::Malformed(cleaned.to_string()));
        }

        Ok(self.measurement.format(&bytes[2..needed], imperial))
    }
}

/// Command polling a single PID
#[derive(Debug, Clone)]
pub struct PidCommand {
    pid: Pid,
    options: ExchangeOptions,
    raw: String,
    formatted: String,
    convert: bool,
    imperial: bool,
}

impl PidCommand {
    /// Create a command that decodes replies in metric units
    pub fn new(pid: Pid, options: ExchangeOptions) -> Self {
        Self {
            pid,
            options,
            raw: String::new(),
            formatted: String::new(),
            convert: true,
            imperial: false,
        }
    }

    /// Report imperial units
    pub fn with_imperial_units(mut self, imperial: bool) -> Self {
        self.imperial = imperial;
        self
    }
}

#[async_trait]
impl ObdCommand for PidCommand {
    async fn run(
        &mut self,
        input: &mut InputStream,
        output: &mut OutputStream,
    ) -> Result<(), CommandError> {
        let reply = exchange(input, output, &self.pid.request(), &self.options).await?;
        self.raw = clean_response(&reply);
        debug!("{}: {}", self.pid.name, self.raw);

        let raw = self.raw.clone();
        self.convert_raw_data(&raw);
        Ok(())
    }

    fn convert_raw_data(&mut self, raw_field: &str) {
        if !self.convert {
            self.formatted = raw_field.to_string();
            return;
        }

        self.formatted = match self.pid.decode(raw_field, self.imperial) {
            Ok(value) => value,
            Err(e) => {
                warn!("{}: {}", self.pid.name, e);
                e.to_string()
            }
        };
    }

    fn result(&self) -> String {
        self.raw.clone()
    }

    fn formatted_result(&self) -> String {
        self.formatted.clone()
    }

    fn set_convert_raw_data(&mut self, convert: bool) {
        self.convert = convert;
    }
}
