//! ELM327 adapter commands
//!
//! This module handles:
//! - Framing requests and reading prompt-terminated replies
//! - Detecting adapter error replies
//! - AT set-up commands and mode 01 PID requests

mod at;
pub mod exchange;
mod pid;
pub mod response;

pub use at::AtCommand;
pub use exchange::{ExchangeOptions, Interrupt};
pub use pid::{Measurement, Pid, PidCommand};

/// Mode 01 PIDs polled by default
pub mod pids {
    use super::{Measurement, Pid};

    pub const ENGINE_LOAD: Pid = Pid::new("Engine Load", 0x04, Measurement::Percentage);
    pub const COOLANT_TEMPERATURE: Pid =
        Pid::new("Engine Coolant Temperature", 0x05, Measurement::Temperature);
    pub const ENGINE_RPM: Pid = Pid::new("Engine RPM", 0x0C, Measurement::EngineRpm);
    pub const VEHICLE_SPEED: Pid = Pid::new("Vehicle Speed", 0x0D, Measurement::VehicleSpeed);
    pub const INTAKE_AIR_TEMPERATURE: Pid =
        Pid::new("Air Intake Temperature", 0x0F, Measurement::Temperature);
    pub const THROTTLE_POSITION: Pid =
        Pid::new("Throttle Position", 0x11, Measurement::Percentage);
}
