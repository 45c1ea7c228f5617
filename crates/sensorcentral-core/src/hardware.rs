//! Hardware abstraction traits.
//!
//! Sensor backends never hold a driver across polls. Each poll asks a *port*
//! for a freshly acquired handle and drops it when the poll is done, so a
//! port is the long-lived object and the handle is scoped to one poll.
//!
//! Platform crates implement these traits for real pins; tests and the
//! simulator implement them in memory.

use std::fmt;
use thiserror::Error;

/// Errors reported by sensor hardware.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    /// The device did not answer.
    #[error("Device not responding")]
    NotResponding,

    /// The device answered with data that failed validation.
    #[error("Checksum mismatch")]
    Checksum,

    /// The bus or pin could not be acquired.
    #[error("Bus unavailable: {0}")]
    BusUnavailable(String),

    /// Any other driver failure.
    #[error("Driver error: {0}")]
    Driver(String),
}

/// Globally unique 8-byte address of a probe on a multi-device bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeAddress(pub [u8; 8]);

/// Sixteen uppercase hex characters, family code first.
impl fmt::Display for ProbeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// An acquired multi-device bus.
pub trait ProbeBus {
    /// Enumerate the probes currently present, in bus order.
    fn scan(&mut self) -> Result<Vec<ProbeAddress>, HardwareError>;

    /// Start a conversion on every probe and wait for it to finish.
    fn request_conversions(&mut self) -> Result<(), HardwareError>;

    /// Read the converted temperature of one probe, in degrees Celsius.
    fn read_celsius(&mut self, address: &ProbeAddress) -> Result<f32, HardwareError>;
}

/// Long-lived handle to one probe bus (one data pin).
pub trait ProbeBusPort {
    /// Human-readable bus name used in logs, e.g. `pin 14`.
    fn label(&self) -> String;

    /// Acquire the bus for the duration of one poll.
    fn acquire(&mut self) -> Result<Box<dyn ProbeBus + '_>, HardwareError>;
}

/// One combined temperature/humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub celsius: f32,
    pub relative_humidity: f32,
}

/// An acquired temperature/humidity sensor.
pub trait ClimateSensor {
    fn read(&mut self) -> Result<ClimateSample, HardwareError>;
}

/// Long-lived handle to a temperature/humidity sensor.
pub trait ClimatePort {
    fn label(&self) -> String;

    fn acquire(&mut self) -> Result<Box<dyn ClimateSensor + '_>, HardwareError>;
}

/// An acquired digital input.
pub trait SwitchInput {
    /// Logical state of the input (`true` = on).
    fn is_on(&mut self) -> Result<bool, HardwareError>;
}

/// Long-lived handle to a digital input.
pub trait SwitchPort {
    fn label(&self) -> String;

    fn acquire(&mut self) -> Result<Box<dyn SwitchInput + '_>, HardwareError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_address_hex() {
        let address = ProbeAddress([0x28, 0xFF, 0x4C, 0x06, 0xA1, 0x16, 0x04, 0x9E]);
        let text = address.to_string();
        assert_eq!(text, "28FF4C06A116049E");
        assert_eq!(text.len(), 16);
    }
}
