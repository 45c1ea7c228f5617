//! Sensor backends.
//!
//! Exactly one backend is active per boot, chosen from the `sensor_type`
//! configuration field:
//! - `DS18B20` → [`MultiProbeBus`]: any number of probes over one or more buses
//! - `DHT22` → [`ComboTempHumidity`]: one temperature and one humidity reading
//! - `BINARY` → [`BinarySwitch`]: one on/off reading
//!
//! An unknown or empty selector, or a selector whose hardware is missing,
//! yields [`NoSensor`], which produces zero readings.

mod combo;
mod probe_bus;
mod switch;

pub use combo::ComboTempHumidity;
pub use probe_bus::{MultiProbeBus, ProbeCountChange, PROBE_ERROR_VALUE};
pub use switch::BinarySwitch;

use crate::hardware::{ClimatePort, ProbeBusPort, SwitchPort};
use crate::model::{DeviceIdentity, SensorSnapshot};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Capability shared by all sensor variants.
pub trait SensorBackend {
    /// Variant of this backend, `None` for [`NoSensor`].
    fn sensor_type(&self) -> Option<SensorType>;

    /// Discover hardware and prepare identifiers. Called once at boot.
    fn initialize(&mut self);

    /// Take fresh readings, replacing the previous snapshot.
    fn poll(&mut self) -> &SensorSnapshot;

    /// Readings of the last poll.
    fn snapshot(&self) -> &SensorSnapshot;

    /// Printable summary of the last poll, one line per reading.
    fn describe(&self) -> String;
}

/// Selectable backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    MultiProbeBus,
    ComboTempHumidity,
    BinarySwitch,
}

impl SensorType {
    pub const ALL: [SensorType; 3] = [
        SensorType::MultiProbeBus,
        SensorType::ComboTempHumidity,
        SensorType::BinarySwitch,
    ];

    /// Selector string as stored in the configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::MultiProbeBus => "DS18B20",
            SensorType::ComboTempHumidity => "DHT22",
            SensorType::BinarySwitch => "BINARY",
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised sensor type selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown sensor type: '{0}'")]
pub struct UnknownSensorType(pub String);

impl FromStr for SensorType {
    type Err = UnknownSensorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownSensorType(s.to_string()))
    }
}

/// Hardware available to the backends on this board.
#[derive(Default)]
pub struct SensorHardware {
    pub probe_buses: Vec<Box<dyn ProbeBusPort>>,
    pub climate: Option<Box<dyn ClimatePort>>,
    pub switch: Option<Box<dyn SwitchPort>>,
}

/// Build and initialize the backend named by `selector`.
///
/// Never fails: mismatches are logged and produce a [`NoSensor`] backend.
pub fn select_backend(
    selector: &str,
    identity: &DeviceIdentity,
    hardware: SensorHardware,
) -> Box<dyn SensorBackend> {
    let mut backend: Box<dyn SensorBackend> = match selector.parse::<SensorType>() {
        Ok(SensorType::MultiProbeBus) if !hardware.probe_buses.is_empty() => {
            let labels: Vec<String> = hardware.probe_buses.iter().map(|p| p.label()).collect();
            info!("Using DS18B20 on <{}>", labels.join(", "));
            Box::new(MultiProbeBus::new(hardware.probe_buses))
        }
        Ok(SensorType::ComboTempHumidity) => match hardware.climate {
            Some(port) => {
                info!("Using DHT22 on <{}>", port.label());
                Box::new(ComboTempHumidity::new(port, identity))
            }
            None => missing_hardware(SensorType::ComboTempHumidity),
        },
        Ok(SensorType::BinarySwitch) => match hardware.switch {
            Some(port) => {
                info!("Using binary sensor on <{}>", port.label());
                Box::new(BinarySwitch::new(port, identity))
            }
            None => missing_hardware(SensorType::BinarySwitch),
        },
        Ok(sensor_type) => missing_hardware(sensor_type),
        Err(e) => {
            warn!("Undefined sensor type set... ({})", e);
            Box::new(NoSensor::default())
        }
    };

    backend.initialize();
    backend
}

fn missing_hardware(sensor_type: SensorType) -> Box<dyn SensorBackend> {
    warn!("Sensor type {} selected but no hardware is wired for it", sensor_type);
    Box::new(NoSensor::default())
}

/// Backend used when no valid sensor type is configured.
#[derive(Debug, Default)]
pub struct NoSensor {
    snapshot: SensorSnapshot,
}

impl SensorBackend for NoSensor {
    fn sensor_type(&self) -> Option<SensorType> {
        None
    }

    fn initialize(&mut self) {}

    fn poll(&mut self) -> &SensorSnapshot {
        &self.snapshot
    }

    fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    fn describe(&self) -> String {
        "No sensor type configured".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::hardware::{ClimateSample, ClimateSensor, HardwareError};
    use crate::model::MAX_SENSOR_ID_LEN;

    const IDENTITY: DeviceIdentity = DeviceIdentity([0x24, 0x6F, 0x28, 0x01, 0x02, 0x03]);

    struct FixedClimate;

    impl ClimateSensor for FixedClimate {
        fn read(&mut self) -> Result<ClimateSample, HardwareError> {
            Ok(ClimateSample {
                celsius: 21.5,
                relative_humidity: 40.0,
            })
        }
    }

    impl ClimatePort for FixedClimate {
        fn label(&self) -> String {
            "pin 4".to_string()
        }

        fn acquire(&mut self) -> Result<Box<dyn ClimateSensor + '_>, HardwareError> {
            Ok(Box::new(FixedClimate))
        }
    }

    #[test]
    fn test_sensor_type_parsing() {
        assert_eq!("DS18B20".parse::<SensorType>(), Ok(SensorType::MultiProbeBus));
        assert_eq!("DHT22".parse::<SensorType>(), Ok(SensorType::ComboTempHumidity));
        assert_eq!("BINARY".parse::<SensorType>(), Ok(SensorType::BinarySwitch));
        assert!("dht22".parse::<SensorType>().is_err());
        assert!("".parse::<SensorType>().is_err());
        assert_eq!(
            "PT100".parse::<SensorType>().unwrap_err().to_string(),
            "Unknown sensor type: 'PT100'"
        );
    }

    #[test]
    fn test_unknown_selector_yields_no_readings() {
        let mut backend = select_backend("THERMOCOUPLE", &IDENTITY, SensorHardware::default());
        assert_eq!(backend.sensor_type(), None);
        assert!(backend.poll().is_empty());
    }

    #[test]
    fn test_selector_without_hardware_yields_no_readings() {
        let mut backend = select_backend("DHT22", &IDENTITY, SensorHardware::default());
        assert_eq!(backend.sensor_type(), None);
        assert!(backend.poll().is_empty());
    }

    #[test]
    fn test_selects_combo_backend() {
        let hardware = SensorHardware {
            climate: Some(Box::new(FixedClimate)),
            ..Default::default()
        };
        let mut backend = select_backend("DHT22", &IDENTITY, hardware);
        assert_eq!(backend.sensor_type(), Some(SensorType::ComboTempHumidity));
        assert_eq!(backend.poll().len(), 2);
    }

    #[test]
    fn test_every_variant_respects_reading_bounds() {
        let many: Vec<_> = (0..8).map(address).collect();
        let more: Vec<_> = (10..18).map(address).collect();
        let hardware = SensorHardware {
            probe_buses: vec![
                Box::new(FakeBus::with_scans("pin 14", vec![many])),
                Box::new(FakeBus::with_scans("pin 12", vec![more])),
            ],
            climate: Some(Box::new(FixedClimate)),
            ..Default::default()
        };

        let mut backend = select_backend("DS18B20", &IDENTITY, hardware);
        let snapshot = backend.poll();
        assert!(snapshot.len() <= crate::model::MAX_SENSORS);
        for reading in snapshot.iter() {
            assert!(!reading.id.as_str().is_empty());
            assert!(reading.id.as_str().len() <= MAX_SENSOR_ID_LEN);
        }
    }
}
