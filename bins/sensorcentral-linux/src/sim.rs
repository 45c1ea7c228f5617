//! Simulated board: sensors, switch input and a file-backed durable region.
//!
//! Sensor values drift slowly with wall-clock time so consecutive polls
//! differ a little, like real probes in a room.

use sensorcentral_core::config::REGION_LEN;
use sensorcentral_core::hardware::{
    ClimatePort, ClimateSample, ClimateSensor, HardwareError, ProbeAddress, ProbeBus,
    ProbeBusPort, SwitchInput, SwitchPort,
};
use sensorcentral_core::{DurableRegion, SensorHardware, StorageError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn seconds() -> f32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() % 86_400) as f32)
        .unwrap_or_default()
}

/// Slow oscillation around `base`, phase-shifted by `seed`.
fn drift(base: f32, amplitude: f32, seed: u8) -> f32 {
    base + amplitude * (seconds() / 600.0 + f32::from(seed)).sin()
}

// ============================================================================
// Probe buses
// ============================================================================

pub struct SimulatedProbeBus {
    label: String,
    probes: Vec<ProbeAddress>,
}

impl SimulatedProbeBus {
    /// Bus with `count` probes whose addresses start with `bus_id`.
    pub fn new(label: &str, bus_id: u8, count: u8) -> Self {
        let probes = (0..count)
            .map(|i| ProbeAddress([0x28, bus_id, 0x53, 0x43, 0x00, 0x00, 0x00, i]))
            .collect();
        Self {
            label: label.to_string(),
            probes,
        }
    }
}

struct AcquiredBus<'a>(&'a SimulatedProbeBus);

impl ProbeBus for AcquiredBus<'_> {
    fn scan(&mut self) -> Result<Vec<ProbeAddress>, HardwareError> {
        Ok(self.0.probes.clone())
    }

    fn request_conversions(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn read_celsius(&mut self, address: &ProbeAddress) -> Result<f32, HardwareError> {
        Ok(drift(20.0, 2.5, address.0[1] ^ address.0[7]))
    }
}

impl ProbeBusPort for SimulatedProbeBus {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn acquire(&mut self) -> Result<Box<dyn ProbeBus + '_>, HardwareError> {
        Ok(Box::new(AcquiredBus(self)))
    }
}

// ============================================================================
// Climate sensor and switch
// ============================================================================

pub struct SimulatedClimate;

impl ClimateSensor for SimulatedClimate {
    fn read(&mut self) -> Result<ClimateSample, HardwareError> {
        Ok(ClimateSample {
            celsius: drift(21.0, 1.5, 3),
            relative_humidity: drift(45.0, 10.0, 7),
        })
    }
}

impl ClimatePort for SimulatedClimate {
    fn label(&self) -> String {
        "simulated DHT22".to_string()
    }

    fn acquire(&mut self) -> Result<Box<dyn ClimateSensor + '_>, HardwareError> {
        Ok(Box::new(SimulatedClimate))
    }
}

/// Switch that toggles every minute.
pub struct SimulatedSwitch;

impl SwitchInput for SimulatedSwitch {
    fn is_on(&mut self) -> Result<bool, HardwareError> {
        Ok((seconds() as u32 / 60) % 2 == 1)
    }
}

impl SwitchPort for SimulatedSwitch {
    fn label(&self) -> String {
        "simulated switch".to_string()
    }

    fn acquire(&mut self) -> Result<Box<dyn SwitchInput + '_>, HardwareError> {
        Ok(Box::new(SimulatedSwitch))
    }
}

/// Everything a real board might have wired: two probe buses, a climate
/// sensor and a switch. The configured sensor type picks one of them.
pub fn simulated_hardware() -> SensorHardware {
    SensorHardware {
        probe_buses: vec![
            Box::new(SimulatedProbeBus::new("sim bus A", 0xA1, 3)),
            Box::new(SimulatedProbeBus::new("sim bus B", 0xB2, 1)),
        ],
        climate: Some(Box::new(SimulatedClimate)),
        switch: Some(Box::new(SimulatedSwitch)),
    }
}

// ============================================================================
// File-backed region
// ============================================================================

/// Durable region kept in a file. Writes are staged in memory until commit.
pub struct FileRegion {
    path: PathBuf,
    bytes: Vec<u8>,
    fresh: bool,
}

impl FileRegion {
    /// Open `path`, starting from an erased region when the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let (mut bytes, fresh) = match fs::read(&path) {
            Ok(bytes) => (bytes, false),
            Err(e) if e.kind() == ErrorKind::NotFound => (Vec::new(), true),
            Err(e) => return Err(StorageError::ReadError(format!("{}: {}", path.display(), e))),
        };
        bytes.resize(REGION_LEN, 0xFF);
        Ok(Self { path, bytes, fresh })
    }

    /// Whether the backing file did not exist when opened.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check(&self, offset: usize, len: usize) -> Result<(), StorageError> {
        if offset.checked_add(len).map_or(true, |end| end > self.bytes.len()) {
            return Err(StorageError::OutOfBounds {
                offset,
                len,
                region: self.bytes.len(),
            });
        }
        Ok(())
    }
}

impl DurableRegion for FileRegion {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check(offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StorageError> {
        self.check(offset, bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        fs::write(&self.path, &self.bytes)
            .map_err(|e| StorageError::WriteError(format!("{}: {}", self.path.display(), e)))?;
        self.fresh = false;
        Ok(())
    }
}
