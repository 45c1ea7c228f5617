//! Combined temperature/humidity sensor backend (DHT22).

use super::{SensorBackend, SensorType};
use crate::hardware::ClimatePort;
use crate::model::{DeviceIdentity, SensorId, SensorSnapshot};
use tracing::{info, warn};

pub struct ComboTempHumidity {
    port: Box<dyn ClimatePort>,
    temperature_id: SensorId,
    humidity_id: SensorId,
    snapshot: SensorSnapshot,
}

impl ComboTempHumidity {
    pub fn new(port: Box<dyn ClimatePort>, identity: &DeviceIdentity) -> Self {
        Self {
            port,
            temperature_id: SensorId::derived(identity, "_temp"),
            humidity_id: SensorId::derived(identity, "_hum"),
            snapshot: SensorSnapshot::new(),
        }
    }
}

impl SensorBackend for ComboTempHumidity {
    fn sensor_type(&self) -> Option<SensorType> {
        Some(SensorType::ComboTempHumidity)
    }

    fn initialize(&mut self) {
        info!(
            "DHT22 on {} reports as {} and {}",
            self.port.label(),
            self.temperature_id,
            self.humidity_id
        );
    }

    fn poll(&mut self) -> &SensorSnapshot {
        let sample = self.port.acquire().and_then(|mut sensor| sensor.read());
        let (temperature, humidity) = match sample {
            Ok(sample) => (sample.celsius, sample.relative_humidity),
            Err(e) => {
                warn!("DHT22 read on {} failed: {}", self.port.label(), e);
                (f32::NAN, f32::NAN)
            }
        };

        let mut snapshot = SensorSnapshot::new();
        snapshot.push(self.temperature_id.clone(), temperature);
        snapshot.push(self.humidity_id.clone(), humidity);
        self.snapshot = snapshot;
        &self.snapshot
    }

    fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    fn describe(&self) -> String {
        let readings = self.snapshot.readings();
        match readings {
            [temperature, humidity] => format!(
                "{}: {} (temperature)\n{}: {} (humidity)",
                temperature.id, temperature.value, humidity.id, humidity.value
            ),
            _ => "No DHT22 reading yet".to_string(),
        }
    }
}
