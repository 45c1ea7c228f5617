//! Binary switch backend: one digital input reported as `1.0` or `0.0`.

use super::{SensorBackend, SensorType};
use crate::hardware::SwitchPort;
use crate::model::{DeviceIdentity, SensorId, SensorSnapshot};
use tracing::{info, warn};

pub struct BinarySwitch {
    port: Box<dyn SwitchPort>,
    id: SensorId,
    snapshot: SensorSnapshot,
}

impl BinarySwitch {
    pub fn new(port: Box<dyn SwitchPort>, identity: &DeviceIdentity) -> Self {
        Self {
            port,
            id: SensorId::derived(identity, "_binary"),
            snapshot: SensorSnapshot::new(),
        }
    }
}

impl SensorBackend for BinarySwitch {
    fn sensor_type(&self) -> Option<SensorType> {
        Some(SensorType::BinarySwitch)
    }

    fn initialize(&mut self) {
        info!("Binary input on {} reports as {}", self.port.label(), self.id);
    }

    fn poll(&mut self) -> &SensorSnapshot {
        let value = match self.port.acquire().and_then(|mut input| input.is_on()) {
            Ok(true) => 1.0,
            Ok(false) => 0.0,
            Err(e) => {
                warn!("Binary input on {} failed: {}", self.port.label(), e);
                f32::NAN
            }
        };

        let mut snapshot = SensorSnapshot::new();
        snapshot.push(self.id.clone(), value);
        self.snapshot = snapshot;
        &self.snapshot
    }

    fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    fn describe(&self) -> String {
        match self.snapshot.readings().first() {
            Some(r) if r.value.is_nan() => format!("{}: UNKNOWN", r.id),
            Some(r) if r.value > 0.0 => format!("{}: ON", r.id),
            Some(r) => format!("{}: OFF", r.id),
            None => "No binary reading yet".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HardwareError, SwitchInput};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Toggle(Rc<Cell<Option<bool>>>);

    impl SwitchInput for Toggle {
        fn is_on(&mut self) -> Result<bool, HardwareError> {
            self.0.get().ok_or(HardwareError::NotResponding)
        }
    }

    impl SwitchPort for Toggle {
        fn label(&self) -> String {
            "pin 5".to_string()
        }

        fn acquire(&mut self) -> Result<Box<dyn SwitchInput + '_>, HardwareError> {
            Ok(Box::new(self.clone()))
        }
    }

    #[test]
    fn test_reports_latched_state() {
        let toggle = Toggle::default();
        toggle.0.set(Some(true));
        let identity = DeviceIdentity([0x24, 0x6F, 0x28, 0x01, 0x02, 0x03]);
        let mut backend = BinarySwitch::new(Box::new(toggle.clone()), &identity);

        let reading = backend.poll().readings()[0].clone();
        assert_eq!(reading.id.as_str(), "246F28010203_binary");
        assert_eq!(reading.value, 1.0);
        assert_eq!(backend.describe(), "246F28010203_binary: ON");

        toggle.0.set(Some(false));
        assert_eq!(backend.poll().readings()[0].value, 0.0);
        assert_eq!(backend.describe(), "246F28010203_binary: OFF");

        toggle.0.set(None);
        assert!(backend.poll().readings()[0].value.is_nan());
        assert_eq!(backend.poll().len(), 1);
    }

    #[test]
    fn test_initialize_logs_generated_id() {
        let identity = DeviceIdentity([0x24, 0x6F, 0x28, 0x01, 0x02, 0x03]);
        let mut backend = BinarySwitch::new(Box::new(Toggle::default()), &identity);
        let logged = super::super::testing::capture_logs(|| backend.initialize());
        assert!(logged.contains("Binary input on pin 5 reports as 246F28010203_binary"));
    }
}
