//! Multi-probe temperature bus backend (DS18B20 family).
//!
//! Each poll acquires every bus fresh, rescans it, requests a conversion and
//! reads every probe. Identifiers are the probe's 8-byte address in hex, so a
//! physical probe keeps its identifier when others are added or removed.

use super::{SensorBackend, SensorType};
use crate::hardware::{ProbeAddress, ProbeBusPort};
use crate::model::{SensorId, SensorSnapshot, MAX_SENSORS, VALUE_DECIMALS};
use std::fmt::Write;
use tracing::{debug, info, warn};

/// Value reported for a probe that could not be read.
pub const PROBE_ERROR_VALUE: f32 = -127.0;

struct BusState {
    port: Box<dyn ProbeBusPort>,
    label: String,
    addresses: Vec<ProbeAddress>,
}

/// A rescan that found a different number of probes than the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCountChange {
    pub bus: String,
    pub was: usize,
    pub now: usize,
}

pub struct MultiProbeBus {
    buses: Vec<BusState>,
    snapshot: SensorSnapshot,
    last_count_change: Option<ProbeCountChange>,
}

impl MultiProbeBus {
    pub fn new(ports: Vec<Box<dyn ProbeBusPort>>) -> Self {
        let buses = ports
            .into_iter()
            .map(|port| BusState {
                label: port.label(),
                port,
                addresses: Vec::new(),
            })
            .collect();
        Self {
            buses,
            snapshot: SensorSnapshot::new(),
            last_count_change: None,
        }
    }

    /// Most recent probe count change seen by a poll.
    pub fn last_count_change(&self) -> Option<&ProbeCountChange> {
        self.last_count_change.as_ref()
    }

    /// Probe count last adopted for each bus, in bus order.
    pub fn bus_probe_counts(&self) -> Vec<usize> {
        self.buses.iter().map(|b| b.addresses.len()).collect()
    }
}

/// Rescan one bus and read all its probes into `readings`.
///
/// Returns the count change when the rescan found a different number of probes.
fn read_bus(
    bus: &mut BusState,
    readings: &mut Vec<(ProbeAddress, f32)>,
) -> Option<ProbeCountChange> {
    let mut handle = match bus.port.acquire() {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Bus {} unavailable: {}", bus.label, e);
            readings.extend(bus.addresses.iter().map(|a| (*a, PROBE_ERROR_VALUE)));
            return None;
        }
    };

    let mut change = None;
    match handle.scan() {
        Ok(found) => {
            if found.len() != bus.addresses.len() {
                info!(
                    "Detected probe count change on bus {} - was {} now {}",
                    bus.label,
                    bus.addresses.len(),
                    found.len()
                );
                change = Some(ProbeCountChange {
                    bus: bus.label.clone(),
                    was: bus.addresses.len(),
                    now: found.len(),
                });
            }
            bus.addresses = found;
        }
        Err(e) => warn!("Scan of bus {} failed, keeping {} probes: {}", bus.label, bus.addresses.len(), e),
    }

    if let Err(e) = handle.request_conversions() {
        warn!("Conversion request on bus {} failed: {}", bus.label, e);
        readings.extend(bus.addresses.iter().map(|a| (*a, PROBE_ERROR_VALUE)));
        return change;
    }

    for address in &bus.addresses {
        let value = handle.read_celsius(address).unwrap_or_else(|e| {
            debug!("Probe {} on bus {}: {}", address, bus.label, e);
            PROBE_ERROR_VALUE
        });
        readings.push((*address, value));
    }
    change
}

impl SensorBackend for MultiProbeBus {
    fn sensor_type(&self) -> Option<SensorType> {
        Some(SensorType::MultiProbeBus)
    }

    fn initialize(&mut self) {
        for bus in &mut self.buses {
            let found = match bus.port.acquire().and_then(|mut h| h.scan()) {
                Ok(found) => found,
                Err(e) => {
                    warn!("Initial scan of bus {} failed: {}", bus.label, e);
                    continue;
                }
            };
            info!("Found {} DS18B20 sensors on bus {}", found.len(), bus.label);
            for address in &found {
                debug!("  {}", address);
            }
            bus.addresses = found;
        }
    }

    fn poll(&mut self) -> &SensorSnapshot {
        let mut readings = Vec::new();
        for bus in &mut self.buses {
            if let Some(change) = read_bus(bus, &mut readings) {
                self.last_count_change = Some(change);
            }
        }

        if readings.len() > MAX_SENSORS {
            warn!(
                "{} probes found, only the first {} are reported",
                readings.len(),
                MAX_SENSORS
            );
        }

        let mut snapshot = SensorSnapshot::new();
        for (address, value) in readings.into_iter().take(MAX_SENSORS) {
            if let Some(id) = SensorId::new(&address.to_string()) {
                snapshot.push(id, value);
            }
        }
        self.snapshot = snapshot;
        &self.snapshot
    }

    fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    fn describe(&self) -> String {
        if self.snapshot.is_empty() {
            return "No DS18B20 sensors found on bus".to_string();
        }
        let mut out = String::new();
        for reading in self.snapshot.iter() {
            let _ = writeln!(out, "{}: {:.*}", reading.id, VALUE_DECIMALS, reading.value);
        }
        out.trim_end().to_string()
    }
}
