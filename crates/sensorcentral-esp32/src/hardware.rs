//! Sensor and indicator pins.
//!
//! Ports own their GPIO and hand out a fresh driver on every `acquire`, so
//! no bus state survives between polls.

use crate::describe;
use anyhow::Result;
use dht_sensor::{dht22, DhtError, DhtReading};
use ds18b20::{Ds18b20, Resolution};
use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, Input, InputOutput, PinDriver, Pull};
use esp_idf_svc::sys::EspError;
use log::warn;
use one_wire_bus::{Address, OneWire, OneWireError};
use sensorcentral_core::hardware::{
    ClimatePort, ClimateSample, ClimateSensor, HardwareError, ProbeAddress, ProbeBus,
    ProbeBusPort, SwitchInput, SwitchPort,
};
use sensorcentral_node::IndicatorPins;

fn one_wire_error(e: OneWireError<EspError>) -> HardwareError {
    match e {
        OneWireError::BusNotHigh => HardwareError::BusUnavailable("bus held low".into()),
        OneWireError::CrcMismatch => HardwareError::Checksum,
        other => HardwareError::Driver(describe(other)),
    }
}

// ============================================================================
// 1-Wire DS18B20 bus
// ============================================================================

pub struct OneWirePort {
    pin: AnyIOPin,
    label: String,
}

impl OneWirePort {
    pub fn new(pin: AnyIOPin, label: &str) -> Self {
        Self {
            pin,
            label: label.to_string(),
        }
    }
}

struct OneWireBus<'a> {
    bus: OneWire<PinDriver<'a, AnyIOPin, InputOutput>>,
    delay: Ets,
}

impl ProbeBus for OneWireBus<'_> {
    fn scan(&mut self) -> Result<Vec<ProbeAddress>, HardwareError> {
        let mut found = Vec::new();
        for address in self.bus.devices(false, &mut self.delay) {
            let address = address.map_err(one_wire_error)?;
            if address.family_code() == ds18b20::FAMILY_CODE {
                found.push(ProbeAddress(address.0.to_le_bytes()));
            }
        }
        Ok(found)
    }

    fn request_conversions(&mut self) -> Result<(), HardwareError> {
        ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay)
            .map_err(one_wire_error)?;
        Resolution::Bits12.delay_for_measurement_time(&mut self.delay);
        Ok(())
    }

    fn read_celsius(&mut self, address: &ProbeAddress) -> Result<f32, HardwareError> {
        let sensor = Ds18b20::new::<EspError>(Address(u64::from_le_bytes(address.0)))
            .map_err(one_wire_error)?;
        let data = sensor
            .read_data(&mut self.bus, &mut self.delay)
            .map_err(one_wire_error)?;
        Ok(data.temperature)
    }
}

impl ProbeBusPort for OneWirePort {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn acquire(&mut self) -> Result<Box<dyn ProbeBus + '_>, HardwareError> {
        let mut pin = PinDriver::input_output_od(&mut self.pin)
            .map_err(|e| HardwareError::BusUnavailable(describe(e)))?;
        pin.set_pull(Pull::Up)
            .map_err(|e| HardwareError::BusUnavailable(describe(e)))?;
        let bus = OneWire::new(pin).map_err(one_wire_error)?;
        Ok(Box::new(OneWireBus { bus, delay: Ets }))
    }
}

// ============================================================================
// DHT22
// ============================================================================

pub struct Dht22Port {
    pin: AnyIOPin,
    label: String,
}

impl Dht22Port {
    pub fn new(pin: AnyIOPin, label: &str) -> Self {
        Self {
            pin,
            label: label.to_string(),
        }
    }
}

struct Dht22<'a> {
    pin: PinDriver<'a, AnyIOPin, InputOutput>,
}

impl ClimateSensor for Dht22<'_> {
    fn read(&mut self) -> Result<ClimateSample, HardwareError> {
        match dht22::Reading::read(&mut Ets, &mut self.pin) {
            Ok(reading) => Ok(ClimateSample {
                celsius: reading.temperature,
                relative_humidity: reading.relative_humidity,
            }),
            Err(DhtError::Timeout) => Err(HardwareError::NotResponding),
            Err(DhtError::ChecksumMismatch) => Err(HardwareError::Checksum),
            Err(DhtError::PinError(e)) => Err(HardwareError::Driver(describe(e))),
        }
    }
}

impl ClimatePort for Dht22Port {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn acquire(&mut self) -> Result<Box<dyn ClimateSensor + '_>, HardwareError> {
        let mut pin = PinDriver::input_output_od(&mut self.pin)
            .map_err(|e| HardwareError::BusUnavailable(describe(e)))?;
        // Idle high before the start pulse
        pin.set_high()
            .map_err(|e| HardwareError::BusUnavailable(describe(e)))?;
        Ok(Box::new(Dht22 { pin }))
    }
}

// ============================================================================
// Binary switch
// ============================================================================

pub struct SwitchPin {
    pin: AnyInputPin,
    label: String,
}

impl SwitchPin {
    pub fn new(pin: AnyInputPin, label: &str) -> Self {
        Self {
            pin,
            label: label.to_string(),
        }
    }
}

struct Switch<'a>(PinDriver<'a, AnyInputPin, Input>);

impl SwitchInput for Switch<'_> {
    fn is_on(&mut self) -> Result<bool, HardwareError> {
        Ok(self.0.is_high())
    }
}

impl SwitchPort for SwitchPin {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn acquire(&mut self) -> Result<Box<dyn SwitchInput + '_>, HardwareError> {
        let pin = PinDriver::input(&mut self.pin)
            .map_err(|e| HardwareError::BusUnavailable(describe(e)))?;
        Ok(Box::new(Switch(pin)))
    }
}

// ============================================================================
// Indicators
// ============================================================================

/// Watchdog pat line and the two activity LEDs.
///
/// The watchdog line is open drain: released (high impedance) when idle,
/// pulled low while a poll is in progress.
pub struct BoardIndicators {
    watchdog: PinDriver<'static, AnyIOPin, InputOutput>,
    print_led: PinDriver<'static, AnyIOPin, InputOutput>,
    http_led: PinDriver<'static, AnyIOPin, InputOutput>,
}

impl BoardIndicators {
    pub fn new(watchdog: AnyIOPin, print_led: AnyIOPin, http_led: AnyIOPin) -> Result<Self> {
        let mut indicators = Self {
            watchdog: PinDriver::input_output_od(watchdog)?,
            print_led: PinDriver::input_output(print_led)?,
            http_led: PinDriver::input_output(http_led)?,
        };
        indicators.watchdog.set_high()?;
        indicators.print_led.set_low()?;
        indicators.http_led.set_low()?;
        Ok(indicators)
    }
}

fn drive(pin: &mut PinDriver<'static, AnyIOPin, InputOutput>, high: bool, name: &str) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    if let Err(e) = result {
        warn!("Failed to drive {} pin: {:?}", name, e);
    }
}

impl IndicatorPins for BoardIndicators {
    fn watchdog(&mut self, active: bool) {
        drive(&mut self.watchdog, !active, "watchdog");
    }

    fn print_led(&mut self, on: bool) {
        drive(&mut self.print_led, on, "print LED");
    }

    fn http_led(&mut self, on: bool) {
        drive(&mut self.http_led, on, "HTTP LED");
    }
}
