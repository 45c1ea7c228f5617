//! Console output and indicator pins.
//!
//! The console is the serial line on the device and stdout in the simulator.
//! It is separate from diagnostic logging.

pub trait Console {
    fn write_line(&mut self, line: &str);
}

/// Writes lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Output pins driven by the start/settle activities.
pub trait IndicatorPins {
    /// Hold (`true`) or release the hardware watchdog pat line.
    fn watchdog(&mut self, active: bool);

    fn print_led(&mut self, on: bool);

    fn http_led(&mut self, on: bool);
}

/// Board without indicator pins.
#[derive(Debug, Default)]
pub struct NoIndicators;

impl IndicatorPins for NoIndicators {
    fn watchdog(&mut self, _active: bool) {}
    fn print_led(&mut self, _on: bool) {}
    fn http_led(&mut self, _on: bool) {}
}
