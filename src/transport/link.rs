//! Serial link to the programming bridge.

use std::thread;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{info, instrument, warn};

use super::TransportError;

/// Serial link configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    /// Device name of the serial port.
    pub port: String,
    /// Line speed in baud.
    pub baud_rate: u32,
    /// Longest wait for a single ack byte.
    pub ack_timeout: Duration,
    /// Pause after opening, while the bridge resets.
    pub settle_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            ack_timeout: Duration::from_secs(40),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Open the port as 8 data bits, no parity, 2 stop bits.
///
/// Reads on the returned port time out after `ack_timeout`.
#[instrument(level = "info", skip(config), fields(port = %config.port, baud = config.baud_rate))]
pub fn open(config: &LinkConfig) -> Result<Box<dyn SerialPort>, TransportError> {
    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::Two)
        .flow_control(FlowControl::None)
        .timeout(config.ack_timeout)
        .open()?;
    if !config.settle_delay.is_zero() {
        thread::sleep(config.settle_delay);
    }
    info!("serial link open");
    Ok(port)
}

/// Open the port, or return `None` so the caller can run without a bridge.
pub fn try_open(config: &LinkConfig) -> Option<Box<dyn SerialPort>> {
    match open(config) {
        Ok(port) => Some(port),
        Err(err) => {
            warn!(port = %config.port, error = %err, "bridge offline");
            None
        }
    }
}
