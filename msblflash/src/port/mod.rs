//! Serial transport abstraction.
//!
//! The session layer only needs a blocking duplex byte stream with a read
//! timeout. `Port` captures that, so the bootloader protocol can run over a
//! real serial device or a scripted test double.
//!
//! ```text
//! +--------------------+
//! | MsblFlasher        |
//! +---------+----------+
//!           |
//! +---------v----------+
//! | BootloaderSession  |
//! +---------+----------+
//!           |
//! +---------v----------+
//! |    Port trait      |
//! +---------+----------+
//!           |
//! +---------v----------+
//! | NativePort         |
//! | (serialport)       |
//! +--------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate the bridge board firmware listens on.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout for a single response line.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Serial port configuration.
///
/// Framing is fixed at 8N1 without flow control, which is all the bridge
/// board supports.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a configuration for `port_name` with the bridge defaults.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Blocking duplex byte stream used by [`BootloaderSession`].
///
/// Reads must honor [`Port::timeout`]: a read that sees no data within the
/// timeout returns an `io::ErrorKind::TimedOut` error.
///
/// [`BootloaderSession`]: crate::session::BootloaderSession
pub trait Port: Read + Write + Send {
    /// Get the current timeout.
    fn timeout(&self) -> Duration;

    /// Discard input that has already arrived and output not yet sent.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Write all bytes and flush.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(self, buf)?;
        Write::flush(self)?;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default_is_bridge_settings() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.port_name.is_empty());
    }

    #[test]
    fn test_serial_config_builder() {
        let config = SerialConfig::new("/dev/ttyACM0")
            .with_baud_rate(115_200)
            .with_timeout(Duration::from_millis(500));

        assert_eq!(config.port_name, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout, Duration::from_millis(500));
    }
}
