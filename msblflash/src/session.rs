//! Request/response session with the sensor-hub bootloader bridge.
//!
//! Every operation writes one command line and blocks until exactly one
//! response line arrives (or the port times out). Nothing is cached: the
//! device mode is only ever learned by asking for it.
//!
//! ```rust,ignore
//! use msblflash::{BootloaderSession, Command, OperatingMode};
//!
//! let mut session = BootloaderSession::new(port);
//! session.send_command(&Command::EnterBootloader)?;
//! session.expect_mode(OperatingMode::Bootloader)?;
//! ```

use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::port::Port;
use crate::protocol::{Command, OperatingMode, Response, Value};
use log::{debug, trace, warn};
use std::io;

/// Longest response line accepted before giving up on the terminator.
pub const MAX_LINE_LEN: usize = 4096;

/// Owns a port and speaks the bridge's line protocol over it.
pub struct BootloaderSession<P: Port> {
    port: P,
}

impl<P: Port> BootloaderSession<P> {
    /// Take ownership of an opened port.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the session and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Send a command and return its `ret` value.
    ///
    /// Malformed responses and nonzero status codes are errors.
    pub fn send_command(&mut self, command: &Command) -> Result<Value> {
        debug!(">> {command}");
        self.write(command.keyword(), command.to_line().as_bytes())?;
        self.receive(command.keyword())
    }

    /// Like [`send_command`](Self::send_command), but a malformed response or
    /// a device-reported error yields `Ok(None)` after logging a warning.
    ///
    /// Transport failures are still returned as errors.
    pub fn try_send_command(&mut self, command: &Command) -> Result<Option<Value>> {
        match self.send_command(command) {
            Ok(value) => Ok(Some(value)),
            Err(Error::Protocol(
                err @ (ProtocolError::MalformedResponse { .. } | ProtocolError::DeviceError { .. }),
            )) => {
                warn!("{err}");
                Ok(None)
            },
            Err(err) => Err(err),
        }
    }

    /// Write one page: the `flash` line, then the raw page bytes with no
    /// delimiter, then wait for the status line. Never suppresses errors.
    pub fn flash_page(&mut self, page: &[u8]) -> Result<()> {
        let keyword = Command::Flash.keyword();
        debug!(">> {keyword} ({} bytes)", page.len());
        self.write(keyword, Command::Flash.to_line().as_bytes())?;
        self.write(keyword, page)?;
        self.receive(keyword).map(|_| ())
    }

    /// Ask the device which mode it is in.
    ///
    /// A well-formed answer naming no known mode (the bridge leaves `ret`
    /// empty in that case) is [`OperatingMode::Unknown`], not an error.
    pub fn query_mode(&mut self) -> Result<OperatingMode> {
        let value = self.send_command(&Command::OpMode)?.to_string();
        let mode = OperatingMode::from_reported(&value);
        if mode == OperatingMode::Unknown {
            warn!("Device reported an unknown operating mode: {value:?}");
        }
        Ok(mode)
    }

    /// Fail with [`ProtocolError::UnexpectedMode`] unless `op_mode` reports
    /// `expected`.
    pub fn expect_mode(&mut self, expected: OperatingMode) -> Result<()> {
        let actual = self.send_command(&Command::OpMode)?.to_string();
        if OperatingMode::from_reported(&actual) == expected {
            debug!("Device is in {expected} mode");
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedMode { expected, actual }.into())
        }
    }

    /// Drop anything the device sent that no command asked for.
    pub fn discard_input(&mut self) -> Result<()> {
        trace!("Discarding pending input on {}", self.port.name());
        self.port.clear_buffers()
    }

    /// Application firmware version (`sh_version`).
    pub fn firmware_version(&mut self) -> Result<String> {
        Ok(self.send_command(&Command::ShVersion)?.to_string())
    }

    /// Bootloader version (`bootloader_version`).
    pub fn bootloader_version(&mut self) -> Result<String> {
        Ok(self.send_command(&Command::BootloaderVersion)?.to_string())
    }

    /// Page size the bootloader expects, in bytes.
    ///
    /// A non-numeric answer is a malformed response.
    pub fn device_page_size(&mut self) -> Result<i64> {
        let value = self.send_command(&Command::PageSize)?;
        value.as_int().ok_or_else(|| {
            ProtocolError::MalformedResponse {
                command: Command::PageSize.keyword().to_string(),
                line: value.to_string(),
            }
            .into()
        })
    }

    fn write(&mut self, command: &str, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all_bytes(bytes)
            .map_err(|err| match err {
                Error::Io(source) => TransportError::Io {
                    command: command.to_string(),
                    source,
                }
                .into(),
                other => other,
            })
    }

    fn receive(&mut self, command: &str) -> Result<Value> {
        let raw = self.read_line(command)?;
        debug!("<< {}", String::from_utf8_lossy(&raw).trim_end());

        let response = Response::parse(&raw).ok_or_else(|| ProtocolError::MalformedResponse {
            command: command.to_string(),
            line: String::from_utf8_lossy(&raw).trim_end().to_string(),
        })?;

        if !response.is_success() {
            return Err(ProtocolError::DeviceError {
                status: response.err,
                message: response.msg.to_string(),
                command: command.to_string(),
                mode: None,
            }
            .into());
        }
        Ok(response.ret)
    }

    /// Read up to and including the next `\n`.
    fn read_line(&mut self, command: &str) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(0) => {
                    return Err(TransportError::Closed {
                        command: command.to_string(),
                    }
                    .into());
                },
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        trace!("Read {} byte line", line.len());
                        return Ok(line);
                    }
                    if line.len() >= MAX_LINE_LEN {
                        return Err(TransportError::LineTooLong {
                            command: command.to_string(),
                            limit: MAX_LINE_LEN,
                        }
                        .into());
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    if !line.is_empty() {
                        trace!("Partial line before timeout: {line:02X?}");
                    }
                    return Err(TransportError::Timeout {
                        command: command.to_string(),
                        timeout: self.port.timeout(),
                    }
                    .into());
                },
                Err(source) => {
                    return Err(TransportError::Io {
                        command: command.to_string(),
                        source,
                    }
                    .into());
                },
            }
        }
    }
}
