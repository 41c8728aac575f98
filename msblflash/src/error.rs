//! Error types for msblflash.

use crate::protocol::{OperatingMode, StatusCode};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for msblflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for msblflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, port setup).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The MSBL image could not be parsed.
    #[error("Invalid MSBL image: {0}")]
    Image(#[from] ParseError),

    /// The byte stream to the device failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The device answered, but not with what the sequence requires.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Writing a single page failed.
    #[error("Flashing page {page}/{total} failed")]
    Page {
        /// 1-based index of the failing page.
        page: usize,
        /// Number of pages in the image.
        total: usize,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns the device status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Protocol(ProtocolError::DeviceError { status, .. }) => Some(*status),
            Self::Page { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Record the mode the device was in when a status code came back, so
    /// mode-dependent codes are described with the meaning that applies.
    #[must_use]
    pub fn in_mode(self, mode: OperatingMode) -> Self {
        match self {
            Self::Protocol(ProtocolError::DeviceError {
                status,
                message,
                command,
                ..
            }) => Self::Protocol(ProtocolError::DeviceError {
                status,
                message,
                command,
                mode: Some(mode),
            }),
            Self::Page {
                page,
                total,
                source,
            } => Self::Page {
                page,
                total,
                source: Box::new(source.in_mode(mode)),
            },
            other => other,
        }
    }
}

/// MSBL parse failures. All of them are fatal.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Fewer bytes than a full header were available.
    #[error("truncated header: need {expected} bytes, got {actual}")]
    TruncatedHeader {
        /// Header size in bytes.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// The number of complete pages differs from the header's page count.
    #[error("expected {expected} pages but read {actual}")]
    PageCountMismatch {
        /// Page count declared in the header.
        expected: usize,
        /// Complete pages found in the file.
        actual: usize,
    },

    /// The source is too short to hold the trailing CRC32.
    #[error("file too short for the trailing CRC32")]
    TruncatedTrailer,

    /// Reading the source failed.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Failures of the underlying byte stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Writing to or reading from the stream failed.
    #[error("I/O failure during `{command}`: {source}")]
    Io {
        /// Command being exchanged.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// No complete response line arrived in time.
    #[error("timed out after {timeout:?} waiting for the response to `{command}`")]
    Timeout {
        /// Command being exchanged.
        command: String,
        /// Read timeout of the port.
        timeout: Duration,
    },

    /// The stream ended before a line terminator was seen.
    #[error("stream closed before the response to `{command}` was complete")]
    Closed {
        /// Command being exchanged.
        command: String,
    },

    /// The response line exceeded the accepted length.
    #[error("response to `{command}` exceeded {limit} bytes without a line terminator")]
    LineTooLong {
        /// Command being exchanged.
        command: String,
        /// Maximum accepted line length.
        limit: usize,
    },
}

/// Errors in the request/response exchange with the bootloader.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The device sent a line that does not follow the response grammar.
    #[error("failed to parse the response to `{command}`: {line:?}")]
    MalformedResponse {
        /// Command that produced the response.
        command: String,
        /// Raw response line (lossy decoded).
        line: String,
    },

    /// The device reported a nonzero status.
    #[error("{}", describe_device_error(.status, .message, .command, .mode.as_ref()))]
    DeviceError {
        /// Reported status code.
        status: StatusCode,
        /// Message the device sent along with the status.
        message: String,
        /// Command that failed.
        command: String,
        /// Mode the device was in, when the caller knows it.
        mode: Option<OperatingMode>,
    },

    /// The device is not in the mode the sequence requires.
    #[error("expected {expected} mode, device reports {actual:?}")]
    UnexpectedMode {
        /// Mode required by the sequence.
        expected: OperatingMode,
        /// Value the device returned for `op_mode`.
        actual: String,
    },
}

fn describe_device_error(
    status: &StatusCode,
    message: &str,
    command: &str,
    mode: Option<&OperatingMode>,
) -> String {
    let meaning = match mode {
        Some(mode) => status.meaning_in(*mode),
        None => status.description(),
    };
    match meaning {
        Some(text) => format!(
            "error code {:#04x} ({}) received during `{command}`: {text}",
            status.code(),
            status.name()
        ),
        None => format!(
            "unknown error code {:#04x} received during `{command}` with message: {message:?}",
            status.code()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_known_code_mentions_table_entry() {
        let err = ProtocolError::DeviceError {
            status: StatusCode::from_raw(0x81),
            message: "Failed to flash page.".into(),
            command: "flash".into(),
            mode: None,
        };
        let text = err.to_string();
        assert!(text.contains("0x81"));
        assert!(text.contains("ERR_BTLDR_CHECKSUM"));
        assert!(text.contains("`flash`"));
    }

    #[test]
    fn test_device_error_unknown_code_mentions_device_message() {
        let err = ProtocolError::DeviceError {
            status: StatusCode::from_raw(0x42),
            message: "strange".into(),
            command: "erase".into(),
            mode: None,
        };
        let text = err.to_string();
        assert!(text.starts_with("unknown error code 0x42"));
        assert!(text.contains("strange"));
    }

    #[test]
    fn test_page_error_exposes_status() {
        let err = Error::Page {
            page: 3,
            total: 29,
            source: Box::new(Error::Protocol(ProtocolError::DeviceError {
                status: StatusCode::from_raw(0x82),
                message: String::new(),
                command: "flash".into(),
                mode: None,
            })),
        };
        assert_eq!(err.status(), Some(StatusCode::BootloaderAuth));
        assert!(err.to_string().starts_with("Flashing page 3/29 failed"));
    }

    #[test]
    fn test_busy_code_described_for_the_known_mode() {
        let err = Error::Page {
            page: 1,
            total: 2,
            source: Box::new(Error::Protocol(ProtocolError::DeviceError {
                status: StatusCode::from_raw(0x05),
                message: String::new(),
                command: "flash".into(),
                mode: None,
            })),
        };
        let Error::Page { source, .. } = err.in_mode(OperatingMode::Bootloader) else {
            panic!("page error expected");
        };
        let text = source.to_string();
        assert!(text.contains("device is busy"));
        assert!(!text.contains("Application mode"));
    }

    #[test]
    fn test_busy_code_without_mode_gives_both_meanings() {
        let err = ProtocolError::DeviceError {
            status: StatusCode::from_raw(0x05),
            message: String::new(),
            command: "exit".into(),
            mode: None,
        };
        let text = err.to_string();
        assert!(text.contains("Application mode"));
        assert!(text.contains("Bootloader mode"));
    }

    #[test]
    fn test_in_mode_leaves_other_errors_alone() {
        let err = Error::Transport(TransportError::Closed {
            command: "exit".into(),
        })
        .in_mode(OperatingMode::Application);
        assert!(matches!(err, Error::Transport(TransportError::Closed { .. })));
    }
}
