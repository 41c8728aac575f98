//! Sensor-hub status codes (MAX32664 user guide, table 5).

use crate::protocol::command::OperatingMode;
use std::fmt;

/// Status byte reported in the `err` field of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The command completed (0x00).
    Success,
    /// Illegal family/index byte (0x01).
    UnavailableCommand,
    /// Function not implemented (0x02).
    UnavailableFunction,
    /// Wrong number of bytes for the command (0x03).
    DataFormat,
    /// Illegal configuration value (0x04).
    InputValue,
    /// Invalid mode in application mode, busy in bootloader mode (0x05).
    InvalidModeOrTryAgain,
    /// General error while receiving or flashing a page (0x80).
    BootloaderGeneral,
    /// Checksum error while decrypting or checking page data (0x81).
    BootloaderChecksum,
    /// Authorization error (0x82).
    BootloaderAuth,
    /// The bootloader considers the application invalid (0x83).
    BootloaderInvalidApp,
    /// Device busy, try again (0xFE).
    TryAgain,
    /// Unknown error, usually a communication failure behind the hub (0xFF).
    Unknown,
    /// A code not listed in the table.
    Unrecognized(i64),
}

impl StatusCode {
    /// Map a raw `err` value to a status code.
    pub fn from_raw(code: i64) -> Self {
        match code {
            0x00 => Self::Success,
            0x01 => Self::UnavailableCommand,
            0x02 => Self::UnavailableFunction,
            0x03 => Self::DataFormat,
            0x04 => Self::InputValue,
            0x05 => Self::InvalidModeOrTryAgain,
            0x80 => Self::BootloaderGeneral,
            0x81 => Self::BootloaderChecksum,
            0x82 => Self::BootloaderAuth,
            0x83 => Self::BootloaderInvalidApp,
            0xFE => Self::TryAgain,
            0xFF => Self::Unknown,
            other => Self::Unrecognized(other),
        }
    }

    /// Raw numeric value.
    pub fn code(&self) -> i64 {
        match self {
            Self::Success => 0x00,
            Self::UnavailableCommand => 0x01,
            Self::UnavailableFunction => 0x02,
            Self::DataFormat => 0x03,
            Self::InputValue => 0x04,
            Self::InvalidModeOrTryAgain => 0x05,
            Self::BootloaderGeneral => 0x80,
            Self::BootloaderChecksum => 0x81,
            Self::BootloaderAuth => 0x82,
            Self::BootloaderInvalidApp => 0x83,
            Self::TryAgain => 0xFE,
            Self::Unknown => 0xFF,
            Self::Unrecognized(v) => *v,
        }
    }

    /// Symbolic name from the user guide.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::UnavailableCommand => "ERR_UNAVAIL_CMD",
            Self::UnavailableFunction => "ERR_UNAVAIL_FUNC",
            Self::DataFormat => "ERR_DATA_FORMAT",
            Self::InputValue => "ERR_INPUT_VALUE",
            Self::InvalidModeOrTryAgain => "ERR_INVALID_MODE/ERR_BTLDR_TRY_AGAIN",
            Self::BootloaderGeneral => "ERR_BTLDR_GENERAL",
            Self::BootloaderChecksum => "ERR_BTLDR_CHECKSUM",
            Self::BootloaderAuth => "ERR_BTLDR_AUTH",
            Self::BootloaderInvalidApp => "ERR_BTLDR_INVALID_APP",
            Self::TryAgain => "ERR_TRY_AGAIN",
            Self::Unknown => "ERR_UNKNOWN",
            Self::Unrecognized(_) => "UNRECOGNIZED",
        }
    }

    /// Table entry for this code, `None` for codes outside the table.
    pub fn description(&self) -> Option<&'static str> {
        let text = match self {
            Self::Success => "The write transaction was successful.",
            Self::UnavailableCommand => {
                "Illegal Family Byte and/or Index Byte was used. Verify that the latest .msbl is flashed."
            },
            Self::UnavailableFunction => {
                "This function is not implemented. Verify that the latest .msbl is flashed."
            },
            Self::DataFormat => {
                "Incorrect number of bytes sent for the requested Family Byte. Verify that the latest .msbl is flashed."
            },
            Self::InputValue => {
                "Illegal configuration value was attempted to be set. Verify that the latest .msbl is flashed."
            },
            Self::InvalidModeOrTryAgain => {
                "Application mode: not used in application mode. Bootloader mode: device is busy, insert delay and resend the command."
            },
            Self::BootloaderGeneral => {
                "General error while receiving/flashing a page during the bootloader sequence."
            },
            Self::BootloaderChecksum => {
                "Checksum error while decrypting/checking page data. Verify that the .msbl file is compatible with MAX32664A/B/C/D."
            },
            Self::BootloaderAuth => {
                "Authorization error. Verify that the .msbl file is compatible with MAX32664A/B/C/D."
            },
            Self::BootloaderInvalidApp => "The bootloader detected that the application is not valid.",
            Self::TryAgain => {
                "Device is busy, try again. Increase the delay before the command."
            },
            Self::Unknown => {
                "Unknown error. Verify the communication between the sensor hub and its peripherals."
            },
            Self::Unrecognized(_) => return None,
        };
        Some(text)
    }

    /// Whether this code means success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Table entry for a code received while the device was in `mode`.
    ///
    /// Only 0x05 depends on the mode; when the mode is not known both
    /// meanings are given.
    pub fn meaning_in(&self, mode: OperatingMode) -> Option<&'static str> {
        match (self, mode) {
            (Self::InvalidModeOrTryAgain, OperatingMode::Bootloader) => {
                Some("ERR_BTLDR_TRY_AGAIN: device is busy, insert delay and resend the command.")
            },
            (Self::InvalidModeOrTryAgain, OperatingMode::Application) => {
                Some("ERR_INVALID_MODE: not used in application mode.")
            },
            _ => self.description(),
        }
    }

    /// Whether resending the same command later may succeed.
    ///
    /// The primitives never retry on their own; this is for callers that
    /// implement a retry policy.
    pub fn is_retryable(&self, mode: OperatingMode) -> bool {
        match self {
            Self::TryAgain => true,
            Self::InvalidModeOrTryAgain => mode == OperatingMode::Bootloader,
            _ => false,
        }
    }

    /// Whether the code indicates an image the bootloader rejects.
    pub fn is_image_rejection(&self) -> bool {
        matches!(
            self,
            Self::BootloaderGeneral
                | Self::BootloaderChecksum
                | Self::BootloaderAuth
                | Self::BootloaderInvalidApp
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({})", self.code(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_roundtrip_for_table_entries() {
        for code in [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x80, 0x81, 0x82, 0x83, 0xFE, 0xFF,
        ] {
            let status = StatusCode::from_raw(code);
            assert!(!matches!(status, StatusCode::Unrecognized(_)));
            assert_eq!(status.code(), code);
            assert!(status.description().is_some());
        }
    }

    #[test]
    fn test_unrecognized_code_keeps_raw_value() {
        let status = StatusCode::from_raw(0x42);
        assert_eq!(status, StatusCode::Unrecognized(0x42));
        assert_eq!(status.code(), 0x42);
        assert!(status.description().is_none());
    }

    #[test]
    fn test_mode_dependent_meaning() {
        let status = StatusCode::InvalidModeOrTryAgain;
        assert!(
            status
                .meaning_in(OperatingMode::Bootloader)
                .unwrap()
                .contains("TRY_AGAIN")
        );
        assert!(
            status
                .meaning_in(OperatingMode::Application)
                .unwrap()
                .contains("INVALID_MODE")
        );
        assert_eq!(
            status.meaning_in(OperatingMode::Unknown),
            status.description()
        );
        assert_eq!(
            StatusCode::BootloaderAuth.meaning_in(OperatingMode::Bootloader),
            StatusCode::BootloaderAuth.description()
        );
    }

    #[test]
    fn test_retryable_codes() {
        assert!(StatusCode::TryAgain.is_retryable(OperatingMode::Application));
        assert!(StatusCode::InvalidModeOrTryAgain.is_retryable(OperatingMode::Bootloader));
        assert!(!StatusCode::InvalidModeOrTryAgain.is_retryable(OperatingMode::Application));
        assert!(!StatusCode::DataFormat.is_retryable(OperatingMode::Bootloader));
        assert!(!StatusCode::BootloaderChecksum.is_retryable(OperatingMode::Bootloader));
    }

    #[test]
    fn test_image_rejection_codes() {
        assert!(StatusCode::BootloaderChecksum.is_image_rejection());
        assert!(StatusCode::BootloaderAuth.is_image_rejection());
        assert!(!StatusCode::TryAgain.is_image_rejection());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::BootloaderAuth.to_string(), "0x82 (ERR_BTLDR_AUTH)");
        assert_eq!(StatusCode::UnavailableCommand.to_string(), "0x01 (ERR_UNAVAIL_CMD)");
    }
}
