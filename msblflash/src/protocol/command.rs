//! Host commands understood by the bootloader bridge.

use crate::image::msbl::{AUTH_SIZE, NONCE_SIZE, hex_upper};
use std::fmt;
use std::str::FromStr;

/// A command line sent to the device.
///
/// Keywords are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Leave bootloader mode and start the application (`exit`).
    Exit,
    /// Read the application firmware version (`sh_version`).
    ShVersion,
    /// Enter bootloader mode (`bootldr`).
    EnterBootloader,
    /// Read the current operating mode (`op_mode`).
    OpMode,
    /// Read the bootloader version (`bootloader_version`).
    BootloaderVersion,
    /// Read the page size the bootloader expects (`page_size`).
    PageSize,
    /// Announce how many pages will follow (`num_pages <n>`).
    NumPages(u16),
    /// Load the image nonce (`set_iv <hex>`).
    SetIv([u8; NONCE_SIZE]),
    /// Load the image authentication tag (`set_auth <hex>`).
    SetAuth([u8; AUTH_SIZE]),
    /// Erase the application flash (`erase`).
    Erase,
    /// Announce one page of raw data (`flash`).
    Flash,
    /// Pulse the sensor hub reset line (`reset`).
    Reset,
}

impl Command {
    /// Command keyword, as echoed back in the `cmd` field.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Exit => "exit",
            Self::ShVersion => "sh_version",
            Self::EnterBootloader => "bootldr",
            Self::OpMode => "op_mode",
            Self::BootloaderVersion => "bootloader_version",
            Self::PageSize => "page_size",
            Self::NumPages(_) => "num_pages",
            Self::SetIv(_) => "set_iv",
            Self::SetAuth(_) => "set_auth",
            Self::Erase => "erase",
            Self::Flash => "flash",
            Self::Reset => "reset",
        }
    }

    /// Full line as written to the wire, including the terminator.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumPages(n) => write!(f, "num_pages {n}"),
            Self::SetIv(nonce) => write!(f, "set_iv {}", hex_upper(nonce)),
            Self::SetAuth(auth) => write!(f, "set_auth {}", hex_upper(auth)),
            other => f.write_str(other.keyword()),
        }
    }
}

/// Device operating mode as reported by `op_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    /// The device answered but reported no mode this crate knows.
    Unknown,
    /// Running the flashed firmware.
    Application,
    /// Accepting flashing commands.
    Bootloader,
    /// Held in reset.
    Reset,
}

impl OperatingMode {
    /// Mode name; for known modes, the literal the device sends.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Application => "Application",
            Self::Bootloader => "Bootloader",
            Self::Reset => "Reset",
        }
    }

    /// Map an `op_mode` answer to a mode. Empty or unlisted values are
    /// [`OperatingMode::Unknown`].
    pub fn from_reported(value: &str) -> Self {
        value.parse().unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Application" => Ok(Self::Application),
            "Bootloader" => Ok(Self::Bootloader),
            "Reset" => Ok(Self::Reset),
            other => Err(format!("unknown operating mode: {other:?}")),
        }
    }
}
