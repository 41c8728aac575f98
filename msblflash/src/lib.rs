//! # msblflash
//!
//! A library for flashing MAX32664 sensor hubs with MSBL firmware images.
//!
//! The sensor hub is reached through a USB-serial bridge board that exposes
//! the hub's bootloader as a line-oriented text protocol. This crate provides:
//!
//! - MSBL image parsing ([`MsblImage`])
//! - The bootloader command/response protocol ([`BootloaderSession`])
//! - The complete flashing sequence ([`MsblFlasher`])
//! - A serial port abstraction ([`Port`]) with a native implementation
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use msblflash::{FlashEvent, FlashOptions, MsblFlasher, MsblImage, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Parse and validate the image before touching the device
//!     let image = MsblImage::from_file("MAX32664C_30_13_31.msbl")?;
//!     println!("{}", image.describe());
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let config = SerialConfig::new("/dev/ttyACM0");
//!         let mut flasher = MsblFlasher::open(&config, FlashOptions::default())?;
//!         flasher.flash(&image, |event| {
//!             if let FlashEvent::PageFlashed { page, total } = event {
//!                 println!("Flashed page {page}/{total}");
//!             }
//!         })?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flasher;
pub mod image;
pub mod port;
pub mod protocol;
pub mod session;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    error::{Error, ParseError, ProtocolError, Result, TransportError},
    flasher::{FlashEvent, FlashOptions, FlashReport, MsblFlasher, Step},
    image::msbl::{MsblHeader, MsblImage, hex_upper},
    port::{Port, SerialConfig},
    protocol::{Command, OperatingMode, Response, StatusCode, Value},
    session::BootloaderSession,
};
