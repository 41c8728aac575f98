//! Firmware image formats.

pub mod msbl;

pub use msbl::{MsblHeader, MsblImage, hex_upper};
