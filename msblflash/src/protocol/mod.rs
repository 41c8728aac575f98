//! Sensor-hub bootloader serial protocol.
//!
//! The bridge board accepts one ASCII command per line and answers every
//! command with a single line of `$`-separated `key=value` fields:
//!
//! ```text
//! host   -> "op_mode\n"
//! device <- "cmd=op_mode$ret=Bootloader$err=0$msg=\n"
//! ```
//!
//! `flash` is the only command with a binary payload: the raw page bytes
//! follow the command line directly.

pub mod command;
pub mod response;
pub mod status;

// Re-export common types
pub use command::{Command, OperatingMode};
pub use response::{Response, Value};
pub use status::StatusCode;
