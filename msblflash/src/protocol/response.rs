//! Response line parser.
//!
//! ```text
//! cmd=<command>$ret=<value>$err=<status>$msg=<text>
//! ```
//!
//! All four keys are required. Values that parse as base-10 integers become
//! [`Value::Int`], everything else [`Value::Text`].

use crate::protocol::status::StatusCode;
use std::collections::HashMap;
use std::fmt;

/// Field separator.
pub const FIELD_SEPARATOR: char = '$';

/// A response field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Base-10 integer.
    Int(i64),
    /// Anything else, including the empty string.
    Text(String),
}

impl Value {
    fn parse(raw: &str) -> Self {
        raw.trim()
            .parse::<i64>()
            .map_or_else(|_| Self::Text(raw.to_string()), Self::Int)
    }

    /// Integer value, if this is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Text value, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Command the device believes it executed.
    pub cmd: Value,
    /// Return value.
    pub ret: Value,
    /// Status code.
    pub err: StatusCode,
    /// Free-form message.
    pub msg: Value,
}

impl Response {
    /// Parse a raw response line. Returns `None` if the line does not follow
    /// the grammar.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let line = std::str::from_utf8(raw).ok()?;
        if !line.is_ascii() {
            return None;
        }
        let line = line.trim_end_matches('\n').trim_end_matches('\r');

        let mut fields: HashMap<&str, &str> = HashMap::new();
        for field in line.split(FIELD_SEPARATOR) {
            let mut parts = field.split('=');
            // A field must split into exactly a key and a value.
            if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
                fields.insert(key, value);
            }
        }

        let cmd = Value::parse(fields.get("cmd")?);
        let ret = Value::parse(fields.get("ret")?);
        let err = Value::parse(fields.get("err")?).as_int()?;
        let msg = Value::parse(fields.get("msg")?);

        Some(Self {
            cmd,
            ret,
            err: StatusCode::from_raw(err),
            msg,
        })
    }

    /// Whether the device reported success.
    pub fn is_success(&self) -> bool {
        self.err.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_op_mode_bootloader() {
        let resp = Response::parse(b"cmd=op_mode$ret=Bootloader$err=0$msg=\n").unwrap();
        assert_eq!(resp.cmd, Value::Text("op_mode".into()));
        assert_eq!(resp.ret, Value::Text("Bootloader".into()));
        assert_eq!(resp.err, StatusCode::Success);
        assert_eq!(resp.msg, Value::Text(String::new()));
        assert!(resp.is_success());
    }

    #[test]
    fn test_integer_values() {
        let resp =
            Response::parse(b"cmd=page_size$ret=8192$err=0$msg=Successfully retrieved page size.\r\n")
                .unwrap();
        assert_eq!(resp.ret, Value::Int(8192));
        assert_eq!(resp.msg.as_text(), Some("Successfully retrieved page size."));
    }

    #[test]
    fn test_nonzero_status() {
        let resp = Response::parse(b"cmd=erase$ret=$err=129$msg=Failed\n").unwrap();
        assert_eq!(resp.err, StatusCode::BootloaderChecksum);
        assert!(!resp.is_success());
    }

    #[test]
    fn test_missing_msg_is_malformed() {
        assert!(Response::parse(b"cmd=op_mode$ret=Bootloader$err=0\n").is_none());
    }

    #[test]
    fn test_missing_each_key_is_malformed() {
        for line in [
            "ret=1$err=0$msg=",
            "cmd=x$err=0$msg=",
            "cmd=x$ret=1$msg=",
            "cmd=x$ret=1$err=0",
        ] {
            assert!(Response::parse(line.as_bytes()).is_none(), "{line}");
        }
    }

    #[test]
    fn test_field_with_extra_equals_is_dropped() {
        assert!(Response::parse(b"cmd=x$ret=1$err=0$msg=a=b\n").is_none());
    }

    #[test]
    fn test_non_integer_status_is_malformed() {
        assert!(Response::parse(b"cmd=x$ret=1$err=oops$msg=\n").is_none());
    }

    #[test]
    fn test_non_ascii_is_malformed() {
        assert!(Response::parse(b"cmd=x$ret=\xC3\xA9$err=0$msg=\n").is_none());
        assert!(Response::parse(b"cmd=x$ret=\xFF$err=0$msg=\n").is_none());
    }

    #[test]
    fn test_empty_line_is_malformed() {
        assert!(Response::parse(b"").is_none());
        assert!(Response::parse(b"\n").is_none());
    }

    #[test]
    fn test_version_string_stays_text() {
        let resp = Response::parse(b"cmd=sh_version$ret=30.2.1$err=0$msg=\n").unwrap();
        assert_eq!(resp.ret.to_string(), "30.2.1");
        assert!(resp.ret.as_int().is_none());
    }

    #[test]
    fn test_repeated_key_keeps_last() {
        let resp = Response::parse(b"cmd=x$ret=1$ret=2$err=0$msg=\n").unwrap();
        assert_eq!(resp.ret, Value::Int(2));
    }
}
