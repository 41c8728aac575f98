//! Scripted in-memory port for unit tests.

use crate::error::Result;
use crate::port::{DEFAULT_TIMEOUT, Port};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Replays queued device output and records everything the host writes.
///
/// Once the queue is drained, reads fail with `TimedOut` (like a silent
/// device) or return `Ok(0)` after [`MockPort::hang_up`].
///
/// Stale bytes are read before the queue and are the only input
/// [`Port::clear_buffers`] discards.
pub(crate) struct MockPort {
    stale: VecDeque<u8>,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    timeout: Duration,
    hung_up: bool,
    fail_writes: bool,
    clears: usize,
}

impl MockPort {
    pub(crate) fn new() -> Self {
        Self {
            stale: VecDeque::new(),
            rx: VecDeque::new(),
            tx: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            hung_up: false,
            fail_writes: false,
            clears: 0,
        }
    }

    /// Bytes already sitting in the input buffer before the host speaks.
    pub(crate) fn push_stale(&mut self, bytes: &[u8]) -> &mut Self {
        self.stale.extend(bytes.iter().copied());
        self
    }

    /// Queue raw bytes.
    pub(crate) fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes.iter().copied());
        self
    }

    /// Queue a line; the terminator is appended.
    pub(crate) fn push_line(&mut self, line: &str) -> &mut Self {
        self.push_raw(line.as_bytes()).push_raw(b"\n")
    }

    /// Queue a well-formed response.
    pub(crate) fn push_response(&mut self, cmd: &str, ret: &str, err: i64, msg: &str) -> &mut Self {
        self.push_line(&format!("cmd={cmd}$ret={ret}$err={err}$msg={msg}"))
    }

    /// Queue a successful response.
    pub(crate) fn push_ok(&mut self, cmd: &str, ret: &str) -> &mut Self {
        self.push_response(cmd, ret, 0, "")
    }

    /// End of stream once the queue is drained.
    pub(crate) fn hang_up(&mut self) -> &mut Self {
        self.hung_up = true;
        self
    }

    /// Make every write fail with `BrokenPipe`.
    pub(crate) fn fail_writes(&mut self) -> &mut Self {
        self.fail_writes = true;
        self
    }

    /// Everything written so far.
    pub(crate) fn tx(&self) -> &[u8] {
        &self.tx
    }

    /// Written bytes as text, lossy.
    pub(crate) fn tx_text(&self) -> String {
        String::from_utf8_lossy(&self.tx).into_owned()
    }

    /// Bytes still queued for the host.
    pub(crate) fn pending(&self) -> usize {
        self.stale.len() + self.rx.len()
    }

    /// How often the buffers were cleared.
    pub(crate) fn clears(&self) -> usize {
        self.clears
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let source = if self.stale.is_empty() {
            &mut self.rx
        } else {
            &mut self.stale
        };
        if source.is_empty() {
            if self.hung_up {
                return Ok(0);
            }
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(source.len());
        for (slot, byte) in buf.iter_mut().zip(source.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"));
        }
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.stale.clear();
        self.clears += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
