//! Byte-stream transports underneath the adapter session
//!
//! The session only needs a handful of blocking primitives: open/close,
//! discard pending input, write a buffer, ask how many bytes are waiting,
//! and read them. A read that hits the transport's own timeout should return
//! an `io::Error` of kind `TimedOut`; the session treats that as "nothing yet".

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial;

pub use mock::MockTransport;
#[cfg(feature = "instrument_serial")]
pub use serial::SerialTransport;

use std::io;

/// Blocking byte-stream connection to the GPIB adapter
pub trait Transport {
    /// Open the underlying connection
    fn open(&mut self) -> io::Result<()>;

    /// Release the underlying connection; closing a closed transport is a no-op
    fn close(&mut self) -> io::Result<()>;

    /// Whether the connection is currently open
    fn is_open(&self) -> bool;

    /// Discard any bytes received but not yet read
    fn clear_input(&mut self) -> io::Result<()>;

    /// Write the whole buffer and flush it to the device
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Number of received bytes waiting to be read
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Human-readable name used in log messages
    fn describe(&self) -> String;
}

/// Whether an I/O error is a read timeout rather than a real failure
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
