//! Mock transport for testing
//!
//! Simulates the adapter end of the serial link without hardware. Every
//! buffer written is logged and handed to an optional responder closure;
//! whatever the responder returns is queued as received bytes. Clones share
//! state, so a test can keep a handle while the session owns another.
//!
//! # Example
//!
//! ```
//! use hp3478a_cal::transport::{MockTransport, Transport};
//!
//! let mock = MockTransport::new().with_responder(|written: &[u8]| {
//!     if written.starts_with(b"++ver") {
//!         b"Prologix GPIB-USB Controller version 6.107\r\n".to_vec()
//!     } else {
//!         Vec::new()
//!     }
//! });
//! let mut transport = mock.clone();
//! transport.open().unwrap();
//! transport.write_all(b"++ver\r").unwrap();
//! assert!(transport.bytes_to_read().unwrap() > 0);
//! assert_eq!(mock.writes(), vec![b"++ver\r".to_vec()]);
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Transport;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct MockState {
    open: bool,
    open_count: usize,
    fail_next_open: bool,
    clear_count: usize,
    rx: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    responder: Option<Responder>,
}

/// Scriptable in-memory transport
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a mock with no responder; writes are logged and never answered
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a responder called with every written buffer
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
        self
    }

    /// Make the next `open` fail with `NotFound`
    pub fn inject_open_failure(&self) {
        self.lock().fail_next_open = true;
    }

    /// Queue bytes as if the device had sent them unprompted
    pub fn push_rx(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// All buffers written so far, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Forget the write log
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// How many times pending input was discarded
    pub fn clear_count(&self) -> usize {
        self.lock().clear_count
    }

    /// How many times `open` succeeded
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_open() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "Mock transport not open")
}

impl Transport for MockTransport {
    fn open(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        if std::mem::take(&mut state.fail_next_open) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "Injected open failure"));
        }
        state.open = true;
        state.open_count += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(not_open());
        }
        state.rx.clear();
        state.clear_count += 1;
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if !state.open {
            return Err(not_open());
        }
        state.writes.push(bytes.to_vec());
        let reply = match state.responder.as_mut() {
            Some(responder) => responder(bytes),
            None => Vec::new(),
        };
        state.rx.extend(reply);
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let state = self.lock();
        if !state.open {
            return Err(not_open());
        }
        Ok(state.rx.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.lock();
        if !state.open {
            return Err(not_open());
        }
        if state.rx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "No data"));
        }
        let count = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
