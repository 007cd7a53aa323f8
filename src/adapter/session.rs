//! GPIB adapter session
//!
//! Owns the transport and drives the adapter's line protocol:
//!
//! ```text
//! Disconnected -> Connecting -> Initializing -> Ready -> Disconnected
//! ```
//!
//! Every exchange discards stale input, writes one command line and then
//! polls the transport until a condition holds or the configured timeout
//! elapses. Read timeouts never surface as errors: they come back as `false`,
//! an empty string or `None`, and callers decide whether that is fatal.
//! Only genuine I/O failures (port gone, write refused) are returned as `Err`.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::protocol::{self, Setting};
use crate::config::AdapterConfig;
use crate::error::{AppResult, CalError};
use crate::transport::{is_timeout, Transport};

/// Lowest valid GPIB primary address for the instrument
pub const MIN_GPIB_ADDRESS: u8 = 1;
/// Highest valid GPIB primary address for the instrument
pub const MAX_GPIB_ADDRESS: u8 = 30;

/// Back-off between polls of the receive buffer
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of an adapter session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No open transport
    Disconnected,
    /// Opening the transport
    Connecting,
    /// Running the adapter configuration sequence
    Initializing,
    /// Accepting instrument queries
    Ready,
}

/// Connection to one instrument through a GPIB adapter
pub struct AdapterSession<T: Transport> {
    transport: T,
    timeout: Duration,
    timeout_ms: u64,
    version: String,
    address: u8,
    state: SessionState,
}

/// Check a GPIB address is usable for the instrument
pub fn validate_address(address: u8) -> AppResult<u8> {
    if (MIN_GPIB_ADDRESS..=MAX_GPIB_ADDRESS).contains(&address) {
        Ok(address)
    } else {
        Err(CalError::Configuration(format!(
            "GPIB address {} out of range ({}-{})",
            address, MIN_GPIB_ADDRESS, MAX_GPIB_ADDRESS
        )))
    }
}

/// Move whatever the transport has buffered onto the end of `received`
fn drain_into<T: Transport>(transport: &mut T, received: &mut Vec<u8>) -> io::Result<()> {
    let waiting = transport.bytes_to_read()?;
    if waiting > 0 {
        let mut chunk = vec![0u8; waiting];
        let count = transport.read(&mut chunk)?;
        received.extend_from_slice(&chunk[..count]);
    }
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

fn printable(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

impl<T: Transport> AdapterSession<T> {
    /// Create a disconnected session targeting `address`
    pub fn new(transport: T, config: &AdapterConfig, address: u8) -> AppResult<Self> {
        Ok(Self {
            transport,
            timeout: config.timeout(),
            timeout_ms: config.timeout_ms,
            version: config.version.clone(),
            address: validate_address(address)?,
            state: SessionState::Disconnected,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether instrument queries are accepted
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Target GPIB address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Response timeout applied to every poll
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the target address, re-asserting it to the adapter when open
    ///
    /// The new address is kept only once the adapter acknowledges it. If it
    /// does not, the adapter may still point at the old instrument, so the
    /// session is disconnected and the previous address retained.
    pub fn set_address(&mut self, address: u8) -> AppResult<()> {
        let address = validate_address(address)?;
        if self.is_ready() {
            if let Err(e) = self.configure(Setting::Address, address) {
                self.disconnect();
                return Err(e);
            }
        }
        self.address = address;
        Ok(())
    }

    /// Open the transport and configure the adapter
    ///
    /// Any previously open transport is closed first, so calling this twice
    /// starts a fresh session. If the adapter fails to acknowledge any step
    /// the transport is released and a configuration error is returned.
    pub fn connect(&mut self) -> AppResult<()> {
        self.state = SessionState::Connecting;
        if self.transport.is_open() {
            if let Err(e) = self.transport.close() {
                debug!("Ignoring error closing stale transport: {}", e);
            }
        }

        if let Err(e) = self.transport.open() {
            self.state = SessionState::Disconnected;
            return Err(e.into());
        }
        debug!(transport = %self.transport.describe(), "Transport opened");

        self.state = SessionState::Initializing;
        if let Err(e) = self.initialize() {
            self.disconnect();
            return Err(e);
        }

        self.state = SessionState::Ready;
        info!(
            transport = %self.transport.describe(),
            address = self.address,
            "GPIB adapter ready"
        );
        Ok(())
    }

    /// Release the transport; safe to call at any time, any number of times
    pub fn disconnect(&mut self) {
        if self.transport.is_open() {
            if let Err(e) = self.transport.close() {
                debug!("Ignoring error closing transport: {}", e);
            }
            debug!(transport = %self.transport.describe(), "Transport closed");
        }
        self.state = SessionState::Disconnected;
    }

    fn initialize(&mut self) -> AppResult<()> {
        let version = self.version.clone();
        if !self.check_response(protocol::VERSION, &version, true)? {
            return Err(CalError::Configuration(format!(
                "Adapter did not identify as '{}'",
                version
            )));
        }

        self.configure(Setting::Mode, 1)?;
        self.configure(Setting::Auto, 0)?;
        self.configure(Setting::Eoi, 1)?;
        self.configure(Setting::Eos, 0)?;
        self.configure(Setting::EotEnable, 0)?;
        self.configure(Setting::ReadTimeout, self.timeout_ms)?;

        self.write_line(protocol::INTERFACE_CLEAR.as_bytes())?;
        self.assert_address()
    }

    /// Write a setting, then read it back and require the same value
    fn configure(&mut self, setting: Setting, value: impl ToString) -> AppResult<()> {
        let value = value.to_string();
        let directive = setting.assign(&value);
        self.write_line(directive.as_bytes())?;
        if self.check_response(setting.directive(), &value, false)? {
            Ok(())
        } else {
            Err(CalError::Configuration(format!(
                "Adapter did not acknowledge '{}'",
                directive
            )))
        }
    }

    fn assert_address(&mut self) -> AppResult<()> {
        self.configure(Setting::Address, self.address)
    }

    /// Send `command` and wait for `expected` in the response
    ///
    /// With `anywhere` the expected text may appear at any position of the
    /// accumulated response; otherwise the response has to start with it.
    /// Returns `false` on timeout or when the transport is not open.
    pub fn check_response(
        &mut self,
        command: &str,
        expected: &str,
        anywhere: bool,
    ) -> AppResult<bool> {
        if !self.transport.is_open() {
            return Ok(false);
        }

        self.transport.clear_input()?;
        self.write_line(command.as_bytes())?;

        let expected = expected.as_bytes();
        let mut received = Vec::new();
        let matched = self.poll_until(|transport| {
            drain_into(transport, &mut received)?;
            Ok(if anywhere {
                contains(&received, expected)
            } else {
                received.starts_with(expected)
            })
        })?;

        debug!(
            command,
            response = %printable(&received),
            matched,
            "Adapter check"
        );
        Ok(matched)
    }

    /// Send a text command to the instrument, optionally reading one line back
    ///
    /// Returns an empty string when no result was requested, when the session
    /// is not ready, or when no complete line arrived before the timeout.
    pub fn query_instrument(&mut self, command: &str, read_result: bool) -> AppResult<String> {
        if !self.is_ready() {
            debug!(command, "Query on a session that is not ready");
            return Ok(String::new());
        }

        self.transport.clear_input()?;
        self.write_line(command.as_bytes())?;
        if !read_result {
            return Ok(String::new());
        }

        self.write_line(protocol::READ_EOI.as_bytes())?;
        let mut received = Vec::new();
        let complete = self.poll_until(|transport| {
            drain_into(transport, &mut received)?;
            Ok(received.contains(&b'\n'))
        })?;

        if !complete {
            warn!(command, timeout = ?self.timeout, "No response from instrument");
            return Ok(String::new());
        }

        let end = received
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(received.len());
        let line = String::from_utf8_lossy(&received[..end])
            .trim_end_matches(['\r', '\n'])
            .to_string();
        debug!(command, response = %line, "Instrument query");
        Ok(line)
    }

    /// Send raw command bytes and read back exactly `expected_len` bytes
    ///
    /// The command must already contain any ESC prefixes it needs. With
    /// `expected_len == 0` nothing is read and an empty buffer is returned.
    /// Returns `None` if the session is not ready or fewer than
    /// `expected_len` bytes arrived before the timeout; a short buffer is
    /// never returned.
    pub fn query_instrument_binary(
        &mut self,
        command: &[u8],
        expected_len: usize,
    ) -> AppResult<Option<Vec<u8>>> {
        if !self.is_ready() {
            debug!("Binary query on a session that is not ready");
            return Ok(None);
        }

        self.transport.clear_input()?;
        self.write_line(command)?;
        if expected_len == 0 {
            return Ok(Some(Vec::new()));
        }

        self.write_line(protocol::READ_EOI.as_bytes())?;
        let available =
            self.poll_until(|transport| Ok(transport.bytes_to_read()? >= expected_len))?;
        if !available {
            debug!(expected_len, "Binary response incomplete before timeout");
            return Ok(None);
        }

        let mut data = vec![0u8; expected_len];
        let mut filled = 0;
        while filled < expected_len {
            match self.transport.read(&mut data[filled..]) {
                Ok(0) => return Ok(None),
                Ok(count) => filled += count,
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(data))
    }

    fn write_line(&mut self, bytes: &[u8]) -> AppResult<()> {
        let mut line = Vec::with_capacity(bytes.len() + 1);
        line.extend_from_slice(bytes);
        line.push(protocol::LINE_TERMINATOR);
        self.transport.write_all(&line)?;
        Ok(())
    }

    /// Poll `condition` until it holds or the session timeout elapses
    ///
    /// Transport read timeouts inside `condition` count as "not yet".
    fn poll_until<F>(&mut self, mut condition: F) -> AppResult<bool>
    where
        F: FnMut(&mut T) -> io::Result<bool>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            match condition(&mut self.transport) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(e.into()),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl<T: Transport> Drop for AdapterSession<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
