//! GPIB adapter protocol engine
//!
//! [`AdapterSession`] brings the USB-to-GPIB adapter up and exchanges
//! commands with the instrument; [`protocol`] holds the directive names and
//! the byte-level framing of instrument commands.

pub mod protocol;
pub mod session;

pub use session::{validate_address, AdapterSession, SessionState};
