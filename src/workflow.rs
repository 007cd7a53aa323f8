//! Calibration read and write workflows
//!
//! Each workflow owns one complete conversation with the instrument:
//! connect, status probe, a front-panel banner, 256 single-nibble transfers,
//! display restore, disconnect. Any missing or mismatched nibble aborts the
//! whole transfer; there are no retries.

use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::adapter::protocol::{self, display_command, read_nibble_command, write_nibble_command};
use crate::adapter::AdapterSession;
use crate::calibration::{CalibrationImage, IMAGE_LEN, NIBBLE_MASK, SENTINEL_INDEX};
use crate::error::{AppResult, CalError};
use crate::transport::Transport;

/// Front-panel text while reading calibration memory
pub const READ_BANNER: &str = "CAL READ";
/// Front-panel text while writing calibration memory
pub const WRITE_BANNER: &str = "CAL WRITE";

/// Require the instrument to answer the status probe with `0` or `1`
pub fn probe_instrument<T: Transport>(session: &mut AdapterSession<T>) -> AppResult<()> {
    let status = session.query_instrument(protocol::STATUS, true)?;
    match status.as_str() {
        "0" | "1" => {
            debug!(status = %status, "Instrument responded to status probe");
            Ok(())
        }
        "" => Err(CalError::Communication(format!(
            "No instrument answered at GPIB address {}",
            session.address()
        ))),
        other => Err(CalError::Communication(format!(
            "Unexpected status response '{}' from GPIB address {}",
            other,
            session.address()
        ))),
    }
}

/// Read the full calibration SRAM from the instrument
///
/// The session is connected first and always disconnected afterwards.
pub fn read_calibration<T: Transport>(
    session: &mut AdapterSession<T>,
) -> AppResult<CalibrationImage> {
    session.connect()?;
    let result = probe_instrument(session)
        .and_then(|()| with_banner(session, READ_BANNER, read_sram));
    session.disconnect();
    result
}

/// Write an image to the instrument's calibration SRAM
///
/// Refuses images whose used entries fail their checksum before touching the
/// instrument. Every nibble is read back and compared on its low four bits.
/// The calibration switch byte is written but not compared, since the
/// instrument changes it on its own.
pub fn write_calibration<T: Transport>(
    session: &mut AdapterSession<T>,
    image: &CalibrationImage,
) -> AppResult<()> {
    let invalid = image.invalid_entries(true);
    if !invalid.is_empty() {
        return Err(CalError::Validation(format!(
            "Entries {:?} fail their checksum; refusing to write",
            invalid
        )));
    }

    session.connect()?;
    let result = probe_instrument(session)
        .and_then(|()| with_banner(session, WRITE_BANNER, |s| write_sram(s, image)));
    session.disconnect();
    result
}

/// Show `text` on the front panel around `body`, restoring the normal display after
fn with_banner<T, R, F>(session: &mut AdapterSession<T>, text: &str, body: F) -> AppResult<R>
where
    T: Transport,
    F: FnOnce(&mut AdapterSession<T>) -> AppResult<R>,
{
    session.query_instrument_binary(&display_command(text), 0)?;
    let result = body(session);
    let restored = session.query_instrument(protocol::DISPLAY_NORMAL, false);
    let value = result?;
    restored?;
    Ok(value)
}

fn read_nibble<T: Transport>(session: &mut AdapterSession<T>, address: u8) -> AppResult<u8> {
    match session.query_instrument_binary(&read_nibble_command(address), 1)? {
        Some(data) if data.len() == 1 => Ok(data[0]),
        Some(data) => Err(CalError::Transfer {
            address,
            reason: format!("expected 1 byte, got {}", data.len()),
        }),
        None => Err(CalError::Transfer {
            address,
            reason: "no response".to_string(),
        }),
    }
}

fn read_sram<T: Transport>(session: &mut AdapterSession<T>) -> AppResult<CalibrationImage> {
    info!(address = session.address(), "Reading calibration memory");
    let mut bytes = [0u8; IMAGE_LEN];
    for (address, slot) in (0..=u8::MAX).zip(bytes.iter_mut()) {
        *slot = read_nibble(session, address)?;
        debug!(address, value = *slot, "Read nibble");
    }
    info!("Read {} calibration nibbles", IMAGE_LEN);
    Ok(CalibrationImage::from(bytes))
}

fn write_sram<T: Transport>(session: &mut AdapterSession<T>, image: &CalibrationImage) -> AppResult<()> {
    info!(address = session.address(), "Writing calibration memory");
    for (address, &value) in (0..=u8::MAX).zip(image.as_bytes().iter()) {
        if session
            .query_instrument_binary(&write_nibble_command(address, value), 0)?
            .is_none()
        {
            return Err(CalError::Transfer {
                address,
                reason: "session closed during write".to_string(),
            });
        }

        let readback = read_nibble(session, address)?;
        if usize::from(address) != SENTINEL_INDEX
            && readback & NIBBLE_MASK != value & NIBBLE_MASK
        {
            return Err(CalError::Transfer {
                address,
                reason: format!(
                    "wrote 0x{:X}, read back 0x{:X}",
                    value & NIBBLE_MASK,
                    readback & NIBBLE_MASK
                ),
            });
        }
        debug!(address, value, "Wrote nibble");
    }
    info!("Wrote and verified {} calibration nibbles", IMAGE_LEN);
    Ok(())
}

/// Ask a yes/no question until answered; end of input counts as no
pub fn confirm<R: BufRead, W: Write>(prompt: &str, mut input: R, mut output: W) -> io::Result<bool> {
    loop {
        write!(output, "{} [y/n]: ", prompt)?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please answer yes or no.")?,
        }
    }
}
