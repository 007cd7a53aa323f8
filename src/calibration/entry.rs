//! One 13-nibble calibration record
//!
//! ```text
//! byte   0  1  2  3  4  5 | 6  7  8  9 10 | 11 12
//!        offset (BCD)     | gain (signed) | checksum hi, lo
//! ```
//!
//! Only the low nibble of each byte is meaningful. An entry is valid when the
//! eleven data nibbles plus the checksum byte reassembled from bytes 11 and
//! 12 add up to 0xFF modulo 256.

use std::fmt;
use std::ops::Range;

use super::{NIBBLE_MASK, NIBBLE_OFFSET};
use crate::error::{AppResult, CalError};

/// Bytes per calibration entry
pub const ENTRY_LEN: usize = 13;

/// Value the modular checksum of a valid entry adds up to
pub const CHECKSUM_TARGET: u8 = 0xFF;

const OFFSET_DIGITS: Range<usize> = 0..6;
const GAIN_DIGITS: Range<usize> = 6..11;
const CHECKSUM_HIGH: usize = 11;
const CHECKSUM_LOW: usize = 12;

/// Offsets at or above this magnitude encode negative values
const NEGATIVE_OFFSET_THRESHOLD: i32 = 900_000;
const OFFSET_MODULUS: i32 = 1_000_000;

fn nibble(byte: u8) -> u8 {
    byte & NIBBLE_MASK
}

/// Signed 4-bit digit: 8..=15 map to -8..=-1
fn signed_nibble(byte: u8) -> i8 {
    let value = nibble(byte) as i8;
    if value >= 8 {
        value - 16
    } else {
        value
    }
}

fn hex_digits(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| format!("{:x}", nibble(b))).collect()
}

fn parse_hex_digits(text: &str, expected: usize) -> AppResult<Vec<u8>> {
    if text.chars().count() != expected {
        return Err(CalError::Format {
            expected,
            actual: text.chars().count(),
        });
    }
    text.chars()
        .map(|c| {
            c.to_digit(16)
                .map(|d| NIBBLE_OFFSET | d as u8)
                .ok_or_else(|| {
                    CalError::Validation(format!("'{}' is not a hexadecimal digit", c))
                })
        })
        .collect()
}

/// A calibration entry exactly as stored in SRAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationEntry([u8; ENTRY_LEN]);

impl TryFrom<&[u8]> for CalibrationEntry {
    type Error = CalError;

    fn try_from(bytes: &[u8]) -> AppResult<Self> {
        let bytes: [u8; ENTRY_LEN] = bytes.try_into().map_err(|_| CalError::Format {
            expected: ENTRY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }
}

impl From<[u8; ENTRY_LEN]> for CalibrationEntry {
    fn from(bytes: [u8; ENTRY_LEN]) -> Self {
        Self(bytes)
    }
}

impl CalibrationEntry {
    /// Build a valid entry from 6 offset and 5 gain hex digits
    ///
    /// Nibbles are stored with the instrument's 0x40 offset and the checksum
    /// nibbles are computed so the entry validates.
    pub fn from_raw_digits(offset_raw: &str, gain_raw: &str) -> AppResult<Self> {
        let mut bytes = [NIBBLE_OFFSET; ENTRY_LEN];
        bytes[OFFSET_DIGITS].copy_from_slice(&parse_hex_digits(offset_raw, OFFSET_DIGITS.len())?);
        bytes[GAIN_DIGITS].copy_from_slice(&parse_hex_digits(gain_raw, GAIN_DIGITS.len())?);

        let checksum = CHECKSUM_TARGET.wrapping_sub(data_sum(&bytes));
        bytes[CHECKSUM_HIGH] = NIBBLE_OFFSET | (checksum >> 4);
        bytes[CHECKSUM_LOW] = NIBBLE_OFFSET | (checksum & 0x0F);
        Ok(Self(bytes))
    }

    /// Raw bytes of the entry
    pub fn as_bytes(&self) -> &[u8; ENTRY_LEN] {
        &self.0
    }

    /// Modular sum of the data nibbles and the reassembled checksum byte
    pub fn checksum_sum(&self) -> u8 {
        data_sum(&self.0)
            .wrapping_add(nibble(self.0[CHECKSUM_HIGH]) << 4)
            .wrapping_add(nibble(self.0[CHECKSUM_LOW]))
    }

    /// Whether the checksum adds up
    pub fn is_valid(&self) -> bool {
        self.checksum_sum() == CHECKSUM_TARGET
    }

    /// Checksum nibbles as (high, low)
    pub fn checksum(&self) -> (u8, u8) {
        (nibble(self.0[CHECKSUM_HIGH]), nibble(self.0[CHECKSUM_LOW]))
    }

    /// Offset in counts: six BCD digits, the top decade encoding -100000..-1
    pub fn offset(&self) -> i32 {
        let magnitude = self.0[OFFSET_DIGITS]
            .iter()
            .fold(0i32, |acc, &b| acc * 10 + i32::from(nibble(b)));
        if magnitude >= NEGATIVE_OFFSET_THRESHOLD {
            magnitude - OFFSET_MODULUS
        } else {
            magnitude
        }
    }

    /// Offset nibbles as hex digits, undecoded
    pub fn offset_raw(&self) -> String {
        hex_digits(&self.0[OFFSET_DIGITS])
    }

    /// Gain factor: unity plus signed corrections from 1e-2 down to 1e-6
    pub fn gain(&self) -> f64 {
        self.0[GAIN_DIGITS]
            .iter()
            .zip(2..)
            .fold(1.0, |acc, (&b, power)| {
                acc + f64::from(signed_nibble(b)) / 10f64.powi(power)
            })
    }

    /// Gain nibbles as hex digits, undecoded
    pub fn gain_raw(&self) -> String {
        hex_digits(&self.0[GAIN_DIGITS])
    }
}

fn data_sum(bytes: &[u8; ENTRY_LEN]) -> u8 {
    bytes[..CHECKSUM_HIGH]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(nibble(b)))
}

impl fmt::Display for CalibrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "offset {} ({}) gain {:.6} ({})",
            self.offset(),
            self.offset_raw(),
            self.gain(),
            self.gain_raw()
        )
    }
}

// =============================================================================
// Slice-level codec functions
// =============================================================================

/// Check one entry's checksum; the slice must be exactly 13 bytes
pub fn validate_entry(bytes: &[u8]) -> AppResult<bool> {
    Ok(CalibrationEntry::try_from(bytes)?.is_valid())
}

/// Decode the BCD offset of a 13-byte entry
pub fn decode_offset(bytes: &[u8]) -> AppResult<i32> {
    Ok(CalibrationEntry::try_from(bytes)?.offset())
}

/// Offset nibbles of a 13-byte entry as hex digits
pub fn decode_offset_raw(bytes: &[u8]) -> AppResult<String> {
    Ok(CalibrationEntry::try_from(bytes)?.offset_raw())
}

/// Decode the gain of a 13-byte entry
pub fn decode_gain(bytes: &[u8]) -> AppResult<f64> {
    Ok(CalibrationEntry::try_from(bytes)?.gain())
}

/// Gain nibbles of a 13-byte entry as hex digits
pub fn decode_gain_raw(bytes: &[u8]) -> AppResult<String> {
    Ok(CalibrationEntry::try_from(bytes)?.gain_raw())
}
