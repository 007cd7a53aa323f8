//! The 256-nibble calibration SRAM image
//!
//! Byte 0 mirrors the front-panel calibration switch and is not calibration
//! data. Bytes 1..248 hold 19 entries of 13 nibbles, one per measurement
//! range. Bytes 248..256 are unused.

use std::fs;
use std::path::Path;

use tracing::debug;

use super::entry::{CalibrationEntry, ENTRY_LEN};
use super::NIBBLE_OFFSET;
use crate::error::{AppResult, CalError};

/// Bytes in a full SRAM image and in a calibration file
pub const IMAGE_LEN: usize = 256;

/// Position of the calibration switch byte
pub const SENTINEL_INDEX: usize = 0;

/// Number of calibration entries
pub const ENTRY_COUNT: usize = 19;

/// Offset of the first entry in the image
pub const ENTRIES_START: usize = 1;

/// Length of the entry region
pub const ENTRIES_LEN: usize = ENTRY_COUNT * ENTRY_LEN;

/// Entry indices the instrument leaves unprogrammed
pub const UNUSED_ENTRIES: [usize; 3] = [5, 16, 18];

/// Front-panel range each entry calibrates
pub const RANGE_LABELS: [&str; ENTRY_COUNT] = [
    "30 mV DC",
    "300 mV DC",
    "3 V DC",
    "30 V DC",
    "300 V DC",
    "Not used",
    "AC V",
    "30 Ohm 2W/4W",
    "300 Ohm 2W/4W",
    "3 kOhm 2W/4W",
    "30 kOhm 2W/4W",
    "300 kOhm 2W/4W",
    "3 MOhm 2W/4W",
    "30 MOhm 2W/4W",
    "300 mA DC",
    "3 A DC",
    "Not used",
    "300 mA/3 A AC",
    "Not used",
];

/// Whether an entry index is one of the reserved ones
pub fn is_unused_entry(index: usize) -> bool {
    UNUSED_ENTRIES.contains(&index)
}

/// Validate every entry of an image
///
/// Accepts either the 247-byte entry region or a full 256-byte image, from
/// which the entry region is taken. With `skip_unused` the reserved entries
/// are not checked.
pub fn validate_data(data: &[u8], skip_unused: bool) -> AppResult<bool> {
    let entries = match data.len() {
        ENTRIES_LEN => data,
        IMAGE_LEN => &data[ENTRIES_START..ENTRIES_START + ENTRIES_LEN],
        actual => {
            return Err(CalError::Format {
                expected: ENTRIES_LEN,
                actual,
            })
        }
    };

    for (index, chunk) in entries.chunks_exact(ENTRY_LEN).enumerate() {
        if skip_unused && is_unused_entry(index) {
            continue;
        }
        if !CalibrationEntry::try_from(chunk)?.is_valid() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Complete calibration memory contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationImage {
    bytes: [u8; IMAGE_LEN],
}

impl From<[u8; IMAGE_LEN]> for CalibrationImage {
    fn from(bytes: [u8; IMAGE_LEN]) -> Self {
        Self { bytes }
    }
}

impl CalibrationImage {
    /// Build an image from file or instrument bytes
    ///
    /// Exactly 256 bytes are required unless `allow_oversize` is set, in
    /// which case longer input is accepted and truncated to 256 bytes.
    pub fn from_bytes(data: &[u8], allow_oversize: bool) -> AppResult<Self> {
        let len = data.len();
        if len < IMAGE_LEN || (len > IMAGE_LEN && !allow_oversize) {
            return Err(CalError::FileSize { len });
        }
        let mut bytes = [0u8; IMAGE_LEN];
        bytes.copy_from_slice(&data[..IMAGE_LEN]);
        Ok(Self { bytes })
    }

    /// Assemble an image from a sentinel value and all 19 entries
    ///
    /// The unused tail is filled with zero nibbles.
    pub fn from_entries(sentinel: u8, entries: &[CalibrationEntry]) -> AppResult<Self> {
        if entries.len() != ENTRY_COUNT {
            return Err(CalError::Format {
                expected: ENTRY_COUNT,
                actual: entries.len(),
            });
        }
        let mut bytes = [NIBBLE_OFFSET; IMAGE_LEN];
        bytes[SENTINEL_INDEX] = sentinel;
        for (chunk, entry) in bytes[ENTRIES_START..ENTRIES_START + ENTRIES_LEN]
            .chunks_exact_mut(ENTRY_LEN)
            .zip(entries)
        {
            chunk.copy_from_slice(entry.as_bytes());
        }
        Ok(Self { bytes })
    }

    /// Read a calibration file
    pub fn load<P: AsRef<Path>>(path: P, allow_oversize: bool) -> AppResult<Self> {
        let data = fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), len = data.len(), "Calibration file read");
        Self::from_bytes(&data, allow_oversize)
    }

    /// Write the image as a 256-byte calibration file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        fs::write(path.as_ref(), self.bytes)?;
        debug!(path = %path.as_ref().display(), "Calibration file written");
        Ok(())
    }

    /// Raw image bytes
    pub fn as_bytes(&self) -> &[u8; IMAGE_LEN] {
        &self.bytes
    }

    /// Calibration switch byte
    pub fn sentinel(&self) -> u8 {
        self.bytes[SENTINEL_INDEX]
    }

    /// Entry by index (0..19)
    pub fn entry(&self, index: usize) -> Option<CalibrationEntry> {
        if index >= ENTRY_COUNT {
            return None;
        }
        let start = ENTRIES_START + index * ENTRY_LEN;
        let mut bytes = [0u8; ENTRY_LEN];
        bytes.copy_from_slice(&self.bytes[start..start + ENTRY_LEN]);
        Some(CalibrationEntry::from(bytes))
    }

    /// All 19 entries in order
    pub fn entries(&self) -> impl Iterator<Item = CalibrationEntry> + '_ {
        (0..ENTRY_COUNT).filter_map(move |index| self.entry(index))
    }

    /// Whether every checked entry has a valid checksum
    pub fn validate(&self, skip_unused: bool) -> bool {
        self.invalid_entries(skip_unused).is_empty()
    }

    /// Indices of entries failing their checksum
    pub fn invalid_entries(&self, skip_unused: bool) -> Vec<usize> {
        self.entries()
            .enumerate()
            .filter(|(index, entry)| !(skip_unused && is_unused_entry(*index)) && !entry.is_valid())
            .map(|(index, _)| index)
            .collect()
    }
}
