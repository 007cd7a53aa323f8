//! Calibration memory codec
//!
//! Pure interpretation of the instrument's 256-nibble calibration SRAM: the
//! entry layout, BCD offset and signed gain decoding, and the per-entry
//! checksum. Nothing here touches a transport.
//!
//! # Nibble encoding
//!
//! The instrument returns every SRAM nibble as `0x40 | value` so it survives
//! a text channel. Writes accept the value with or without that offset since
//! only the low nibble is stored. All decoding masks with `0x0F`.
//!
//! # Usage
//!
//! ```
//! use hp3478a_cal::calibration::{CalibrationEntry, CalibrationImage, ENTRY_COUNT};
//!
//! let entry = CalibrationEntry::from_raw_digits("000123", "01000").unwrap();
//! assert_eq!(entry.offset(), 123);
//! assert!((entry.gain() - 1.001).abs() < 1e-12);
//!
//! let image = CalibrationImage::from_entries(0x40, &[entry; ENTRY_COUNT]).unwrap();
//! assert!(image.validate(false));
//! println!("{}", image.describe_entries());
//! ```

pub mod entry;
pub mod image;
pub mod report;

pub use entry::{
    decode_gain, decode_gain_raw, decode_offset, decode_offset_raw, validate_entry,
    CalibrationEntry, CHECKSUM_TARGET, ENTRY_LEN,
};
pub use image::{
    is_unused_entry, validate_data, CalibrationImage, ENTRIES_LEN, ENTRIES_START, ENTRY_COUNT,
    IMAGE_LEN, RANGE_LABELS, SENTINEL_INDEX, UNUSED_ENTRIES,
};
pub use report::{describe_entries, EntryTable};

/// Offset the instrument adds to each SRAM nibble on read
pub const NIBBLE_OFFSET: u8 = 0x40;

/// Mask selecting the stored value of a transferred byte
pub const NIBBLE_MASK: u8 = 0x0F;
