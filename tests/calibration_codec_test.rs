//! Calibration codec over whole images

mod common;

use hp3478a_cal::calibration::{
    decode_gain, decode_offset, decode_offset_raw, validate_data, CalibrationEntry,
    CalibrationImage, ENTRIES_START, ENTRY_COUNT, ENTRY_LEN, IMAGE_LEN, UNUSED_ENTRIES,
};

/// Byte 0 = 0x40, all-zero entries carrying the checksum 0xFF
fn zero_image() -> [u8; IMAGE_LEN] {
    let mut bytes = [0u8; IMAGE_LEN];
    bytes[0] = 0x40;
    for index in 0..ENTRY_COUNT {
        let start = ENTRIES_START + index * ENTRY_LEN;
        bytes[start + 11] = 0x0F;
        bytes[start + 12] = 0x0F;
    }
    bytes
}

fn bump_checksum(bytes: &mut [u8; IMAGE_LEN], entry: usize) {
    let low = ENTRIES_START + entry * ENTRY_LEN + 12;
    bytes[low] = (bytes[low] + 1) & 0x0F;
}

/// BCD encoding used by the instrument for a signed offset in counts
fn encode_offset(value: i32) -> String {
    let stored = if value < 0 { value + 1_000_000 } else { value };
    format!("{:06}", stored)
}

#[test]
fn zero_filled_image_validates() {
    let bytes = zero_image();
    assert!(validate_data(&bytes, false).unwrap());
    assert!(CalibrationImage::from(bytes).validate(false));
}

#[test]
fn bumped_checksum_fails_unless_entry_is_reserved() {
    let mut bytes = zero_image();
    bump_checksum(&mut bytes, 3);
    assert!(!validate_data(&bytes, false).unwrap());
    assert!(!validate_data(&bytes, true).unwrap());

    for reserved in UNUSED_ENTRIES {
        let mut bytes = zero_image();
        bump_checksum(&mut bytes, reserved);
        assert!(!validate_data(&bytes, false).unwrap());
        assert!(validate_data(&bytes, true).unwrap(), "entry {}", reserved);
    }
}

#[test]
fn raw_digits_come_back_unchanged() {
    let entry = CalibrationEntry::from_raw_digits("0a19f3", "8f07c").unwrap();
    assert!(entry.is_valid());
    assert_eq!(entry.offset_raw(), "0a19f3");
    assert_eq!(entry.gain_raw(), "8f07c");
    assert_eq!(decode_offset_raw(entry.as_bytes()).unwrap(), "0a19f3");

    let rebuilt =
        CalibrationEntry::from_raw_digits(&entry.offset_raw(), &entry.gain_raw()).unwrap();
    assert_eq!(rebuilt, entry);
    assert_eq!(rebuilt.offset(), entry.offset());
    assert_eq!(rebuilt.gain(), entry.gain());
}

#[test]
fn decoded_values_survive_rebuild_from_raw_digits() {
    for (offset, gain) in [("000000", "00000"), ("912345", "7f81c"), ("099999", "fffff")] {
        let entry = CalibrationEntry::from_raw_digits(offset, gain).unwrap();
        let rebuilt =
            CalibrationEntry::from_raw_digits(&entry.offset_raw(), &entry.gain_raw()).unwrap();
        assert_eq!(rebuilt.offset(), entry.offset(), "offset {}", offset);
        assert_eq!(rebuilt.gain(), entry.gain(), "gain {}", gain);
        assert!(rebuilt.is_valid());
    }
}

#[test]
fn offset_decoding_inverts_bcd_encoding() {
    for value in [-100_000, -99_999, -12_345, -1, 0, 1, 42, 123_456, 899_999] {
        let entry = CalibrationEntry::from_raw_digits(&encode_offset(value), "00000").unwrap();
        assert_eq!(decode_offset(entry.as_bytes()).unwrap(), value);
        assert_eq!(entry.offset(), value);
    }
}

#[test]
fn gain_stays_within_correction_span() {
    let unity = CalibrationEntry::from_raw_digits("000000", "00000").unwrap();
    assert_eq!(unity.gain(), 1.0);

    let highest = CalibrationEntry::from_raw_digits("000000", "77777").unwrap();
    assert!((highest.gain() - 1.077_777).abs() < 1e-9);

    let lowest = CalibrationEntry::from_raw_digits("000000", "88888").unwrap();
    assert!((decode_gain(lowest.as_bytes()).unwrap() - 0.911_112).abs() < 1e-9);

    // All digits -1
    let minus_one = CalibrationEntry::from_raw_digits("000000", "fffff").unwrap();
    assert!((minus_one.gain() - 0.988_889).abs() < 1e-9);
}

#[test]
fn sample_image_lists_every_entry() {
    let image = common::sample_image();
    assert!(image.validate(false));
    assert!(validate_data(image.as_bytes(), false).unwrap());

    let table = image.describe_entries();
    assert_eq!(table.lines().count(), 2 + ENTRY_COUNT);
    assert!(!table.contains("BAD"));
}
