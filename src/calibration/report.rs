//! Console listing of a calibration image

use std::fmt;

use super::image::{is_unused_entry, CalibrationImage, RANGE_LABELS};

/// Fixed-width table of all entries, rendered through `Display`
pub struct EntryTable<'a> {
    image: &'a CalibrationImage,
}

impl<'a> EntryTable<'a> {
    /// Table over the entries of `image`
    pub fn new(image: &'a CalibrationImage) -> Self {
        Self { image }
    }
}

impl fmt::Display for EntryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calibration switch byte: 0x{:02X}", self.image.sentinel())?;
        writeln!(
            f,
            "{:>2}  {:<16} {:>6} {:>8}  {:>5} {:>9}  {:>2}  {}",
            "#", "Range", "Offset", "", "Gain", "", "CS", "Status"
        )?;
        for (index, (entry, label)) in self.image.entries().zip(RANGE_LABELS).enumerate() {
            let (high, low) = entry.checksum();
            let status = match (entry.is_valid(), is_unused_entry(index)) {
                (true, _) => "ok",
                (false, true) => "unused",
                (false, false) => "BAD",
            };
            writeln!(
                f,
                "{:>2}  {:<16} {:>6} {:>8}  {:>5} {:>9.6}  {:x}{:x}  {}",
                index,
                label,
                entry.offset_raw(),
                entry.offset(),
                entry.gain_raw(),
                entry.gain(),
                high,
                low,
                status
            )?;
        }
        Ok(())
    }
}

/// Render the entry table of an image as text
pub fn describe_entries(image: &CalibrationImage) -> String {
    EntryTable::new(image).to_string()
}

impl CalibrationImage {
    /// Human-readable listing of all 19 entries
    pub fn describe_entries(&self) -> String {
        describe_entries(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationEntry, ENTRY_COUNT};

    #[test]
    fn test_table_rows() {
        let mut entries = vec![CalibrationEntry::from_raw_digits("000000", "00000").unwrap(); ENTRY_COUNT];
        entries[0] = CalibrationEntry::from_raw_digits("999990", "70000").unwrap();
        let image = CalibrationImage::from_entries(0x4F, &entries).unwrap();

        let table = image.describe_entries();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2 + ENTRY_COUNT);
        assert!(lines[0].contains("0x4F"));
        assert!(lines[2].contains("30 mV DC"));
        assert!(lines[2].contains("999990"));
        assert!(lines[2].contains("-10"));
        assert!(lines[2].contains("1.070000"));
        assert!(lines[2].ends_with("ok"));
        assert!(lines[2 + 18].contains("Not used"));
    }

    #[test]
    fn test_bad_and_unused_status() {
        let mut bytes = [0x40u8; 256];
        let entry = CalibrationEntry::from_raw_digits("000100", "00000").unwrap();
        bytes[1..14].copy_from_slice(entry.as_bytes());
        let image = CalibrationImage::from(bytes);

        let table = describe_entries(&image);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[2].ends_with("ok"));
        assert!(lines[3].ends_with("BAD"));
        assert!(lines[2 + 5].ends_with("unused"));
    }
}
