//! Simulated GPIB adapter with an HP 3478A behind it, over the mock transport

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hp3478a_cal::calibration::{CalibrationEntry, CalibrationImage, ENTRY_COUNT, IMAGE_LEN};
use hp3478a_cal::config::AdapterConfig;
use hp3478a_cal::transport::MockTransport;

pub const ADAPTER_VERSION: &str = "Prologix GPIB-USB Controller version 6.107";
pub const ESC: u8 = 0x1B;

/// Knobs for misbehaving hardware
#[derive(Clone)]
pub struct BenchOptions {
    /// Text returned by `++ver`
    pub version: String,
    /// Reply to the `S` status probe; `None` means the instrument is absent
    pub status: Option<String>,
    /// SRAM address whose `W` read never answers
    pub silent_address: Option<u8>,
    /// SRAM address that stores the wrong value on `X`
    pub faulty_address: Option<u8>,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            version: ADAPTER_VERSION.to_string(),
            status: Some("0".to_string()),
            silent_address: None,
            faulty_address: None,
        }
    }
}

/// Handles onto the simulated hardware
pub struct Bench {
    pub transport: MockTransport,
    pub sram: Arc<Mutex<[u8; IMAGE_LEN]>>,
    pub display: Arc<Mutex<Vec<String>>>,
}

impl Bench {
    pub fn sram_nibbles(&self) -> [u8; IMAGE_LEN] {
        *self.sram.lock().unwrap()
    }

    pub fn instrument_writes(&self) -> Vec<Vec<u8>> {
        self.transport
            .writes()
            .into_iter()
            .filter(|w| !w.starts_with(b"++"))
            .collect()
    }

    pub fn count_commands(&self, first: u8) -> usize {
        self.instrument_writes()
            .iter()
            .filter(|w| w.first() == Some(&first))
            .count()
    }
}

fn unescape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        if b == ESC {
            if let Some(&next) = iter.next() {
                out.push(next);
            }
        } else {
            out.push(b);
        }
    }
    out
}

/// Build a bench whose SRAM starts with the low nibbles of `initial`
pub fn bench(initial: &[u8; IMAGE_LEN], options: BenchOptions) -> Bench {
    let mut nibbles = [0u8; IMAGE_LEN];
    for (slot, byte) in nibbles.iter_mut().zip(initial) {
        *slot = byte & 0x0F;
    }
    let sram = Arc::new(Mutex::new(nibbles));
    let display = Arc::new(Mutex::new(Vec::new()));

    let mut settings: HashMap<String, String> = HashMap::new();
    let mut pending: Vec<u8> = Vec::new();
    let sram_handle = Arc::clone(&sram);
    let display_handle = Arc::clone(&display);

    let transport = MockTransport::new().with_responder(move |written: &[u8]| {
        let body = written.strip_suffix(b"\r").unwrap_or(written);

        if body.starts_with(b"++") {
            let line = String::from_utf8_lossy(&body[2..]).to_string();
            return match line.as_str() {
                "ver" => format!("{}\r\n", options.version).into_bytes(),
                "read eoi" => std::mem::take(&mut pending),
                "ifc" => Vec::new(),
                _ => match line.split_once(' ') {
                    Some((name, value)) => {
                        settings.insert(name.to_string(), value.to_string());
                        Vec::new()
                    }
                    None => settings
                        .get(&line)
                        .map(|v| format!("{}\r\n", v).into_bytes())
                        .unwrap_or_default(),
                },
            };
        }

        let command = unescape(body);
        let mut sram = sram_handle.lock().unwrap();
        match command.as_slice() {
            b"S" => {
                pending = options
                    .status
                    .as_ref()
                    .map(|s| format!("{}\r\n", s).into_bytes())
                    .unwrap_or_default();
            }
            [b'W', address] => {
                pending = if options.silent_address == Some(*address) {
                    Vec::new()
                } else {
                    vec![0x40 | sram[usize::from(*address)]]
                };
            }
            [b'X', address, value] => {
                let mut nibble = value & 0x0F;
                if options.faulty_address == Some(*address) {
                    nibble = (nibble + 1) & 0x0F;
                }
                // The switch byte follows the hardware, not the host
                if *address != 0 {
                    sram[usize::from(*address)] = nibble;
                }
            }
            [b'D', ..] => {
                let text = command.strip_suffix(b"\r").unwrap_or(&command);
                display_handle
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(text).to_string());
            }
            _ => {}
        }
        Vec::new()
    });

    Bench {
        transport,
        sram,
        display,
    }
}

pub fn adapter_config(timeout_ms: u64) -> AdapterConfig {
    AdapterConfig {
        version: "GPIB-USB".to_string(),
        timeout_ms,
    }
}

/// A checksum-valid image with distinct entries
pub fn sample_image() -> CalibrationImage {
    let entries: Vec<CalibrationEntry> = (0..ENTRY_COUNT)
        .map(|i| {
            let offset = format!("{:06}", (i * 4_999) % 1_000_000);
            let gain = format!("{:x}{:x}000", i % 16, (i * 3) % 16);
            CalibrationEntry::from_raw_digits(&offset, &gain).unwrap()
        })
        .collect();
    CalibrationImage::from_entries(0x40, &entries).unwrap()
}
