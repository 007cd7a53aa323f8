//! Adapter directives and instrument command framing
//!
//! Lines sent to the adapter end in a carriage return. Lines starting with
//! `++` are consumed by the adapter itself; everything else is forwarded to
//! the addressed instrument. The adapter also intercepts CR, LF, ESC and `+`
//! inside a line, so any of those meant for the instrument has to be preceded
//! by ESC. The SRAM commands escape their binary arguments unconditionally.

/// Line terminator for every write to the adapter
pub const LINE_TERMINATOR: u8 = b'\r';

/// Adapter escape byte
pub const ESC: u8 = 0x1B;

/// Adapter identification query
pub const VERSION: &str = "++ver";
/// Request a read from the instrument until EOI
pub const READ_EOI: &str = "++read eoi";
/// Interface clear pulse
pub const INTERFACE_CLEAR: &str = "++ifc";

/// Adapter setting that is written then read back during initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// Controller mode
    Mode,
    /// Read-after-write
    Auto,
    /// EOI assertion on the last byte written
    Eoi,
    /// Characters appended to writes
    Eos,
    /// Character appended when EOI is seen on reads
    EotEnable,
    /// Adapter read timeout in milliseconds
    ReadTimeout,
    /// Target GPIB address
    Address,
}

impl Setting {
    /// Directive name without arguments; sent alone it queries the setting
    pub fn directive(self) -> &'static str {
        match self {
            Self::Mode => "++mode",
            Self::Auto => "++auto",
            Self::Eoi => "++eoi",
            Self::Eos => "++eos",
            Self::EotEnable => "++eot_enable",
            Self::ReadTimeout => "++read_tmo_ms",
            Self::Address => "++addr",
        }
    }

    /// Directive that sets the value, e.g. `++mode 1`
    pub fn assign(self, value: impl std::fmt::Display) -> String {
        format!("{} {}", self.directive(), value)
    }
}

/// Instrument status probe; answers `0` or `1`
pub const STATUS: &str = "S";
/// Return the front panel to normal display
pub const DISPLAY_NORMAL: &str = "D1";

/// Prefix every byte with ESC so the adapter forwards it verbatim
pub fn escape(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|&b| [ESC, b]).collect()
}

/// `W` ESC `<addr>`: read one SRAM nibble
pub fn read_nibble_command(address: u8) -> Vec<u8> {
    let mut command = vec![b'W'];
    command.extend(escape(&[address]));
    command
}

/// `X` ESC `<addr>` ESC `<val>`: write one SRAM nibble
///
/// The instrument only honors the low nibble of `value`, so it may be passed
/// with or without the 0x40 offset.
pub fn write_nibble_command(address: u8, value: u8) -> Vec<u8> {
    let mut command = vec![b'X'];
    command.extend(escape(&[address, value]));
    command
}

/// `D2<text>` ESC CR: show custom text on the front panel
pub fn display_command(text: &str) -> Vec<u8> {
    let mut command = Vec::with_capacity(text.len() + 4);
    command.extend_from_slice(b"D2");
    command.extend_from_slice(text.as_bytes());
    command.extend_from_slice(&[ESC, LINE_TERMINATOR]);
    command
}
