//! Command-line front end for reading and writing HP 3478A calibration memory.
//!
//! ```text
//! hp3478a-cal cal.bin                 # validate and list a calibration file
//! hp3478a-cal cal.bin --read 23       # dump the instrument at GPIB 23 to cal.bin
//! hp3478a-cal cal.bin --write 23      # push cal.bin to the instrument
//! ```

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{info, warn};

use hp3478a_cal::adapter::{validate_address, AdapterSession};
use hp3478a_cal::calibration::CalibrationImage;
use hp3478a_cal::config::{ToolConfig, DEFAULT_CONFIG_PATH};
use hp3478a_cal::error::CalError;
use hp3478a_cal::{logging, workflow};

#[derive(Parser, Debug)]
#[command(
    name = "hp3478a-cal",
    version,
    about = "Read, write and validate HP 3478A calibration memory over a GPIB-USB adapter"
)]
#[command(group(ArgGroup::new("mode").args(["read", "write"])))]
struct Cli {
    /// Calibration file (256 bytes)
    file: PathBuf,

    /// Read calibration from the instrument at this GPIB address into FILE
    #[arg(short, long, value_name = "ADDR", value_parser = parse_address)]
    read: Option<u8>,

    /// Write FILE to the instrument at this GPIB address
    #[arg(short, long, value_name = "ADDR", value_parser = parse_address)]
    write: Option<u8>,

    /// Accept calibration files longer than 256 bytes, using the first 256
    #[arg(long)]
    allow_oversize: bool,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn parse_address(text: &str) -> std::result::Result<u8, String> {
    let address: u8 = text
        .parse()
        .map_err(|_| format!("'{}' is not a GPIB address", text))?;
    validate_address(address).map_err(|e| e.to_string())
}

#[cfg(feature = "instrument_serial")]
fn open_session(config: &ToolConfig, address: u8) -> Result<AdapterSession<hp3478a_cal::transport::SerialTransport>> {
    let transport = hp3478a_cal::transport::SerialTransport::new(config.serial.clone());
    Ok(AdapterSession::new(transport, &config.adapter, address)?)
}

#[cfg(not(feature = "instrument_serial"))]
fn open_session(
    _config: &ToolConfig,
    _address: u8,
) -> Result<AdapterSession<hp3478a_cal::transport::MockTransport>> {
    Err(CalError::SerialFeatureDisabled.into())
}

fn read_from_instrument(config: &ToolConfig, cli: &Cli, address: u8) -> Result<()> {
    let mut session = open_session(config, address)?;
    let image = workflow::read_calibration(&mut session)
        .with_context(|| format!("Reading calibration from GPIB address {}", address))?;

    let invalid = image.invalid_entries(true);
    if invalid.is_empty() {
        info!("All calibration entries passed their checksum");
    } else {
        warn!(entries = ?invalid, "Calibration data failed checksum validation");
    }

    image
        .save(&cli.file)
        .with_context(|| format!("Saving calibration to {}", cli.file.display()))?;
    info!(path = %cli.file.display(), "Calibration saved");
    println!("{}", image.describe_entries());
    Ok(())
}

fn write_to_instrument(config: &ToolConfig, cli: &Cli, address: u8) -> Result<()> {
    let image = CalibrationImage::load(&cli.file, cli.allow_oversize)
        .with_context(|| format!("Loading calibration from {}", cli.file.display()))?;
    if !image.validate(true) {
        return Err(CalError::Validation(format!(
            "{} has entries {:?} with bad checksums",
            cli.file.display(),
            image.invalid_entries(true)
        ))
        .into());
    }
    println!("{}", image.describe_entries());

    let prompt = format!(
        "Overwrite calibration memory of the instrument at GPIB address {}?",
        address
    );
    if !workflow::confirm(&prompt, io::stdin().lock(), io::stdout())? {
        return Err(CalError::Aborted.into());
    }

    let mut session = open_session(config, address)?;
    workflow::write_calibration(&mut session, &image)
        .with_context(|| format!("Writing calibration to GPIB address {}", address))?;
    info!("Calibration written and verified");
    Ok(())
}

fn inspect_file(cli: &Cli) -> Result<()> {
    let image = CalibrationImage::load(&cli.file, cli.allow_oversize)
        .with_context(|| format!("Loading calibration from {}", cli.file.display()))?;
    println!("{}", image.describe_entries());
    if image.validate(true) {
        info!("All calibration entries passed their checksum");
    } else {
        warn!(entries = ?image.invalid_entries(true), "Calibration data failed checksum validation");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ToolConfig::load_from(&cli.config)
        .with_context(|| format!("Loading configuration from {}", cli.config.display()))?;
    logging::init_from_config(&config)?;

    match (cli.read, cli.write) {
        (Some(address), _) => read_from_instrument(&config, &cli, address),
        (_, Some(address)) => write_to_instrument(&config, &cli, address),
        (None, None) => inspect_file(&cli),
    }
}
