//! Serial transport for USB-serial GPIB adapters
//!
//! Wraps the `serialport` crate with the port parameters from
//! [`SerialConfig`]. All I/O is blocking; the session bounds every wait
//! with its own deadline, so the port's read timeout only needs to be short.

use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::debug;

use super::Transport;
use crate::config::{FlowControl, Parity, SerialConfig};

/// Per-read timeout of the OS serial handle
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial connection to the adapter
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create an unopened transport for the given port parameters
    pub fn new(config: SerialConfig) -> Self {
        Self { config, port: None }
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "Serial port not open"))
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> io::Result<()> {
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .data_bits(data_bits(self.config.data_bits))
            .stop_bits(stop_bits(self.config.stop_bits))
            .parity(self.config.parity.into())
            .flow_control(self.config.flow_control.into())
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| {
                io::Error::new(
                    io::Error::from(e.clone()).kind(),
                    format!(
                        "Failed to open serial port '{}' at {} baud: {}",
                        self.config.port, self.config.baud_rate, e
                    ),
                )
            })?;

        self.port = Some(port);
        debug!(
            "Serial port '{}' opened at {} baud",
            self.config.port, self.config.baud_rate
        );
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.port.take().is_some() {
            debug!("Serial port '{}' closed", self.config.port);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port_mut()?
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let waiting = self.port_mut()?.bytes_to_read().map_err(io::Error::from)?;
        Ok(waiting as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port_mut()?.read(buf)
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.config.port, self.config.baud_rate)
    }
}
