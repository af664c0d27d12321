//! Serial port configuration and the `serialport` transport
//!
//! Handles port discovery and opening a UART for line acquisition.

use crate::error::ConnectionError;
use crate::serial::Transport;
use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Baud rates accepted by [`PortConfig::validate`]
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    300, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 500000, 576000,
    921600, 1000000,
];

/// Default port identifier
pub const DEFAULT_PORT: &str = "COM3";

/// Default communication baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for serial port connection
#[derive(Debug, Clone, PartialEq)]
pub struct PortConfig {
    /// Serial port path (e.g., COM3, /dev/ttyUSB0, /dev/ttyACM0)
    pub port_path: String,
    /// Baud rate (default: 9600)
    pub baud_rate: u32,
    /// Read timeout, fixed for the life of the connection
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            port_path: String::from(DEFAULT_PORT),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PortConfig {
    /// Create a new configuration with default settings
    pub fn new(port_path: &str) -> Self {
        Self {
            port_path: port_path.to_string(),
            ..Default::default()
        }
    }

    /// Set the baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the parameters before any device is touched
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.port_path.trim().is_empty() {
            return Err(ConnectionError::InvalidConfig(
                "port identifier is empty".to_string(),
            ));
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(ConnectionError::InvalidConfig(format!(
                "unsupported baud rate {} (supported: {:?})",
                self.baud_rate, SUPPORTED_BAUD_RATES
            )));
        }
        Ok(())
    }
}

/// [`Transport`] backed by an OS serial port, 8N1 without flow control
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
}

impl SerialTransport {
    /// Open the port described by `config`
    pub fn open(config: &PortConfig) -> Result<Self, ConnectionError> {
        let port = serialport::new(&config.port_path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| ConnectionError::Open {
                port: config.port_path.clone(),
                baud: config.baud_rate,
                source: e.into(),
            })?;

        Ok(Self::from_port(port, config.timeout))
    }

    /// Wrap an already opened port; `timeout` must match the port's own
    pub fn from_port(port: Box<dyn SerialPort>, timeout: Duration) -> Self {
        Self {
            port: Some(port),
            timeout,
        }
    }

    fn port_mut(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> io::Result<u32> {
        Ok(self.port_mut()?.bytes_to_read()?)
    }

    /// Bytes already buffered by the driver are always drained up to the
    /// terminator; the timeout only ends the line while waiting for more.
    fn read_line_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let deadline = Instant::now() + self.timeout;
        let port = self.port_mut()?;
        let start = buf.len();
        let mut byte = [0u8; 1];

        loop {
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    buf.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline && port.bytes_to_read()? == 0 {
                debug!("Read timeout elapsed before line terminator");
                break;
            }
        }

        Ok(buf.len() - start)
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.port_mut()?;
        port.write_all(data)?;
        port.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the handle releases the OS descriptor
        if let Some(port) = self.port.take() {
            debug!("Releasing {}", port.name().unwrap_or_default());
        }
        Ok(())
    }
}

/// One-line description of what kind of device sits behind a port
fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut text = format!("USB {:04x}:{:04x}", usb.vid, usb.pid);
            for part in [&usb.manufacturer, &usb.product].into_iter().flatten() {
                text.push(' ');
                text.push_str(part);
            }
            text
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}

/// Print the ports the OS reports, one per line
pub fn print_ports() -> Result<()> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        println!("  Check the device is connected and powered");
        println!("  Linux: add your user to the 'dialout' group");
        return Ok(());
    }

    println!("{}", "Available Serial Ports:".green().bold());
    for port in &ports {
        println!(
            "  {:<20} {}",
            port.port_name.white().bold(),
            describe(&port.port_type).dimmed()
        );
    }
    println!(
        "{}",
        "Use: uart-reader monitor -p <PORT> to start acquisition".yellow()
    );

    Ok(())
}
