//! Byte-stream boundary and scoped connection ownership
//!
//! Any concrete serial binding implements [`Transport`]. [`Connection`] wraps
//! one and guarantees the transport is closed exactly once, either through an
//! explicit [`Connection::close`] or when the connection is dropped.

use crate::error::ConnectionError;
use crate::serial::PortConfig;
use log::{debug, info, warn};
use std::io;

/// Minimal operations the line reader needs from a serial device
pub trait Transport {
    /// Number of bytes waiting in the input buffer. Must not block.
    fn bytes_available(&mut self) -> io::Result<u32>;

    /// Append bytes to `buf` up to and including the next `\n`, stopping early
    /// when the read timeout elapses. Returns the number of bytes appended.
    fn read_line_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    /// Write all of `data` and flush it to the device
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Release the underlying device
    fn close(&mut self) -> io::Result<()>;
}

/// An open transport, closed exactly once
pub struct Connection<T: Transport> {
    transport: T,
    port: String,
    closed: bool,
}

impl<T: Transport> Connection<T> {
    /// Validate `config` and open a transport with `open`
    pub fn open_with<F>(config: &PortConfig, open: F) -> Result<Self, ConnectionError>
    where
        F: FnOnce(&PortConfig) -> Result<T, ConnectionError>,
    {
        config.validate()?;

        info!(
            "Setting up serial connection on {} at {} baud",
            config.port_path, config.baud_rate
        );
        let transport = open(config)?;

        Ok(Self {
            transport,
            port: config.port_path.clone(),
            closed: false,
        })
    }

    /// Port identifier this connection was opened on
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Borrow the transport, or `None` once the connection is closed
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        if self.closed {
            None
        } else {
            Some(&mut self.transport)
        }
    }

    /// Write a string followed by `\r\n`
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        let transport = self
            .transport_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "connection closed"))?;

        let mut frame = Vec::with_capacity(text.len() + 2);
        frame.extend_from_slice(text.as_bytes());
        frame.extend_from_slice(b"\r\n");
        transport.write_bytes(&frame)
    }

    /// Close the transport. Calling this again is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            debug!("Serial connection {} already closed", self.port);
            return;
        }
        self.closed = true;

        if let Err(e) = self.transport.close() {
            warn!("Error while closing serial port {}: {}", self.port, e);
        }
        info!("Serial connection closed.");
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}
