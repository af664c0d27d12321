//! Error types for serial acquisition
//!
//! Open failures are fatal and end the monitor before it starts polling.
//! Read and decode failures are recoverable: the line reader logs them and
//! treats the iteration as "no data".

use std::io;
use std::str::Utf8Error;
use thiserror::Error;

/// Failure to establish a serial connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Port parameters rejected before touching the device
    #[error("Invalid serial configuration: {0}")]
    InvalidConfig(String),

    /// The transport refused to open (device missing, busy, permission denied)
    #[error("Failed to open serial port {port} at {baud} baud: {source}")]
    Open {
        port: String,
        baud: u32,
        source: io::Error,
    },
}

/// Per-line read failure
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("Serial read failed: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid UTF-8 in serial data ({len} bytes): {source}", len = .bytes.len())]
    Decode { source: Utf8Error, bytes: Vec<u8> },

    #[error("Serial connection is closed")]
    Closed,
}

/// Reasons the monitor stopped abnormally
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Line handler failed: {0:#}")]
    Handler(anyhow::Error),
}
