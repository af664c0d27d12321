//! Serial line acquisition
//!
//! This module provides functionality for:
//! - Opening UART connections with guaranteed release
//! - Reading newline-delimited UTF-8 lines without blocking
//! - Running the fixed-interval acquisition loop

pub mod monitor;
pub mod port;
pub mod reader;
pub mod signal;
pub mod transport;

#[cfg(test)]
pub mod mock;

pub use monitor::{MonitorConfig, SerialMonitor};
pub use port::{PortConfig, SerialTransport};
pub use reader::LineReader;
pub use transport::{Connection, Transport};
