//! Configuration file support
//!
//! Settings are read from an optional TOML file:
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! timeout_ms = 1000
//! poll_interval_ms = 500
//! ```
//!
//! Missing keys fall back to the built-in defaults. CLI flags override both.

use crate::serial::monitor::DEFAULT_POLL_INTERVAL;
use crate::serial::port::{DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::serial::{MonitorConfig, PortConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub serial: SerialSettings,
}

/// `[serial]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSettings {
    /// Port identifier (COM3, /dev/ttyUSB0, ...)
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub timeout_ms: u64,
    /// Pause between polls in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn port_config(&self) -> PortConfig {
        PortConfig::new(&self.serial.port)
            .with_baud_rate(self.serial.baud_rate)
            .with_timeout(Duration::from_millis(self.serial.timeout_ms))
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            port_config: self.port_config(),
            poll_interval: Duration::from_millis(self.serial.poll_interval_ms),
            max_iterations: None,
        }
    }
}
