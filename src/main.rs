//! UART Line Reader
//!
//! Polls a serial device for newline-delimited text and hands each line to a
//! processing step (log output, capture file).
//!
//! # Usage
//!
//! ```bash
//! # List available serial ports
//! uart-reader list
//!
//! # Acquire lines from COM3 at 9600 baud (the defaults)
//! uart-reader monitor
//!
//! # Acquire from a specific port and also capture to a file
//! uart-reader monitor -p /dev/ttyUSB0 -b 115200 -o capture.log
//!
//! # Use settings from a config file
//! uart-reader --config uart-reader.toml monitor
//!
//! # Send a command to the device
//! uart-reader send -p /dev/ttyUSB0 d
//! ```

mod config;
mod error;
mod handler;
mod serial;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use config::AppConfig;
use handler::{FileHandler, LineHandler, LogHandler, Tee};
use serial::{Connection, MonitorConfig, SerialMonitor, SerialTransport};

/// UART Line Reader
///
/// Fixed-interval line acquisition from serial devices
#[derive(Parser)]
#[command(name = "uart-reader")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Polling line reader for UART/serial data acquisition")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML config file with a [serial] table
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    List,

    /// Read lines from a serial port until Ctrl+C
    Monitor {
        /// Serial port (e.g., COM3, /dev/ttyUSB0)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// Read timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Pause between polls in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Also append timestamped lines to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },

    /// Send a command line to the serial port
    Send {
        /// Serial port path
        #[arg(short, long)]
        port: String,

        /// Command to send (terminated with CRLF)
        command: String,

        /// Baud rate
        #[arg(short, long)]
        baud: Option<u32>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let app_config = match cli.config {
        Some(ref path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::List => {
            serial::port::print_ports()?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Monitor {
            port,
            baud,
            timeout_ms,
            interval_ms,
            output,
            count,
        } => {
            let mut config = app_config.monitor_config();
            if let Some(p) = port {
                config.port_config.port_path = p;
            }
            if let Some(b) = baud {
                config.port_config.baud_rate = b;
            }
            if let Some(ms) = timeout_ms {
                config.port_config.timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = interval_ms {
                config.poll_interval = Duration::from_millis(ms);
            }
            config.max_iterations = count;

            match output {
                Some(path) => {
                    let capture = FileHandler::create(&path)?;
                    println!(
                        "{} Capturing to: {}",
                        "[LOG]".cyan().bold(),
                        capture.path().display().to_string().white()
                    );
                    run_monitor(config, Tee::new(LogHandler, capture))
                }
                None => run_monitor(config, LogHandler),
            }
        }

        Commands::Send {
            port,
            command,
            baud,
        } => {
            let mut port_config = app_config.port_config();
            port_config.port_path = port;
            if let Some(b) = baud {
                port_config.baud_rate = b;
            }

            let mut conn = Connection::open_with(&port_config, SerialTransport::open)?;

            println!(
                "{} Sending to {} at {} baud: {}",
                "[TX]".cyan().bold(),
                conn.port(),
                port_config.baud_rate,
                command
            );
            conn.write_line(&command)
                .with_context(|| format!("Failed to write to {}", conn.port()))?;
            conn.close();

            println!("{}", "[OK] Command sent".green());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run the acquisition loop with Ctrl+C handling
fn run_monitor<H: LineHandler>(config: MonitorConfig, handler: H) -> Result<ExitCode> {
    println!(
        "{} {} at {} baud, polling every {:?}",
        "[*]".cyan().bold(),
        config.port_config.port_path.white().bold(),
        config.port_config.baud_rate,
        config.poll_interval
    );
    println!("{}", "Press Ctrl+C to stop".yellow());

    let mut monitor = SerialMonitor::new(config, handler);
    serial::signal::install(monitor.running_flag()).context("Failed to set Ctrl+C handler")?;

    match monitor.run(SerialTransport::open) {
        Ok(summary) => {
            println!(
                "{} {} lines processed, {} read faults",
                "[OK]".green().bold(),
                summary.lines,
                summary.read_faults
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}
