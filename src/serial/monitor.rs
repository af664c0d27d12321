//! Serial acquisition loop
//!
//! Opens the connection, polls the [`LineReader`] at a fixed interval and
//! forwards each non-empty line to a [`LineHandler`]:
//!
//! ```text
//! Starting --open ok--> Running --interrupt / handler error--> Stopping --> Stopped
//!     \----open failed------------------------------------------------------^
//! ```
//!
//! Read and decode faults only skip the current iteration. The connection
//! is closed exactly once on every path out of `Running`.

use crate::error::{ConnectionError, MonitorError};
use crate::handler::LineHandler;
use crate::serial::{Connection, LineReader, PortConfig, Transport};
use log::{debug, error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default pause between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the acquisition loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Port configuration
    pub port_config: PortConfig,
    /// Fixed sleep after every iteration, whether or not data was read
    pub poll_interval: Duration,
    /// Stop normally after this many iterations
    pub max_iterations: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port_config: PortConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_iterations: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorSummary {
    pub iterations: u64,
    pub lines: u64,
    pub read_faults: u64,
}

/// Polling line monitor
pub struct SerialMonitor<H: LineHandler> {
    config: MonitorConfig,
    handler: H,
    reader: LineReader,
    state: MonitorState,
    iterations: u64,
    lines: u64,
    running: Arc<AtomicBool>,
}

impl<H: LineHandler> SerialMonitor<H> {
    /// Create a new serial monitor with the given configuration
    pub fn new(config: MonitorConfig, handler: H) -> Self {
        Self {
            config,
            handler,
            reader: LineReader::new(),
            state: MonitorState::Starting,
            iterations: 0,
            lines: 0,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a clone of the running flag for signal handling. Clearing it, even
    /// before [`run`](Self::run) is called, stops the loop.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn summary(&self) -> MonitorSummary {
        MonitorSummary {
            iterations: self.iterations,
            lines: self.lines,
            read_faults: self.reader.faults(),
        }
    }

    /// Open a transport with `open` and poll it until interrupted
    pub fn run<T, F>(&mut self, open: F) -> Result<MonitorSummary, MonitorError>
    where
        T: Transport,
        F: FnOnce(&PortConfig) -> Result<T, ConnectionError>,
    {
        self.state = MonitorState::Starting;

        let mut conn = match Connection::open_with(&self.config.port_config, open) {
            Ok(conn) => conn,
            Err(e) => {
                error!("Error setting up serial connection: {}", e);
                self.state = MonitorState::Stopped;
                return Err(e.into());
            }
        };

        info!("Serial connection established. Entering main data acquisition loop.");
        self.state = MonitorState::Running;

        let outcome = self.poll(&mut conn);

        self.state = MonitorState::Stopping;
        conn.close();
        self.state = MonitorState::Stopped;

        self.log_summary();
        outcome.map(|()| self.summary())
    }

    fn poll<T: Transport>(&mut self, conn: &mut Connection<T>) -> Result<(), MonitorError> {
        while self.running.load(Ordering::SeqCst) {
            if let Some(max) = self.config.max_iterations {
                if self.iterations >= max {
                    debug!("Reached iteration limit ({})", max);
                    return Ok(());
                }
            }
            self.iterations += 1;

            match self.reader.read_line(conn) {
                Some(line) if !line.is_empty() => {
                    self.lines += 1;
                    if let Err(e) = self.handler.handle(&line) {
                        error!("Line handler failed on {:?}: {:#}", line, e);
                        return Err(MonitorError::Handler(e));
                    }
                }
                Some(_) => trace!("Skipping empty line"),
                None => {}
            }

            std::thread::sleep(self.config.poll_interval);
        }

        info!("Data acquisition halted by user.");
        Ok(())
    }

    fn log_summary(&self) {
        let summary = self.summary();
        info!(
            "Acquisition stopped on {}: {} iterations, {} lines processed, {} read faults",
            self.config.port_config.port_path,
            summary.iterations,
            summary.lines,
            summary.read_faults
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::{ScriptedTransport, Step};
    use std::io;

    fn config(max_iterations: Option<u64>) -> MonitorConfig {
        MonitorConfig {
            port_config: PortConfig::new("/dev/ttyUSB0"),
            poll_interval: Duration::ZERO,
            max_iterations,
        }
    }

    fn line(s: &str) -> Step {
        Step::Line(s.as_bytes().to_vec())
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.port_config.port_path, "COM3");
        assert_eq!(config.max_iterations, None);
    }

    #[test]
    fn test_forwards_line_exactly_once() {
        let (transport, tally) = ScriptedTransport::new(vec![line("TEMP=23.5\r\n")]);
        let mut seen = Vec::new();

        let summary = {
            let mut monitor = SerialMonitor::new(config(Some(5)), |l: &str| -> anyhow::Result<()> {
                seen.push(l.to_string());
                Ok(())
            });
            let summary = monitor.run(|_| Ok(transport)).unwrap();
            assert_eq!(monitor.state(), MonitorState::Stopped);
            summary
        };

        assert_eq!(seen, vec!["TEMP=23.5"]);
        assert_eq!(summary.iterations, 5);
        assert_eq!(summary.lines, 1);
        assert_eq!(tally.borrow().closes, 1);
    }

    #[test]
    fn test_empty_lines_are_not_forwarded() {
        let (transport, _tally) =
            ScriptedTransport::new(vec![line("\n"), line("\r\n"), line("   \n"), line("A\n")]);
        let mut seen = Vec::new();

        {
            let mut monitor = SerialMonitor::new(config(Some(4)), |l: &str| -> anyhow::Result<()> {
                seen.push(l.to_string());
                Ok(())
            });
            monitor.run(|_| Ok(transport)).unwrap();
        }

        assert_eq!(seen, vec!["A"]);
    }

    #[test]
    fn test_read_faults_do_not_stop_loop() {
        let (transport, tally) = ScriptedTransport::new(vec![
            Step::ReadFault(io::ErrorKind::BrokenPipe),
            Step::PollFault(io::ErrorKind::Other),
            Step::Line(vec![0xff, b'\n']),
            Step::ReadFault(io::ErrorKind::TimedOut),
            line("CH1=0.5\n"),
            Step::PollFault(io::ErrorKind::PermissionDenied),
        ]);
        let mut count = 0;

        let summary = {
            let mut monitor = SerialMonitor::new(config(Some(10)), |_: &str| -> anyhow::Result<()> {
                count += 1;
                Ok(())
            });
            monitor.run(|_| Ok(transport)).unwrap()
        };

        assert_eq!(summary.iterations, 10);
        assert_eq!(summary.read_faults, 5);
        assert_eq!(count, 1);
        assert_eq!(tally.borrow().closes, 1);
    }

    #[test]
    fn test_invalid_utf8_continues_to_next_iteration() {
        let (transport, _tally) =
            ScriptedTransport::new(vec![Step::Line(vec![0xc3, 0x28, b'\n']), line("OK\n")]);
        let mut seen = Vec::new();

        let summary = {
            let mut monitor = SerialMonitor::new(config(Some(2)), |l: &str| -> anyhow::Result<()> {
                seen.push(l.to_string());
                Ok(())
            });
            monitor.run(|_| Ok(transport)).unwrap()
        };

        assert_eq!(summary.read_faults, 1);
        assert_eq!(seen, vec!["OK"]);
    }

    #[test]
    fn test_interrupt_closes_exactly_once() {
        let mut monitor = SerialMonitor::new(config(None), LogHandlerStub::default());
        let (transport, tally) = ScriptedTransport::new(vec![line("A\n"), Step::Idle, line("B\n")]);
        let transport = transport.interrupt_at(7, monitor.running_flag());

        let summary = monitor.run(|_| Ok(transport)).unwrap();

        assert_eq!(summary.iterations, 7);
        assert_eq!(monitor.handler.lines, vec!["A", "B"]);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(tally.borrow().closes, 1);
        assert!(!monitor.running_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_interrupt_before_run_is_honored() {
        let mut monitor = SerialMonitor::new(config(None), LogHandlerStub::default());
        monitor.running_flag().store(false, Ordering::SeqCst);
        let (transport, tally) = ScriptedTransport::new(vec![line("A\n")]);

        let summary = monitor.run(|_| Ok(transport)).unwrap();

        assert_eq!(summary.iterations, 0);
        assert!(monitor.handler.lines.is_empty());
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(tally.borrow().polls, 0);
        assert_eq!(tally.borrow().closes, 1);
    }

    #[test]
    fn test_open_failure_never_reads() {
        let (transport, tally) = ScriptedTransport::new(vec![line("A\n")]);
        let mut called = false;

        let mut monitor = SerialMonitor::new(config(Some(3)), |_: &str| -> anyhow::Result<()> {
            called = true;
            Ok(())
        });
        let result = monitor.run(|cfg: &PortConfig| -> Result<ScriptedTransport, ConnectionError> {
            drop(transport);
            Err(ConnectionError::Open {
                port: cfg.port_path.clone(),
                baud: cfg.baud_rate,
                source: io::Error::new(io::ErrorKind::Other, "device busy"),
            })
        });

        assert!(matches!(result, Err(MonitorError::Connection(ConnectionError::Open { .. }))));
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.summary(), MonitorSummary::default());
        drop(monitor);

        assert!(!called);
        let tally = tally.borrow();
        assert_eq!(tally.polls, 0);
        assert_eq!(tally.reads, 0);
        assert_eq!(tally.closes, 0);
    }

    #[test]
    fn test_invalid_config_stops_before_open() {
        let mut cfg = config(Some(1));
        cfg.port_config.baud_rate = 1234;
        let mut monitor = SerialMonitor::new(cfg, LogHandlerStub::default());

        let result = monitor.run(|_| -> Result<ScriptedTransport, ConnectionError> {
            panic!("opener must not run for an invalid configuration")
        });

        assert!(matches!(
            result,
            Err(MonitorError::Connection(ConnectionError::InvalidConfig(_)))
        ));
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[test]
    fn test_handler_error_stops_and_closes() {
        let (transport, tally) = ScriptedTransport::new(vec![line("A\n"), line("B\n")]);

        let mut monitor = SerialMonitor::new(config(Some(10)), |l: &str| -> anyhow::Result<()> {
            anyhow::ensure!(l != "B", "rejected {}", l);
            Ok(())
        });
        let result = monitor.run(|_| Ok(transport));

        assert!(matches!(result, Err(MonitorError::Handler(_))));
        assert_eq!(monitor.summary().iterations, 2);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(tally.borrow().closes, 1);
    }

    #[derive(Default)]
    struct LogHandlerStub {
        lines: Vec<String>,
    }

    impl LineHandler for LogHandlerStub {
        fn handle(&mut self, line: &str) -> anyhow::Result<()> {
            self.lines.push(line.to_string());
            Ok(())
        }
    }
}
