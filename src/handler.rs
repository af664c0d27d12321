//! Line processing handlers
//!
//! The monitor hands every non-empty line to a [`LineHandler`]. Closures
//! work directly; [`LogHandler`] and [`FileHandler`] cover the common cases.

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Downstream consumer of decoded lines
pub trait LineHandler {
    /// Process one trimmed, non-empty line. An error stops the monitor.
    fn handle(&mut self, line: &str) -> Result<()>;
}

impl<F> LineHandler for F
where
    F: FnMut(&str) -> Result<()>,
{
    fn handle(&mut self, line: &str) -> Result<()> {
        self(line)
    }
}

/// Emits each line as an `info` diagnostic
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl LineHandler for LogHandler {
    fn handle(&mut self, line: &str) -> Result<()> {
        info!("Processing data: {}", line);
        Ok(())
    }
}

/// Appends timestamped lines to a capture file
pub struct FileHandler {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileHandler {
    /// Open `path` for appending, creating it if needed
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open capture file: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineHandler for FileHandler {
    fn handle(&mut self, line: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(self.writer, "[{}] {}", timestamp, line)
            .and_then(|()| self.writer.flush())
            .with_context(|| format!("Failed to write capture file: {}", self.path.display()))
    }
}

/// Runs two handlers in order; the second is skipped if the first fails
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: LineHandler, B: LineHandler> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: LineHandler, B: LineHandler> LineHandler for Tee<A, B> {
    fn handle(&mut self, line: &str) -> Result<()> {
        self.first.handle(line)?;
        self.second.handle(line)
    }
}
