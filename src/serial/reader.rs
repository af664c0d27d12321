//! Newline-delimited UTF-8 line reader
//!
//! Polls the transport without blocking, reads one line when data is
//! waiting, and turns every per-line failure into "no data" so a single bad
//! line never stops acquisition.

use crate::error::ReadError;
use crate::serial::{Connection, Transport};
use log::{debug, trace, warn};

/// Reads trimmed text lines and counts the faults it swallowed
#[derive(Debug, Default)]
pub struct LineReader {
    faults: u64,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of read or decode faults reported so far
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Read one line, returning `None` when nothing is waiting.
    ///
    /// The returned line has surrounding whitespace (including `\r\n`)
    /// stripped and may be empty for a bare terminator.
    pub fn try_read_line<T: Transport>(
        &mut self,
        conn: &mut Connection<T>,
    ) -> Result<Option<String>, ReadError> {
        let transport = conn.transport_mut().ok_or(ReadError::Closed)?;

        if transport.bytes_available()? == 0 {
            trace!("No data waiting on serial port");
            return Ok(None);
        }

        let mut buf = Vec::new();
        transport.read_line_bytes(&mut buf)?;

        let raw = String::from_utf8(buf).map_err(|e| ReadError::Decode {
            source: e.utf8_error(),
            bytes: e.into_bytes(),
        })?;
        let text = raw.trim().to_string();

        debug!("Serial data received: {}", text);
        Ok(Some(text))
    }

    /// Like [`try_read_line`](Self::try_read_line), but reports faults as a
    /// diagnostic and returns `None` instead of an error.
    pub fn read_line<T: Transport>(&mut self, conn: &mut Connection<T>) -> Option<String> {
        match self.try_read_line(conn) {
            Ok(line) => line,
            Err(err) => {
                self.faults += 1;
                warn!("Error during serial read: {}", err);
                if let ReadError::Decode { bytes, .. } = &err {
                    for chunk in bytes.chunks(16) {
                        debug!("  {}", hex::encode(chunk));
                    }
                }
                None
            }
        }
    }
}
