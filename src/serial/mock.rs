//! Scripted in-memory transport for tests

use crate::serial::Transport;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One poll's worth of device behaviour
#[derive(Debug, Clone)]
pub enum Step {
    /// Nothing waiting
    Idle,
    /// Bytes waiting; read returns them
    Line(Vec<u8>),
    /// Bytes reported waiting, but the read fails
    ReadFault(io::ErrorKind),
    /// The availability check itself fails
    PollFault(io::ErrorKind),
}

/// Counters shared with the test after the transport is moved away
#[derive(Debug, Default)]
pub struct Tally {
    pub polls: usize,
    pub reads: usize,
    pub closes: usize,
    pub written: Vec<u8>,
}

pub struct ScriptedTransport {
    steps: VecDeque<Step>,
    tally: Rc<RefCell<Tally>>,
    interrupt: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> (Self, Rc<RefCell<Tally>>) {
        let tally = Rc::new(RefCell::new(Tally::default()));
        let transport = Self {
            steps: steps.into(),
            tally: Rc::clone(&tally),
            interrupt: None,
        };
        (transport, tally)
    }

    /// Clear `running` when the `poll`-th availability check happens
    pub fn interrupt_at(mut self, poll: usize, running: Arc<AtomicBool>) -> Self {
        self.interrupt = Some((poll, running));
        self
    }
}

impl Transport for ScriptedTransport {
    fn bytes_available(&mut self) -> io::Result<u32> {
        let polls = {
            let mut tally = self.tally.borrow_mut();
            tally.polls += 1;
            tally.polls
        };
        if let Some((at, running)) = &self.interrupt {
            if polls >= *at {
                running.store(false, Ordering::SeqCst);
            }
        }

        match self.steps.front() {
            None | Some(Step::Idle) => {
                self.steps.pop_front();
                Ok(0)
            }
            Some(Step::Line(bytes)) => Ok(bytes.len() as u32),
            Some(Step::ReadFault(_)) => Ok(1),
            Some(Step::PollFault(kind)) => {
                let kind = *kind;
                self.steps.pop_front();
                Err(io::Error::new(kind, "injected poll fault"))
            }
        }
    }

    fn read_line_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.tally.borrow_mut().reads += 1;
        match self.steps.pop_front() {
            Some(Step::Line(bytes)) => {
                buf.extend_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(Step::ReadFault(kind)) => Err(io::Error::new(kind, "injected read fault")),
            _ => Ok(0),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.tally.borrow_mut().written.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.tally.borrow_mut().closes += 1;
        Ok(())
    }
}
