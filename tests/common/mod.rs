//! Shared pieces for the harness scenarios: a circuit and a surface that
//! write everything done to them into one log, so tests can check ordering.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::rc::Rc;

use simharness::circuit::{Access, Circuit, CircuitError, Nanos, Port};
use simharness::display::{Display, FrameBuffer};
use simharness::input::{KeyCode, KeySource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Drive { port: String, level: bool, at: Nanos },
    Read { port: String, at: Nanos },
    Write { port: String, data: Vec<u8>, at: Nanos },
    Advance { ns: Nanos },
    Open,
    Present { lit: usize },
    Poll { key: Option<KeyCode> },
    Close,
}

pub type Log = Rc<RefCell<Vec<Op>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// a circuit with reset, clk, a fixed display region and a 2 byte keyboard
/// region, recording every access
pub struct RecordingCircuit {
    log: Log,
    time: Nanos,
    bits: [(String, bool); 2],
    display: Vec<u8>,
    garbage: Vec<u8>,
    keyboard: [u8; 2],
    /// port that ignores drives
    stuck: Option<String>,
    /// display reads (0-based) that come back as garbage
    corrupt_reads: HashSet<usize>,
    reads: RefCell<usize>,
}

impl RecordingCircuit {
    pub fn new(log: &Log, display: Vec<u8>) -> Self {
        let garbage = vec![0x7f; display.len()];
        RecordingCircuit {
            log: Rc::clone(log),
            time: 0,
            bits: [("reset".into(), false), ("clk".into(), false)],
            display,
            garbage,
            keyboard: [0; 2],
            stuck: None,
            corrupt_reads: HashSet::new(),
            reads: RefCell::new(0),
        }
    }

    pub fn stuck(mut self, port: &str) -> Self {
        self.stuck = Some(port.to_owned());
        self
    }

    pub fn corrupt_read(mut self, read: usize) -> Self {
        self.corrupt_reads.insert(read);
        self
    }

    pub fn keyboard(&self) -> [u8; 2] {
        self.keyboard
    }

    fn bit(&self, name: &str) -> Option<usize> {
        self.bits.iter().position(|(n, _)| n == name)
    }
}

impl Circuit for RecordingCircuit {
    fn port(&self, name: &str) -> Option<Port> {
        match name {
            "reset" | "clk" => Some(Port::Bit { writable: true }),
            "display_ram" => Some(Port::Region {
                width: self.display.len(),
                access: Access::Read,
            }),
            "keyboard_ram" => Some(Port::Region {
                width: 2,
                access: Access::Write,
            }),
            _ => None,
        }
    }

    fn drive(&mut self, name: &str, level: bool) -> Result<(), CircuitError> {
        let i = self
            .bit(name)
            .ok_or_else(|| CircuitError::UnknownPort(name.to_owned()))?;
        self.log.borrow_mut().push(Op::Drive {
            port: name.to_owned(),
            level,
            at: self.time,
        });
        if self.stuck.as_deref() != Some(name) {
            self.bits[i].1 = level;
        }
        Ok(())
    }

    fn sample(&self, name: &str) -> Result<bool, CircuitError> {
        self.bit(name)
            .map(|i| self.bits[i].1)
            .ok_or_else(|| CircuitError::UnknownPort(name.to_owned()))
    }

    fn read_region(&self, name: &str) -> Result<&[u8], CircuitError> {
        if name != "display_ram" {
            return Err(CircuitError::NotReadable(name.to_owned()));
        }
        self.log.borrow_mut().push(Op::Read {
            port: name.to_owned(),
            at: self.time,
        });
        let n = *self.reads.borrow();
        *self.reads.borrow_mut() += 1;
        if self.corrupt_reads.contains(&n) {
            Ok(&self.garbage)
        } else {
            Ok(&self.display)
        }
    }

    fn write_region(&mut self, name: &str, offset: usize, data: &[u8]) -> Result<(), CircuitError> {
        if name != "keyboard_ram" {
            return Err(CircuitError::NotWritable(name.to_owned()));
        }
        if offset + data.len() > 2 {
            return Err(CircuitError::OutOfRange {
                port: name.to_owned(),
                offset,
                len: data.len(),
                width: 2,
            });
        }
        self.log.borrow_mut().push(Op::Write {
            port: name.to_owned(),
            data: data.to_vec(),
            at: self.time,
        });
        self.keyboard[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn advance(&mut self, ns: Nanos) {
        self.log.borrow_mut().push(Op::Advance { ns });
        self.time += ns;
    }

    fn now(&self) -> Nanos {
        self.time
    }
}

/// surface with scripted keys (by poll number) that logs into the shared log
pub struct RecordingSurface {
    log: Log,
    keys: VecDeque<(u64, KeyCode)>,
    polls: u64,
    presents: u64,
    fail_present_at: Option<u64>,
    fail_open: bool,
}

impl RecordingSurface {
    pub fn new(log: &Log) -> Self {
        RecordingSurface {
            log: Rc::clone(log),
            keys: VecDeque::new(),
            polls: 0,
            presents: 0,
            fail_present_at: None,
            fail_open: false,
        }
    }

    pub fn with_key(mut self, poll: u64, code: KeyCode) -> Self {
        self.keys.push_back((poll, code));
        self
    }

    /// the `present`th present (0-based) errors instead of showing the frame
    pub fn failing_present_at(mut self, present: u64) -> Self {
        self.fail_present_at = Some(present);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }
}

impl Display for RecordingSurface {
    fn open(&mut self) -> Result<(), io::Error> {
        if self.fail_open {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no window"));
        }
        self.log.borrow_mut().push(Op::Open);
        Ok(())
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<bool, io::Error> {
        let n = self.presents;
        self.presents += 1;
        if self.fail_present_at == Some(n) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        }
        self.log.borrow_mut().push(Op::Present {
            lit: frame.lit_pixels(),
        });
        Ok(false)
    }

    fn close(&mut self) -> Result<(), io::Error> {
        self.log.borrow_mut().push(Op::Close);
        Ok(())
    }
}

impl KeySource for RecordingSurface {
    fn pending_key(&mut self) -> Result<Option<KeyCode>, io::Error> {
        let poll = self.polls;
        self.polls += 1;
        let key = match self.keys.front() {
            Some((p, code)) if *p == poll => {
                let code = *code;
                self.keys.pop_front();
                Some(code)
            }
            _ => None,
        };
        self.log.borrow_mut().push(Op::Poll { key });
        Ok(key)
    }
}

/// the ops in `log` matching `f`
pub fn count(log: &Log, f: impl Fn(&Op) -> bool) -> usize {
    log.borrow().iter().filter(|op| f(op)).count()
}

pub fn is_rising_clk(op: &Op) -> bool {
    matches!(op, Op::Drive { port, level: true, .. } if port == "clk")
}
