//! # toy cpu
//!
//! A very small stand-in for the RTL CPU, just enough circuit to drive. It
//! has the same outside as the real thing:
//!
//!   reset         1 bit, writable
//!   clk           1 bit, writable; the cpu steps on each rising edge
//!   display_ram   rows * cols bytes, one ASCII byte per text cell, r/o
//!   keyboard_ram  2 bytes: [key pattern, pressed flag], w/o
//!
//! On every rising edge out of reset the instruction counter goes up by one
//! and is shown as 8 hex digits along row 0. A pressed key is consumed (the
//! pressed flag is cleared, like a hardware ack) and echoed into the text
//! area that starts on row 1.

use crate::circuit::{Access, Circuit, CircuitError, Nanos, Port};

pub const RESET_PORT: &str = "reset";
pub const CLOCK_PORT: &str = "clk";
pub const DISPLAY_PORT: &str = "display_ram";
pub const KEYBOARD_PORT: &str = "keyboard_ram";

const KEYBOARD_WIDTH: usize = 2;
const COUNTER_DIGITS: usize = 8;

const KEY_BACKSPACE: u8 = 8;
const KEY_ENTER: u8 = 13;

pub struct ToyCpu {
    cols: usize,
    reset: bool,
    clk: bool,
    time: Nanos,
    counter: u32,
    cursor: usize,
    display: Box<[u8]>,
    keyboard: [u8; KEYBOARD_WIDTH],
}

impl ToyCpu {
    pub fn new(rows: usize, cols: usize) -> Self {
        ToyCpu {
            cols,
            // NB. power-on state is garbage on real hardware; we start in reset
            // so that nothing meaningful is visible until the harness releases it
            reset: true,
            clk: false,
            time: 0,
            counter: 0,
            cursor: cols,
            display: vec![0u8; rows * cols].into_boxed_slice(),
            keyboard: [0; KEYBOARD_WIDTH],
        }
    }

    /// instructions retired since reset was released
    pub fn counter(&self) -> u32 {
        self.counter
    }

    fn clear(&mut self) {
        self.counter = 0;
        self.cursor = self.cols;
        self.display.iter_mut().for_each(|b| *b = 0);
        self.keyboard = [0; KEYBOARD_WIDTH];
    }

    fn step(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        self.show_counter();
        if self.keyboard[1] != 0 {
            let key = self.keyboard[0];
            self.keyboard[1] = 0;
            self.echo(key);
        }
    }

    fn show_counter(&mut self) {
        let digits = format!("{:0width$X}", self.counter, width = COUNTER_DIGITS);
        // narrow grids keep the low digits
        let n = digits.len().min(self.cols).min(self.display.len());
        self.display[..n].copy_from_slice(&digits.as_bytes()[digits.len() - n..]);
    }

    fn echo(&mut self, key: u8) {
        let text_start = self.cols;
        if self.display.len() <= text_start {
            // no room below the counter row
            return;
        }
        match key {
            KEY_ENTER => {
                let line = self.cursor / self.cols;
                self.cursor = (line + 1) * self.cols;
            }
            KEY_BACKSPACE => {
                if self.cursor > text_start {
                    self.cursor -= 1;
                    self.display[self.cursor] = 0;
                }
            }
            0x20..=0x7e => {
                if self.cursor >= self.display.len() {
                    self.cursor = text_start;
                }
                self.display[self.cursor] = key;
                self.cursor += 1;
            }
            _ => (),
        }
        if self.cursor >= self.display.len() {
            self.cursor = text_start;
        }
    }
}

impl Circuit for ToyCpu {
    fn port(&self, name: &str) -> Option<Port> {
        match name {
            RESET_PORT | CLOCK_PORT => Some(Port::Bit { writable: true }),
            DISPLAY_PORT => Some(Port::Region {
                width: self.display.len(),
                access: Access::Read,
            }),
            KEYBOARD_PORT => Some(Port::Region {
                width: KEYBOARD_WIDTH,
                access: Access::Write,
            }),
            _ => None,
        }
    }

    fn drive(&mut self, name: &str, level: bool) -> Result<(), CircuitError> {
        match name {
            RESET_PORT => {
                self.reset = level;
                if level {
                    self.clear();
                }
            }
            CLOCK_PORT => {
                let rising = level && !self.clk;
                self.clk = level;
                if rising && !self.reset {
                    self.step();
                }
            }
            DISPLAY_PORT | KEYBOARD_PORT => {
                return Err(CircuitError::WrongKind {
                    port: name.to_owned(),
                    expected: "bit",
                    actual: "region",
                })
            }
            _ => return Err(CircuitError::UnknownPort(name.to_owned())),
        }
        Ok(())
    }

    fn sample(&self, name: &str) -> Result<bool, CircuitError> {
        match name {
            RESET_PORT => Ok(self.reset),
            CLOCK_PORT => Ok(self.clk),
            _ => Err(CircuitError::UnknownPort(name.to_owned())),
        }
    }

    fn read_region(&self, name: &str) -> Result<&[u8], CircuitError> {
        match name {
            DISPLAY_PORT => Ok(&self.display),
            KEYBOARD_PORT => Err(CircuitError::NotReadable(name.to_owned())),
            _ => Err(CircuitError::UnknownPort(name.to_owned())),
        }
    }

    fn write_region(
        &mut self,
        name: &str,
        offset: usize,
        data: &[u8],
    ) -> Result<(), CircuitError> {
        match name {
            KEYBOARD_PORT => {
                let end = offset + data.len();
                if end > KEYBOARD_WIDTH {
                    return Err(CircuitError::OutOfRange {
                        port: name.to_owned(),
                        offset,
                        len: data.len(),
                        width: KEYBOARD_WIDTH,
                    });
                }
                self.keyboard[offset..end].copy_from_slice(data);
                Ok(())
            }
            DISPLAY_PORT => Err(CircuitError::NotWritable(name.to_owned())),
            _ => Err(CircuitError::UnknownPort(name.to_owned())),
        }
    }

    fn advance(&mut self, ns: Nanos) {
        self.time += ns;
    }

    fn now(&self) -> Nanos {
        self.time
    }
}
