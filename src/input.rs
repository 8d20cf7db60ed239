use crossterm::event::{
    self, Event, KeyCode as TermKeyCode, KeyEvent as TermKeyEvent, KeyModifiers,
};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::circuit::{require_region, Access, Circuit, CircuitError};
use crate::config::ConfigError;

/// keyboard_ram holds [8-bit key pattern, pressed flag]
pub const KEYBOARD_WIDTH: usize = 2;

/// a raw key code as the surface reports it; `NONE` means no key this edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub i32);

impl KeyCode {
    pub const NONE: KeyCode = KeyCode(-1);

    pub fn is_none(self) -> bool {
        self == KeyCode::NONE
    }

    /// the character this code stands for, if any
    pub fn glyph(self) -> Option<char> {
        u32::try_from(self.0).ok().and_then(char::from_u32)
    }
}

impl From<char> for KeyCode {
    fn from(c: char) -> Self {
        KeyCode(c as i32)
    }
}

/// one key, for one edge only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub character: Option<char>,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn none() -> Self {
        KeyEvent {
            code: KeyCode::NONE,
            character: None,
            pressed: false,
        }
    }

    pub fn pressed(code: KeyCode) -> Self {
        KeyEvent {
            code,
            character: code.glyph(),
            pressed: true,
        }
    }
}

/// reads keypresses; must never block waiting for one
pub trait KeySource {
    /// the next pending key, or None straight away if there isn't one
    fn pending_key(&mut self) -> Result<Option<KeyCode>, io::Error>;
}

/// result of one poll: the key, and whether it was the quit key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polled {
    pub event: KeyEvent,
    pub quit: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeFault {
    #[error("key code {code} does not fit in 8 bits")]
    OutOfRange { code: i32 },
    #[error("writing keyboard port `{port}` failed: {source}")]
    Write {
        port: String,
        #[source]
        source: CircuitError,
    },
}

/// 8-bit pattern for a key code
pub fn encode_bits(code: KeyCode) -> Result<u8, EncodeFault> {
    u8::try_from(code.0).map_err(|_| EncodeFault::OutOfRange { code: code.0 })
}

pub fn decode_bits(bits: u8) -> KeyCode {
    KeyCode(bits as i32)
}

/// polls the surface for keys and writes them into the circuit's keyboard
/// region
#[derive(Debug, Clone)]
pub struct Encoder {
    port: String,
    quit_key: KeyCode,
}

impl Encoder {
    pub fn new(circuit: &impl Circuit, port: &str, quit_key: KeyCode) -> Result<Self, ConfigError> {
        let width =
            require_region(circuit, port, Access::Write).map_err(|e| ConfigError::port(port, e))?;
        if width < KEYBOARD_WIDTH {
            return Err(ConfigError::KeyboardTooNarrow {
                port: port.to_owned(),
                width,
                needed: KEYBOARD_WIDTH,
            });
        }
        Ok(Encoder {
            port: port.to_owned(),
            quit_key,
        })
    }

    /// non-blocking; a surface that can't be read counts as no key
    pub fn poll(&self, source: &mut impl KeySource) -> Polled {
        let code = match source.pending_key() {
            Ok(Some(code)) => code,
            Ok(None) => KeyCode::NONE,
            Err(e) => {
                warn!(error = %e, "keyboard poll failed");
                KeyCode::NONE
            }
        };
        let event = if code.is_none() {
            KeyEvent::none()
        } else {
            KeyEvent::pressed(code)
        };
        Polled {
            event,
            quit: code == self.quit_key,
        }
    }

    /// write `event` into the keyboard region; does nothing for `NONE`.
    /// Returns the pattern written.
    pub fn encode(
        &self,
        circuit: &mut impl Circuit,
        event: &KeyEvent,
    ) -> Result<Option<u8>, EncodeFault> {
        if event.code.is_none() {
            return Ok(None);
        }
        let bits = encode_bits(event.code)?;
        let character = event.code.glyph();
        debug!(
            code = event.code.0,
            character = ?character,
            bits = %format!("{:08b}", bits),
            "key pressed"
        );
        circuit
            .write_region(&self.port, 0, &[bits, event.pressed as u8])
            .map_err(|source| EncodeFault::Write {
                port: self.port.clone(),
                source,
            })?;
        Ok(Some(bits))
    }
}

/// what a terminal event means to the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Key(KeyCode),
    Close,
}

/// map a crossterm event; Esc and ctrl-c close the window
pub fn translate(event: &Event) -> Option<SurfaceEvent> {
    match event {
        Event::Key(TermKeyEvent {
            code: TermKeyCode::Char('c'),
            modifiers,
            ..
        }) if modifiers.contains(KeyModifiers::CONTROL) => Some(SurfaceEvent::Close),
        Event::Key(key) => match key.code {
            TermKeyCode::Esc => Some(SurfaceEvent::Close),
            TermKeyCode::Char(c) => Some(SurfaceEvent::Key(KeyCode::from(c))),
            TermKeyCode::Enter => Some(SurfaceEvent::Key(KeyCode(13))),
            TermKeyCode::Backspace => Some(SurfaceEvent::Key(KeyCode(8))),
            TermKeyCode::Tab => Some(SurfaceEvent::Key(KeyCode(9))),
            _ => None,
        },
        _ => None,
    }
}

/// read everything the terminal has queued without waiting. Keys go onto
/// `pending`; returns true if a close was asked for.
pub fn drain_terminal_events(pending: &mut VecDeque<KeyCode>) -> Result<bool, io::Error> {
    let mut close = false;
    while event::poll(Duration::from_millis(0))? {
        let evt = event::read()?;
        match translate(&evt) {
            Some(SurfaceEvent::Key(code)) => pending.push_back(code),
            Some(SurfaceEvent::Close) => close = true,
            None => debug!(event = ?evt, "ignoring terminal event"),
        }
    }
    Ok(close)
}
