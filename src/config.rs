use std::time::Duration;

use thiserror::Error;

use crate::circuit::{CircuitError, Nanos};
use crate::decoder::Layout;
use crate::input::KeyCode;
use crate::toy_cpu;

/// defaults, as used by the interactive testbench
pub const DEFAULT_RESET_NS: Nanos = 10;
pub const DEFAULT_CLOCK_PERIOD_NS: Nanos = 10;
pub const DEFAULT_STARTUP_TIMEOUT_NS: Nanos = 1_000;
pub const DEFAULT_QUIT_KEY: KeyCode = KeyCode(b'q' as i32);

/// anything that stops the harness before the first edge
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("grid must have at least one row and one column, got {rows}x{cols}")]
    EmptyGrid { rows: usize, cols: usize },
    #[error("cell size must be at least one pixel")]
    ZeroCellSize,
    #[error("cell stride must be at least one byte")]
    ZeroStride,
    #[error("a {rows}x{cols} grid of {cell_size}px cells makes a frame larger than {max_bytes} bytes")]
    FrameTooLarge {
        rows: usize,
        cols: usize,
        cell_size: usize,
        max_bytes: usize,
    },
    #[error("display cells at base {base} with stride {stride} run past the addressable range")]
    CellOffsetOverflow { base: usize, stride: usize },
    #[error("clock period of {0}ns is too short to have a high and a low phase")]
    ClockPeriodTooShort(Nanos),
    #[error("quit key cannot be the no-key sentinel")]
    QuitKeyIsNone,
    #[error("edge limit must be at least one edge")]
    ZeroEdgeLimit,
    #[error("port `{port}` is unusable: {source}")]
    Port {
        port: String,
        #[source]
        source: CircuitError,
    },
    #[error("keyboard port `{port}` is {width} bytes wide, need at least {needed}")]
    KeyboardTooNarrow {
        port: String,
        width: usize,
        needed: usize,
    },
}

impl ConfigError {
    pub fn port(port: &str, source: CircuitError) -> Self {
        ConfigError::Port {
            port: port.to_owned(),
            source,
        }
    }
}

/// simulated-time parameters for the clock/reset sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub reset_ns: Nanos,
    pub clock_period_ns: Nanos,
    /// settle time after the last edge before the window is released
    pub drain_ns: Nanos,
    /// how long a driven bit may take to read back during startup
    pub startup_timeout_ns: Nanos,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            reset_ns: DEFAULT_RESET_NS,
            clock_period_ns: DEFAULT_CLOCK_PERIOD_NS,
            drain_ns: DEFAULT_CLOCK_PERIOD_NS,
            startup_timeout_ns: DEFAULT_STARTUP_TIMEOUT_NS,
        }
    }
}

impl Timing {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_period_ns < 2 {
            return Err(ConfigError::ClockPeriodTooShort(self.clock_period_ns));
        }
        Ok(())
    }

    /// time from the falling edge to the next rising edge
    pub fn low_phase(&self) -> Nanos {
        self.clock_period_ns - self.high_phase()
    }

    /// time the clock stays high after a rising edge
    pub fn high_phase(&self) -> Nanos {
        self.clock_period_ns / 2
    }
}

/// names of the circuit ports the harness touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMap {
    pub reset: String,
    pub clock: String,
    pub display: String,
    pub keyboard: String,
}

impl Default for PortMap {
    fn default() -> Self {
        PortMap {
            reset: toy_cpu::RESET_PORT.to_owned(),
            clock: toy_cpu::CLOCK_PORT.to_owned(),
            display: toy_cpu::DISPLAY_PORT.to_owned(),
            keyboard: toy_cpu::KEYBOARD_PORT.to_owned(),
        }
    }
}

/// everything the harness loop needs to know before it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub timing: Timing,
    pub ports: PortMap,
    pub layout: Layout,
    pub quit_key: KeyCode,
    /// stop after this many edges; `None` runs until a quit request
    pub max_edges: Option<u64>,
    /// minimum wall-clock time per edge, zero for as fast as possible
    pub frame_interval: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            timing: Timing::default(),
            ports: PortMap::default(),
            layout: Layout::default(),
            quit_key: DEFAULT_QUIT_KEY,
            max_edges: None,
            frame_interval: Duration::ZERO,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        self.layout.validate()?;
        if self.quit_key.is_none() {
            return Err(ConfigError::QuitKeyIsNone);
        }
        if self.max_edges == Some(0) {
            return Err(ConfigError::ZeroEdgeLimit);
        }
        Ok(())
    }
}
