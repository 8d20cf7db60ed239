//! # sequencer
//!
//! Drives reset and the clock into the circuit. Timeline, in simulated time:
//!
//!   0                 reset <- 1
//!   reset_ns          reset <- 0, clk <- 0
//!   + low_phase       clk <- 1                   edge 0
//!   + high_phase      clk <- 0
//!   + low_phase       clk <- 1                   edge 1
//!   ...
//!
//! so edge n lands at reset_ns + low_phase + n * clock_period_ns. Nothing
//! else may touch the circuit before edge 0 is handed out.
//!
//! Reset is held for reset_ns as seen by the circuit: time spent waiting for
//! it to follow the assert comes out of the hold, unless the circuit takes
//! longer than reset_ns to follow at all. Once the loop is done with edges,
//! `drain` keeps the clock running for the settle time so whatever was
//! written on the last edge is clocked in.

use tracing::{debug, info, warn};

use crate::circuit::{require_writable_bit, Circuit, Nanos};
use crate::config::{ConfigError, PortMap, Timing};
use crate::error::SequencerFault;

/// one rising clock edge; edge n always comes before edge n + 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockEdge {
    pub index: u64,
    pub time: Nanos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// constructed, reset not asserted yet
    Idle,
    /// at least one edge produced, clk is high
    Clocking { next: u64 },
}

pub struct Sequencer {
    reset_port: String,
    clock_port: String,
    timing: Timing,
    phase: Phase,
}

impl Sequencer {
    /// fails if the circuit has no writable reset/clock bit, before anything
    /// is driven
    pub fn new(
        circuit: &impl Circuit,
        ports: &PortMap,
        timing: &Timing,
    ) -> Result<Self, ConfigError> {
        timing.validate()?;
        require_writable_bit(circuit, &ports.reset)
            .map_err(|e| ConfigError::port(&ports.reset, e))?;
        require_writable_bit(circuit, &ports.clock)
            .map_err(|e| ConfigError::port(&ports.clock, e))?;
        Ok(Sequencer {
            reset_port: ports.reset.clone(),
            clock_port: ports.clock.clone(),
            timing: timing.clone(),
            phase: Phase::Idle,
        })
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// true once reset has been released and edge 0 produced
    pub fn started(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// advance the circuit to its next rising clock edge. The first call also
    /// runs the reset sequence.
    pub fn next_edge(&mut self, circuit: &mut impl Circuit) -> Result<ClockEdge, SequencerFault> {
        match self.phase {
            Phase::Idle => {
                self.reset(circuit)?;
                self.confirm(circuit, &self.clock_port, false)?;
                circuit.advance(self.timing.low_phase());
                self.confirm(circuit, &self.clock_port, true)?;
                self.phase = Phase::Clocking { next: 1 };
                let edge = ClockEdge {
                    index: 0,
                    time: circuit.now(),
                };
                info!(time = edge.time, "first clock edge, circuit running");
                Ok(edge)
            }
            Phase::Clocking { next } => {
                circuit.advance(self.timing.high_phase());
                self.drive(circuit, &self.clock_port, false)?;
                circuit.advance(self.timing.low_phase());
                self.drive(circuit, &self.clock_port, true)?;
                self.phase = Phase::Clocking { next: next + 1 };
                Ok(ClockEdge {
                    index: next,
                    time: circuit.now(),
                })
            }
        }
    }

    /// lazy, endless stream of edges
    pub fn edges<C: Circuit>(self, circuit: &mut C) -> Edges<'_, C> {
        Edges {
            sequencer: self,
            circuit,
            failed: false,
        }
    }

    /// keep the clock free-running for `ns` of simulated time after the last
    /// edge; the edges in here are not handed out. Returns how many rising
    /// edges the circuit saw.
    pub fn drain(self, circuit: &mut impl Circuit, ns: Nanos) -> Result<u64, SequencerFault> {
        if !self.started() {
            circuit.advance(ns);
            return Ok(0);
        }
        // clk is high after every edge handed out
        let mut high = true;
        let mut left = ns;
        let mut rising = 0;
        loop {
            let phase = if high {
                self.timing.high_phase()
            } else {
                self.timing.low_phase()
            };
            if left < phase {
                break;
            }
            circuit.advance(phase);
            left -= phase;
            high = !high;
            self.drive(circuit, &self.clock_port, high)?;
            if high {
                rising += 1;
            }
        }
        if left > 0 {
            circuit.advance(left);
        }
        debug!(ns, rising, time = circuit.now(), "drained");
        Ok(rising)
    }

    fn reset(&self, circuit: &mut impl Circuit) -> Result<(), SequencerFault> {
        debug!(port = %self.reset_port, ns = self.timing.reset_ns, "asserting reset");
        let waited = self.confirm(circuit, &self.reset_port, true)?;
        if waited > self.timing.reset_ns {
            warn!(
                waited_ns = waited,
                reset_ns = self.timing.reset_ns,
                "reset took longer to assert than it is held for"
            );
        }
        circuit.advance(self.timing.reset_ns.saturating_sub(waited));
        self.confirm(circuit, &self.reset_port, false)?;
        debug!(time = circuit.now(), "reset released");
        Ok(())
    }

    fn drive(
        &self,
        circuit: &mut impl Circuit,
        port: &str,
        level: bool,
    ) -> Result<(), SequencerFault> {
        circuit.drive(port, level).map_err(|source| SequencerFault::Drive {
            port: port.to_owned(),
            source,
        })
    }

    /// drive and wait for the level to read back; startup only, a circuit that
    /// doesn't follow within the timeout is a fault rather than a hang.
    /// Returns the simulated time waited.
    fn confirm(
        &self,
        circuit: &mut impl Circuit,
        port: &str,
        level: bool,
    ) -> Result<Nanos, SequencerFault> {
        self.drive(circuit, port, level)?;
        let step = self.timing.high_phase().max(1);
        let mut waited = 0;
        loop {
            let seen = circuit.sample(port).map_err(|source| SequencerFault::Drive {
                port: port.to_owned(),
                source,
            })?;
            if seen == level {
                return Ok(waited);
            }
            if waited >= self.timing.startup_timeout_ns {
                return Err(SequencerFault::NotResponding {
                    port: port.to_owned(),
                    waited_ns: waited,
                });
            }
            circuit.advance(step);
            waited += step;
        }
    }
}

/// iterator form of `Sequencer::next_edge`; stops for good after a fault
pub struct Edges<'a, C: Circuit> {
    sequencer: Sequencer,
    circuit: &'a mut C,
    failed: bool,
}

impl<'a, C: Circuit> Iterator for Edges<'a, C> {
    type Item = Result<ClockEdge, SequencerFault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let edge = self.sequencer.next_edge(self.circuit);
        self.failed = edge.is_err();
        Some(edge)
    }
}
