//! # harness
//!
//! The loop that ties it all together, one step per rising clock edge:
//!
//!   RESETTING --first edge--> RUNNING --quit/close/limit--> STOPPING --> STOPPED
//!
//! Each step runs decode -> present -> poll -> encode to completion before
//! the next edge is asked for, so edges are never interleaved or skipped. A
//! quit is only looked at between edges.
//!
//! Faults in decode or encode stay inside their edge: logged, counted, and
//! the loop carries on with a blank (or stale) frame. Only the sequencer and
//! the window are allowed to end a run early, and the window is handed back
//! exactly once whichever way the loop ends.
//!
//! The drain keeps the clock running, so a key written on the last edge still
//! reaches the circuit before the window goes.

use tracing::{debug, error, info, warn};

use crate::circuit::{require_region, Access, Circuit, Nanos};
use crate::config::{ConfigError, HarnessConfig};
use crate::decoder::decode;
use crate::display::Display;
use crate::error::HarnessError;
use crate::input::{Encoder, KeySource};
use crate::pacing::Pacer;
use crate::sequencer::Sequencer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Resetting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// the quit key was polled
    QuitKey,
    /// the surface reported a close request
    CloseRequested,
    /// `max_edges` edges were processed
    EdgeLimit,
}

/// what happened over a whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub edges: u64,
    pub frames: u64,
    /// keys written into the circuit
    pub keys: u64,
    pub decode_faults: u64,
    pub encode_faults: u64,
    pub reason: StopReason,
    /// simulated time once the final drain has settled
    pub finished_at: Nanos,
}

/// owns the window for the duration of a run; closes it on the way out no
/// matter how we leave
struct Window<'a, D: Display> {
    surface: &'a mut D,
    open: bool,
}

impl<'a, D: Display> Window<'a, D> {
    fn open(surface: &'a mut D) -> Result<Self, HarnessError> {
        surface
            .open()
            .map_err(|source| HarnessError::ResourceAcquisition {
                resource: "display window",
                source,
            })?;
        Ok(Window {
            surface,
            open: true,
        })
    }

    fn close(mut self) -> Result<(), HarnessError> {
        self.open = false;
        self.surface
            .close()
            .map_err(|source| HarnessError::Surface { source })
    }
}

impl<'a, D: Display> Drop for Window<'a, D> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.surface.close() {
                warn!(error = %e, "closing display window failed");
            }
        }
    }
}

pub struct Harness {
    config: HarnessConfig,
    state: HarnessState,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Harness {
            config,
            state: HarnessState::Resetting,
        })
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// drive `circuit` until a quit, a close request or the edge limit. The
    /// harness only borrows the circuit and the surface for the run.
    pub fn run<C, D>(&mut self, circuit: &mut C, surface: &mut D) -> Result<RunSummary, HarnessError>
    where
        C: Circuit,
        D: Display + KeySource,
    {
        self.state = HarnessState::Resetting;
        let result = self.drive(circuit, surface);
        match &result {
            Ok(summary) => info!(
                edges = summary.edges,
                decode_faults = summary.decode_faults,
                encode_faults = summary.encode_faults,
                reason = ?summary.reason,
                "harness stopped"
            ),
            Err(e) => error!(error = %e, "harness aborted"),
        }
        self.state = HarnessState::Stopped;
        result
    }

    fn drive<C, D>(&mut self, circuit: &mut C, surface: &mut D) -> Result<RunSummary, HarnessError>
    where
        C: Circuit,
        D: Display + KeySource,
    {
        let ports = &self.config.ports;
        let mut sequencer = Sequencer::new(&*circuit, ports, &self.config.timing)?;
        let encoder = Encoder::new(&*circuit, &ports.keyboard, self.config.quit_key)?;
        require_region(&*circuit, &ports.display, Access::Read)
            .map_err(|e| ConfigError::port(&ports.display, e))?;

        let window = Window::open(surface)?;
        let layout = &self.config.layout;
        let mut frame = layout.new_frame();
        let mut pacer = Pacer::new(self.config.frame_interval);

        let mut edges = 0;
        let mut frames = 0;
        let mut keys = 0;
        let mut decode_faults = 0;
        let mut encode_faults = 0;

        let reason = loop {
            pacer.wait();
            let edge = sequencer.next_edge(circuit)?;
            if self.state == HarnessState::Resetting {
                info!(time = edge.time, "reset released, running");
                self.state = HarnessState::Running;
            }
            debug!(edge = edge.index, time = edge.time, "edge");

            let report = decode(&*circuit, &ports.display, &mut frame, layout);
            for fault in &report.faults {
                warn!(edge = edge.index, %fault, "decode fault, cell left blank");
            }
            decode_faults += report.faults.len() as u64;

            let closed = window
                .surface
                .present(&frame)
                .map_err(|source| HarnessError::Surface { source })?;
            frames += 1;

            let polled = encoder.poll(&mut *window.surface);
            match encoder.encode(circuit, &polled.event) {
                Ok(Some(_)) => keys += 1,
                Ok(None) => (),
                Err(fault) => {
                    warn!(edge = edge.index, %fault, "encode fault, key dropped");
                    encode_faults += 1;
                }
            }
            edges += 1;

            if closed {
                break StopReason::CloseRequested;
            }
            if polled.quit {
                break StopReason::QuitKey;
            }
            if matches!(self.config.max_edges, Some(limit) if edges >= limit) {
                break StopReason::EdgeLimit;
            }
        };

        self.state = HarnessState::Stopping;
        info!(reason = ?reason, "stopping, draining {}ns", self.config.timing.drain_ns);
        sequencer.drain(circuit, self.config.timing.drain_ns)?;
        window.close()?;

        Ok(RunSummary {
            edges,
            frames,
            keys,
            decode_faults,
            encode_faults,
            reason,
            finished_at: circuit.now(),
        })
    }
}
