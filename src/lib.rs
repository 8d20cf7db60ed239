/// # simharness
///
/// Testbench harness for a simulated CPU. The CPU itself (decode, ALU,
/// registers, memory) lives somewhere else; all we see is a synchronous
/// circuit with a clock, a reset, a memory-mapped display region and a
/// memory-mapped keyboard region.
///
/// ## Design
///
/// * treat the circuit as a small capability set: named bits we can drive,
///   regions we can read or write, and its own simulated clock
/// * one harness step per rising clock edge, run to completion before the
///   next edge; nothing runs in parallel
/// * abstract the display so can plug alternatives; TUI in-console for a
///   human, headless for automated runs
/// * keyboard is polled, never waited on; no key is a -1 sentinel and the
///   simulated clock keeps going regardless of the human
/// * a bad frame is a blank frame, not a crash; the design may still be
///   settling after reset
///
/// Model
///
/// main
///  |-- config (cli)
///  |-- circuit (toy cpu, or anything else implementing `Circuit`)
///  |-- display surface (terminal or headless; also the key source)
///  `-- harness.run(circuit, surface)
///       |-- sequencer: reset for reset_ns, release, start clk
///       |-- loop, once per rising edge
///       |     |-- decoder: display region -> frame buffer
///       |     |-- surface.present(frame)        -> close requested?
///       |     |-- encoder.poll(surface)         -> key, quit?
///       |     `-- encoder.encode(circuit, key)  -> keyboard region
///       |-- drain for drain_ns
///       `-- close the window
pub mod circuit;
pub mod config;
pub mod decoder;
pub mod display;
pub mod error;
pub mod harness;
pub mod input;
pub mod pacing;
pub mod sequencer;
pub mod toy_cpu;
