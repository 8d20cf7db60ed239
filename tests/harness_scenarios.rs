mod common;

use pretty_assertions::assert_eq;

use common::{count, is_rising_clk, new_log, Op, RecordingCircuit, RecordingSurface};
use simharness::circuit::Circuit;
use simharness::config::HarnessConfig;
use simharness::display::HeadlessDisplay;
use simharness::error::{HarnessError, SequencerFault};
use simharness::harness::{Harness, HarnessState, StopReason};
use simharness::input::KeyCode;
use simharness::toy_cpu::ToyCpu;

const ROWS: usize = 2;
const COLS: usize = 4;

fn config(max_edges: Option<u64>) -> HarnessConfig {
    let mut c = HarnessConfig {
        max_edges,
        ..HarnessConfig::default()
    };
    c.layout.rows = ROWS;
    c.layout.cols = COLS;
    c.layout.cell_size = 8;
    c
}

fn screen() -> Vec<u8> {
    b"AB12    ".to_vec()
}

#[test]
fn test_ten_edges_no_input() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log);
    let mut h = Harness::new(config(Some(10))).unwrap();

    let summary = h.run(&mut circuit, &mut surface).unwrap();

    assert_eq!(summary.edges, 10);
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.keys, 0);
    assert_eq!(summary.decode_faults, 0);
    assert_eq!(summary.reason, StopReason::EdgeLimit);
    // edge 9 at 10 + 5 + 9 * 10, then a 10ns drain
    assert_eq!(summary.finished_at, 115);
    assert_eq!(h.state(), HarnessState::Stopped);

    let ops = log.borrow();
    let frames: Vec<usize> = ops
        .iter()
        .filter_map(|op| match op {
            Op::Present { lit } => Some(*lit),
            _ => None,
        })
        .collect();
    assert_eq!(frames.len(), 10);
    assert!(frames[0] > 0);
    assert!(frames.iter().all(|&lit| lit == frames[0]));
    assert!(!ops.iter().any(|op| matches!(op, Op::Write { .. })));
    // a 10ns drain with the clock still running, then the window goes
    let clk = |level, at| Op::Drive {
        port: "clk".into(),
        level,
        at,
    };
    assert_eq!(
        ops[ops.len() - 5..].to_vec(),
        vec![
            Op::Advance { ns: 5 },
            clk(false, 110),
            Op::Advance { ns: 5 },
            clk(true, 115),
            Op::Close,
        ]
    );
    drop(ops);
    assert_eq!(count(&log, |op| *op == Op::Close), 1);
    // ten edges handed to the loop, one more inside the drain
    assert_eq!(count(&log, is_rising_clk), 11);
    assert_eq!(count(&log, |op| matches!(op, Op::Present { .. })), 10);
}

#[test]
fn test_quit_key_on_edge_five() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log).with_key(5, KeyCode(113));
    let mut h = Harness::new(config(None)).unwrap();

    let summary = h.run(&mut circuit, &mut surface).unwrap();

    assert_eq!(summary.reason, StopReason::QuitKey);
    assert_eq!(summary.edges, 6);
    // edges 0..=5 only, no edge 6 reaches the loop; the drain edge is not
    // decoded or presented
    assert_eq!(count(&log, |op| matches!(op, Op::Present { .. })), 6);
    assert_eq!(count(&log, |op| matches!(op, Op::Poll { .. })), 6);
    assert_eq!(count(&log, is_rising_clk), 7);
    let last_present = log
        .borrow()
        .iter()
        .rposition(|op| matches!(op, Op::Present { .. }))
        .unwrap();
    assert!(!log.borrow()[last_present..]
        .iter()
        .any(|op| matches!(op, Op::Read { .. })));
    // the quit key still goes to the circuit
    assert_eq!(summary.keys, 1);
    assert_eq!(circuit.keyboard(), [0b0111_0001, 1]);
    assert_eq!(count(&log, |op| *op == Op::Close), 1);
}

#[test]
fn test_edges_are_processed_in_order() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log).with_key(2, KeyCode::from('x'));
    let mut h = Harness::new(config(Some(4))).unwrap();
    h.run(&mut circuit, &mut surface).unwrap();

    // reduce the log to one letter per step; E is a rising clock edge
    let steps: String = log
        .borrow()
        .iter()
        .filter_map(|op| match op {
            op if is_rising_clk(op) => Some('E'),
            Op::Read { .. } => Some('R'),
            Op::Present { .. } => Some('P'),
            Op::Poll { .. } => Some('K'),
            Op::Write { .. } => Some('W'),
            Op::Open => Some('O'),
            Op::Close => Some('C'),
            _ => None,
        })
        .collect();
    assert_eq!(steps, "OERPKERPKERPKWERPKEC");
}

#[test]
fn test_reset_window() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log);
    let mut h = Harness::new(config(Some(1))).unwrap();
    h.run(&mut circuit, &mut surface).unwrap();

    let ops = log.borrow();
    let drives: Vec<&Op> = ops
        .iter()
        .filter(|op| matches!(op, Op::Drive { .. }))
        .take(4)
        .collect();
    assert_eq!(
        drives,
        vec![
            &Op::Drive { port: "reset".into(), level: true, at: 0 },
            &Op::Drive { port: "reset".into(), level: false, at: 10 },
            &Op::Drive { port: "clk".into(), level: false, at: 10 },
            &Op::Drive { port: "clk".into(), level: true, at: 15 },
        ]
    );
    // nobody looked at the display while reset was held
    let released = ops
        .iter()
        .position(|op| matches!(op, Op::Drive { port, level: false, .. } if port == "reset"))
        .unwrap();
    assert!(!ops[..released].iter().any(|op| matches!(op, Op::Read { .. })));
    assert!(ops
        .iter()
        .all(|op| !matches!(op, Op::Read { at, .. } if *at < 15)));
}

#[test]
fn test_decode_fault_does_not_stop_the_loop() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen()).corrupt_read(3);
    let mut surface = RecordingSurface::new(&log);
    let mut h = Harness::new(config(Some(6))).unwrap();

    let summary = h.run(&mut circuit, &mut surface).unwrap();

    assert_eq!(summary.edges, 6);
    // every cell of the garbage frame is a bad glyph
    assert_eq!(summary.decode_faults, (ROWS * COLS) as u64);
    let lit: Vec<usize> = log
        .borrow()
        .iter()
        .filter_map(|op| match op {
            Op::Present { lit } => Some(*lit),
            _ => None,
        })
        .collect();
    assert_eq!(lit[3], 0);
    assert_eq!(lit[4], lit[2]);
}

#[test]
fn test_out_of_range_key_is_dropped() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log)
        .with_key(1, KeyCode(0x263A))
        .with_key(2, KeyCode::from('k'));
    let mut h = Harness::new(config(Some(4))).unwrap();

    let summary = h.run(&mut circuit, &mut surface).unwrap();

    assert_eq!(summary.edges, 4);
    assert_eq!(summary.encode_faults, 1);
    assert_eq!(summary.keys, 1);
    assert_eq!(circuit.keyboard(), [b'k', 1]);
}

#[test]
fn test_stuck_clock_is_a_sequencer_fault() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen()).stuck("clk");
    let mut surface = RecordingSurface::new(&log);
    let mut h = Harness::new(config(None)).unwrap();

    let err = h.run(&mut circuit, &mut surface).unwrap_err();

    match err {
        HarnessError::Sequencer(SequencerFault::NotResponding { port, waited_ns }) => {
            assert_eq!(port, "clk");
            assert!(waited_ns >= 1_000);
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(h.state(), HarnessState::Stopped);
    assert_eq!(count(&log, |op| matches!(op, Op::Present { .. })), 0);
    assert_eq!(count(&log, |op| matches!(op, Op::Read { .. })), 0);
    assert_eq!(count(&log, |op| *op == Op::Close), 1);
}

#[test]
fn test_window_that_will_not_open() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log).failing_open();
    let mut h = Harness::new(config(None)).unwrap();

    let err = h.run(&mut circuit, &mut surface).unwrap_err();

    assert!(matches!(err, HarnessError::ResourceAcquisition { resource: "display window", .. }));
    assert_eq!(count(&log, is_rising_clk), 0);
    assert_eq!(count(&log, |op| *op == Op::Close), 0);
}

#[test]
fn test_short_display_region_degrades() {
    let log = new_log();
    // one cell short of the 2x4 grid
    let mut circuit = RecordingCircuit::new(&log, b"AB12   ".to_vec());
    let mut surface = RecordingSurface::new(&log);
    let mut h = Harness::new(config(Some(2))).unwrap();

    let summary = h.run(&mut circuit, &mut surface).unwrap();

    assert_eq!(summary.edges, 2);
    assert_eq!(summary.decode_faults, 2);
}

#[test]
fn test_toy_cpu_echoes_keys() {
    let mut cpu = ToyCpu::new(ROWS, COLS);
    let mut display = HeadlessDisplay::new()
        .with_key(0, KeyCode::from('h'))
        .with_key(1, KeyCode::from('i'))
        .with_key(3, KeyCode::from('q'));
    let mut h = Harness::new(config(None)).unwrap();

    let summary = h.run(&mut cpu, &mut display).unwrap();

    assert_eq!(summary.reason, StopReason::QuitKey);
    assert_eq!(summary.edges, 4);
    assert_eq!(summary.keys, 3);
    assert_eq!(display.frames(), 4);
    assert_eq!(display.closes(), 1);
    assert!(!display.is_open());
    // the counter row is on screen from the first edge
    assert!(display.lit_history().iter().all(|&lit| lit > 0));
    // four edges plus the one the drain clocks through
    assert_eq!(cpu.counter(), 5);
    // 'q' was written on the last edge and clocked in while draining
    assert_eq!(&cpu.read_region("display_ram").unwrap()[COLS..COLS + 3], b"hiq");
}

#[test]
fn test_present_failure_ends_the_run() {
    let log = new_log();
    let mut circuit = RecordingCircuit::new(&log, screen());
    let mut surface = RecordingSurface::new(&log).failing_present_at(3);
    let mut h = Harness::new(config(None)).unwrap();

    let err = h.run(&mut circuit, &mut surface).unwrap_err();

    assert!(matches!(err, HarnessError::Surface { .. }));
    assert!(err.to_string().contains("gone"));
    assert_eq!(h.state(), HarnessState::Stopped);
    assert_eq!(count(&log, |op| matches!(op, Op::Present { .. })), 3);
    // edge 3 was started, nothing after it: no poll, no drain
    assert_eq!(count(&log, is_rising_clk), 4);
    assert_eq!(count(&log, |op| matches!(op, Op::Poll { .. })), 3);
    assert_eq!(count(&log, |op| *op == Op::Close), 1);
    assert_eq!(log.borrow().last(), Some(&Op::Close));
}
