use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use simharness::circuit::Nanos;
use simharness::config::{
    HarnessConfig, DEFAULT_CLOCK_PERIOD_NS, DEFAULT_RESET_NS, DEFAULT_STARTUP_TIMEOUT_NS,
};
use simharness::decoder::{CellEncoding, DEFAULT_CELL_SIZE, DEFAULT_GRID_COLS, DEFAULT_GRID_ROWS};
use simharness::display::{HeadlessDisplay, MonoTermDisplay};
use simharness::harness::Harness;
use simharness::input::KeyCode;
use simharness::toy_cpu::ToyCpu;

/// edges for a headless run when none are asked for
const HEADLESS_EDGES: u64 = 10;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Encoding {
    Glyph,
    Intensity,
}

#[derive(Parser, Debug)]
#[command(
    name = "simharness",
    version,
    about = "Drive a simulated CPU: reset, clock, display and keyboard",
    long_about = "Sequences reset and clock into the simulated CPU, shows its memory-mapped \
                  display in the terminal and feeds key presses back into its keyboard port.\n\n\
                  Esc or ctrl-c closes the window; the quit key (default 'q') is sent to the \
                  CPU and then stops the run."
)]
struct Cli {
    /// How long reset is held, in simulated ns.
    #[arg(long, default_value_t = DEFAULT_RESET_NS)]
    reset_ns: Nanos,

    /// Clock period, in simulated ns.
    #[arg(long, default_value_t = DEFAULT_CLOCK_PERIOD_NS)]
    clock_period_ns: Nanos,

    /// Settle time after the last edge, in simulated ns. Defaults to one clock period.
    #[arg(long)]
    drain_ns: Option<Nanos>,

    /// How long reset/clk may take to follow the drive during startup, in simulated ns.
    #[arg(long, default_value_t = DEFAULT_STARTUP_TIMEOUT_NS)]
    startup_timeout_ns: Nanos,

    #[arg(long, default_value_t = DEFAULT_GRID_ROWS)]
    grid_rows: usize,

    #[arg(long, default_value_t = DEFAULT_GRID_COLS)]
    grid_cols: usize,

    /// Pixels per cell side.
    #[arg(long, default_value_t = DEFAULT_CELL_SIZE)]
    cell_size: usize,

    /// How display cells are interpreted.
    #[arg(long, value_enum, default_value_t = Encoding::Glyph)]
    encoding: Encoding,

    /// Key that stops the run.
    #[arg(long, default_value_t = 'q')]
    quit_key: char,

    /// Stop after this many clock edges.
    #[arg(long)]
    edges: Option<u64>,

    /// Run without a window (no operator). Implies --edges 10 unless given.
    #[arg(long)]
    headless: bool,

    /// Minimum wall-clock time per edge, in ms.
    #[arg(long, default_value_t = 0)]
    frame_interval_ms: u64,

    /// Write logs here instead of stderr. Without it, interactive runs only
    /// log errors unless RUST_LOG says otherwise.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> HarnessConfig {
        let mut c = HarnessConfig::default();
        c.timing.reset_ns = self.reset_ns;
        c.timing.clock_period_ns = self.clock_period_ns;
        c.timing.drain_ns = self.drain_ns.unwrap_or(self.clock_period_ns);
        c.timing.startup_timeout_ns = self.startup_timeout_ns;
        c.layout.rows = self.grid_rows;
        c.layout.cols = self.grid_cols;
        c.layout.cell_size = self.cell_size;
        c.layout.encoding = match self.encoding {
            Encoding::Glyph => CellEncoding::Glyph,
            Encoding::Intensity => CellEncoding::Intensity,
        };
        c.quit_key = KeyCode::from(self.quit_key);
        c.max_edges = match (self.edges, self.headless) {
            (Some(n), _) => Some(n),
            (None, true) => Some(HEADLESS_EDGES),
            (None, false) => None,
        };
        c.frame_interval = Duration::from_millis(self.frame_interval_ms);
        c
    }
}

/// default log level when RUST_LOG isn't set. The terminal window owns the
/// screen, so an interactive run logging to stderr only reports errors, which
/// are logged after the window is closed.
fn default_level(headless: bool, log_file: Option<&PathBuf>) -> &'static str {
    if headless || log_file.is_some() {
        "info"
    } else {
        "error"
    }
}

fn init_logging(log_file: Option<&PathBuf>, level: &str) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(
        cli.log_file.as_ref(),
        default_level(cli.headless, cli.log_file.as_ref()),
    )?;

    let mut harness = Harness::new(cli.config())?;
    let layout = &harness.config().layout;
    let mut cpu = ToyCpu::new(layout.rows, layout.cols);

    let summary = if cli.headless {
        let mut display = HeadlessDisplay::new();
        harness.run(&mut cpu, &mut display)?
    } else {
        let mut display = MonoTermDisplay::new("SIMHARNESS");
        harness.run(&mut cpu, &mut display)?
    };

    info!(
        edges = summary.edges,
        frames = summary.frames,
        keys = summary.keys,
        finished_at = summary.finished_at,
        "done"
    );
    Ok(())
}
