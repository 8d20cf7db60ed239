use std::collections::{HashSet, VecDeque};
use std::io;

use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

use crate::input::{drain_terminal_events, KeyCode, KeySource};

/// channels per pixel (B, G, R); all channels carry the same value for now
pub const CHANNELS: usize = 3;
pub const PIXEL_OFF: u8 = 0x00;
pub const PIXEL_ON: u8 = 0xff;

/// anything brighter than this shows up on a mono surface
const LIT_THRESHOLD: u8 = 0x7f;

/// height x width x channel pixel grid for one decoded snapshot of the
/// display region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    height: usize,
    width: usize,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(height: usize, width: usize) -> Self {
        FrameBuffer {
            height,
            width,
            pixels: vec![PIXEL_OFF; height * width * CHANNELS],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn clear(&mut self) {
        self.pixels.iter_mut().for_each(|p| *p = PIXEL_OFF);
    }

    /// intensity at (x, y); out of bounds reads as off
    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return PIXEL_OFF;
        }
        self.pixels[(y * self.width + x) * CHANNELS]
    }

    /// fill a rectangle on every channel, clipped to the frame
    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, value: u8) {
        let x_end = (x + w).min(self.width);
        let y_end = (y + h).min(self.height);
        for py in y.min(y_end)..y_end {
            let row = py * self.width;
            for px in x.min(x_end)..x_end {
                let i = (row + px) * CHANNELS;
                self.pixels[i..i + CHANNELS].fill(value);
            }
        }
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels
            .chunks_exact(CHANNELS)
            .filter(|p| p[0] > LIT_THRESHOLD)
            .count()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

/// Display is what the harness shows frames on. The window is acquired by
/// `open` before the first frame and given back by `close`, and the harness
/// guarantees `close` is called exactly once on the way out.
pub trait Display {
    /// acquire the underlying window
    fn open(&mut self) -> Result<(), io::Error>;

    /// show a frame; true when the operator asked to close the window
    fn present(&mut self, frame: &FrameBuffer) -> Result<bool, io::Error>;

    /// release the underlying window
    fn close(&mut self) -> Result<(), io::Error>;
}

type TermBackend = CrosstermBackend<io::Stdout>;

/// monochrome window in a terminal, rendered using TUI and Crossterm. Keys
/// typed into the terminal are queued here and handed out through
/// `KeySource`.
pub struct MonoTermDisplay {
    title: String,
    terminal: Option<Terminal<TermBackend>>,
    pending: VecDeque<KeyCode>,
    close_requested: bool,
}

impl MonoTermDisplay {
    pub fn new(title: &str) -> Self {
        MonoTermDisplay {
            title: title.to_owned(),
            terminal: None,
            pending: VecDeque::new(),
            close_requested: false,
        }
    }

    fn acquire() -> Result<Terminal<TermBackend>, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        terminal.clear()?;
        Ok(terminal)
    }

    fn release(terminal: &mut Terminal<TermBackend>) -> Result<(), io::Error> {
        terminal.show_cursor()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        Ok(())
    }
}

/// how many frame pixels go into one canvas dot so the frame fits in
/// `cols` x `rows` terminal cells of braille (2x4 dots each)
fn sample_step(frame: &FrameBuffer, cols: u16, rows: u16) -> usize {
    let dots_x = (cols as usize * 2).max(1);
    let dots_y = (rows as usize * 4).max(1);
    let step_x = (frame.width() + dots_x - 1) / dots_x;
    let step_y = (frame.height() + dots_y - 1) / dots_y;
    step_x.max(step_y).max(1)
}

/// lit dots of a frame sampled every `step` pixels, as canvas coords with y
/// pointing down
fn lit_points(frame: &FrameBuffer, step: usize) -> Vec<(f64, f64)> {
    let mut points = Vec::new();
    for sy in 0..(frame.height() + step - 1) / step {
        for sx in 0..(frame.width() + step - 1) / step {
            if frame.get(sx * step, sy * step) > LIT_THRESHOLD {
                points.push((sx as f64, -(sy as f64)));
            }
        }
    }
    points
}

impl Display for MonoTermDisplay {
    fn open(&mut self) -> Result<(), io::Error> {
        if self.terminal.is_some() {
            return Ok(());
        }
        terminal::enable_raw_mode()?;
        match Self::acquire() {
            Ok(t) => {
                self.terminal = Some(t);
                Ok(())
            }
            Err(e) => {
                // don't leave the operator's terminal in raw mode
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = terminal::disable_raw_mode();
                Err(e)
            }
        }
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<bool, io::Error> {
        let terminal = match self.terminal.as_mut() {
            Some(t) => t,
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "terminal display presented before open",
                ))
            }
        };
        if drain_terminal_events(&mut self.pending)? {
            self.close_requested = true;
        }
        let title = self.title.as_str();
        terminal.draw(|f| {
            let area = f.size();
            let inner_cols = area.width.saturating_sub(2);
            let inner_rows = area.height.saturating_sub(2);
            let step = sample_step(frame, inner_cols, inner_rows);
            let dots_x = (frame.width() + step - 1) / step;
            let dots_y = (frame.height() + step - 1) / step;
            let points = lit_points(frame, step);
            let size = Rect::new(
                0,
                0,
                area.width.min(2 + ((dots_x + 1) / 2) as u16),
                area.height.min(2 + ((dots_y + 3) / 4) as u16),
            );

            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(title)
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds([0.0, dots_x.saturating_sub(1) as f64])
                .y_bounds([-(dots_y.saturating_sub(1) as f64), 0.0])
                .marker(Marker::Braille)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: &points,
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, size);
        })?;
        Ok(self.close_requested)
    }

    fn close(&mut self) -> Result<(), io::Error> {
        if let Some(mut t) = self.terminal.take() {
            let released = Self::release(&mut t);
            terminal::disable_raw_mode()?;
            released?;
        }
        Ok(())
    }
}

impl KeySource for MonoTermDisplay {
    fn pending_key(&mut self) -> Result<Option<KeyCode>, io::Error> {
        if self.pending.is_empty() && drain_terminal_events(&mut self.pending)? {
            self.close_requested = true;
        }
        Ok(self.pending.pop_front())
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Virtual surface for runs with no operator. Keys and close requests are
/// scripted up front, everything shown to it is counted.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    keys: VecDeque<(u64, KeyCode)>,
    close_at: HashSet<u64>,
    fail_present_at: Option<u64>,
    fail_open: bool,
    is_open: bool,
    opens: u64,
    closes: u64,
    polls: u64,
    lit_history: Vec<usize>,
    last_frame: Option<FrameBuffer>,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// `code` is pending on the `poll`th key poll (0-based, one poll per edge)
    pub fn with_key(mut self, poll: u64, code: KeyCode) -> Self {
        self.keys.push_back((poll, code));
        self.keys.make_contiguous().sort_by_key(|(p, _)| *p);
        self
    }

    /// report a close request from the `present`th present (0-based)
    pub fn with_close_at(mut self, present: u64) -> Self {
        self.close_at.insert(present);
        self
    }

    /// make the `present`th present (0-based) fail, as if the window vanished
    pub fn failing_present_at(mut self, present: u64) -> Self {
        self.fail_present_at = Some(present);
        self
    }

    /// make `open` fail, as if there were no window to be had
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn opens(&self) -> u64 {
        self.opens
    }

    pub fn closes(&self) -> u64 {
        self.closes
    }

    pub fn frames(&self) -> u64 {
        self.lit_history.len() as u64
    }

    /// lit pixel count of every frame presented so far
    pub fn lit_history(&self) -> &[usize] {
        &self.lit_history
    }

    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        self.last_frame.as_ref()
    }
}

impl Display for HeadlessDisplay {
    fn open(&mut self) -> Result<(), io::Error> {
        if self.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no display available",
            ));
        }
        self.opens += 1;
        self.is_open = true;
        Ok(())
    }

    fn present(&mut self, frame: &FrameBuffer) -> Result<bool, io::Error> {
        if !self.is_open {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "headless display presented before open",
            ));
        }
        let n = self.frames();
        if self.fail_present_at == Some(n) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "display went away"));
        }
        self.lit_history.push(frame.lit_pixels());
        match self.last_frame.as_mut() {
            Some(last) => last.clone_from(frame),
            None => self.last_frame = Some(frame.clone()),
        }
        Ok(self.close_at.contains(&n))
    }

    fn close(&mut self) -> Result<(), io::Error> {
        self.closes += 1;
        self.is_open = false;
        Ok(())
    }
}

impl KeySource for HeadlessDisplay {
    fn pending_key(&mut self) -> Result<Option<KeyCode>, io::Error> {
        let poll = self.polls;
        self.polls += 1;
        // drop anything scripted for a poll that has already gone by
        while matches!(self.keys.front(), Some((p, _)) if *p < poll) {
            self.keys.pop_front();
        }
        match self.keys.front() {
            Some((p, code)) if *p == poll => {
                let code = *code;
                self.keys.pop_front();
                Ok(Some(code))
            }
            _ => Ok(None),
        }
    }
}
