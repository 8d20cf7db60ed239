//! # decoder
//!
//! Turns the circuit's memory-mapped display region into a frame. The region
//! is a grid of cells, row-major; the byte for cell (row, col) lives at
//! `base + (row * cols + col) * stride` and only the bits in `mask` count.
//!
//! Every edge re-renders every cell from scratch. A cell whose byte is
//! missing or makes no sense comes out blank and is reported, it never stops
//! the rest of the frame from being drawn.

use thiserror::Error;

use crate::circuit::{Circuit, CircuitError};
use crate::config::ConfigError;
use crate::display::{FrameBuffer, CHANNELS, PIXEL_ON};

pub const DEFAULT_GRID_ROWS: usize = 50;
pub const DEFAULT_GRID_COLS: usize = 50;
pub const DEFAULT_CELL_SIZE: usize = 40;

/// largest frame buffer a layout may ask for, in bytes
pub const MAX_FRAME_BYTES: usize = 256 << 20;

/// what a cell byte means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellEncoding {
    /// an ASCII character, drawn with the built-in font
    Glyph,
    /// a grey level that fills the whole cell
    Intensity,
}

/// maps the display region onto a grid of cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub rows: usize,
    pub cols: usize,
    /// pixels per cell side
    pub cell_size: usize,
    pub encoding: CellEncoding,
    pub base: usize,
    pub stride: usize,
    pub mask: u8,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            rows: DEFAULT_GRID_ROWS,
            cols: DEFAULT_GRID_COLS,
            cell_size: DEFAULT_CELL_SIZE,
            encoding: CellEncoding::Glyph,
            base: 0,
            stride: 1,
            mask: 0xff,
        }
    }
}

impl Layout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::EmptyGrid {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.cell_size == 0 {
            return Err(ConfigError::ZeroCellSize);
        }
        if self.stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        match self.frame_bytes() {
            Some(n) if n <= MAX_FRAME_BYTES => (),
            _ => {
                return Err(ConfigError::FrameTooLarge {
                    rows: self.rows,
                    cols: self.cols,
                    cell_size: self.cell_size,
                    max_bytes: MAX_FRAME_BYTES,
                })
            }
        }
        // offset of the last cell; every other cell sits below it
        let last = (self.rows * self.cols - 1)
            .checked_mul(self.stride)
            .and_then(|o| o.checked_add(self.base));
        if last.is_none() {
            return Err(ConfigError::CellOffsetOverflow {
                base: self.base,
                stride: self.stride,
            });
        }
        Ok(())
    }

    /// size of the frame buffer in bytes, None if it doesn't fit a usize
    fn frame_bytes(&self) -> Option<usize> {
        let height = self.rows.checked_mul(self.cell_size)?;
        let width = self.cols.checked_mul(self.cell_size)?;
        height.checked_mul(width)?.checked_mul(CHANNELS)
    }

    pub fn frame_height(&self) -> usize {
        self.rows * self.cell_size
    }

    pub fn frame_width(&self) -> usize {
        self.cols * self.cell_size
    }

    /// byte offset of a cell within the display region
    pub fn cell_offset(&self, row: usize, col: usize) -> usize {
        self.base + (row * self.cols + col) * self.stride
    }

    /// a blank frame of the right size for this layout
    pub fn new_frame(&self) -> FrameBuffer {
        FrameBuffer::new(self.frame_height(), self.frame_width())
    }
}

/// a single cell (or the whole region) that couldn't be decoded this edge
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeFault {
    #[error("display region unavailable: {source}")]
    RegionUnavailable {
        #[source]
        source: CircuitError,
    },
    #[error("cell ({row}, {col}) at offset {offset} is past the end of the display region")]
    MissingCell { row: usize, col: usize, offset: usize },
    #[error("cell ({row}, {col}) holds 0x{value:02x}, which has no glyph")]
    UnknownGlyph { row: usize, col: usize, value: u8 },
}

/// what went wrong while decoding one frame; the frame itself is always usable
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub faults: Vec<DecodeFault>,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// render the display region `port` into `frame`. The frame is reallocated if
/// its size doesn't match the layout, otherwise cleared.
pub fn decode(
    circuit: &impl Circuit,
    port: &str,
    frame: &mut FrameBuffer,
    layout: &Layout,
) -> DecodeReport {
    let mut report = DecodeReport::default();
    if frame.height() != layout.frame_height() || frame.width() != layout.frame_width() {
        *frame = layout.new_frame();
    } else {
        frame.clear();
    }

    let region = match circuit.read_region(port) {
        Ok(region) => region,
        Err(source) => {
            report.faults.push(DecodeFault::RegionUnavailable { source });
            return report;
        }
    };

    for row in 0..layout.rows {
        for col in 0..layout.cols {
            let offset = layout.cell_offset(row, col);
            let value = match region.get(offset) {
                Some(byte) => byte & layout.mask,
                None => {
                    report.faults.push(DecodeFault::MissingCell { row, col, offset });
                    continue;
                }
            };
            let x = col * layout.cell_size;
            let y = row * layout.cell_size;
            match layout.encoding {
                CellEncoding::Intensity => {
                    frame.fill_rect(x, y, layout.cell_size, layout.cell_size, value)
                }
                CellEncoding::Glyph => match glyph(value) {
                    Some(Glyph::Blank) => (),
                    Some(Glyph::Shape(rows)) => draw_glyph(frame, x, y, layout.cell_size, rows),
                    None => report.faults.push(DecodeFault::UnknownGlyph { row, col, value }),
                },
            }
        }
    }
    report
}

const GLYPH_WIDTH: usize = 4;
const GLYPH_HEIGHT: usize = 5;

/// how many font pixels fit across a cell, counting a one pixel margin
const GLYPH_CELL_UNITS: usize = 8;

enum Glyph {
    Blank,
    Shape(&'static [u8; GLYPH_HEIGHT]),
}

fn glyph(value: u8) -> Option<Glyph> {
    match value {
        0x00 | b' ' => Some(Glyph::Blank),
        _ => {
            let c = value.to_ascii_uppercase();
            FONT.iter()
                .find(|(ch, _)| *ch == c)
                .map(|(_, rows)| Glyph::Shape(rows))
        }
    }
}

/// draw a glyph centred in the cell at (x, y), scaled to fit
fn draw_glyph(frame: &mut FrameBuffer, x: usize, y: usize, cell: usize, rows: &[u8; GLYPH_HEIGHT]) {
    let scale = (cell / GLYPH_CELL_UNITS).max(1);
    let x0 = x + cell.saturating_sub(GLYPH_WIDTH * scale) / 2;
    let y0 = y + cell.saturating_sub(GLYPH_HEIGHT * scale) / 2;
    for (gy, &bits) in rows.iter().enumerate() {
        for gx in 0..GLYPH_WIDTH {
            let lit = 1 & (bits >> (7 - gx));
            if lit == 0 {
                continue;
            }
            // clip to the cell, tiny cells lose the edges of the glyph
            let px = x0 + gx * scale;
            let py = y0 + gy * scale;
            let w = scale.min((x + cell).saturating_sub(px));
            let h = scale.min((y + cell).saturating_sub(py));
            frame.fill_rect(px, py, w, h, PIXEL_ON);
        }
    }
}

/// 4x5 font, high nibble of each row; digits and upper case letters
#[rustfmt::skip]
static FONT: [(u8, [u8; GLYPH_HEIGHT]); 36] = [
    (b'0', [0xF0, 0x90, 0x90, 0x90, 0xF0]),
    (b'1', [0x20, 0x60, 0x20, 0x20, 0x70]),
    (b'2', [0xF0, 0x10, 0xF0, 0x80, 0xF0]),
    (b'3', [0xF0, 0x10, 0xF0, 0x10, 0xF0]),
    (b'4', [0x90, 0x90, 0xF0, 0x10, 0x10]),
    (b'5', [0xF0, 0x80, 0xF0, 0x10, 0xF0]),
    (b'6', [0xF0, 0x80, 0xF0, 0x90, 0xF0]),
    (b'7', [0xF0, 0x10, 0x20, 0x40, 0x40]),
    (b'8', [0xF0, 0x90, 0xF0, 0x90, 0xF0]),
    (b'9', [0xF0, 0x90, 0xF0, 0x10, 0xF0]),
    (b'A', [0xF0, 0x90, 0xF0, 0x90, 0x90]),
    (b'B', [0xE0, 0x90, 0xE0, 0x90, 0xE0]),
    (b'C', [0xF0, 0x80, 0x80, 0x80, 0xF0]),
    (b'D', [0xE0, 0x90, 0x90, 0x90, 0xE0]),
    (b'E', [0xF0, 0x80, 0xF0, 0x80, 0xF0]),
    (b'F', [0xF0, 0x80, 0xF0, 0x80, 0x80]),
    (b'G', [0xF0, 0x80, 0xB0, 0x90, 0xF0]),
    (b'H', [0x90, 0x90, 0xF0, 0x90, 0x90]),
    (b'I', [0x70, 0x20, 0x20, 0x20, 0x70]),
    (b'J', [0x10, 0x10, 0x10, 0x90, 0x60]),
    (b'K', [0x90, 0xA0, 0xC0, 0xA0, 0x90]),
    (b'L', [0x80, 0x80, 0x80, 0x80, 0xF0]),
    (b'M', [0x90, 0xF0, 0xF0, 0x90, 0x90]),
    (b'N', [0x90, 0xD0, 0xB0, 0x90, 0x90]),
    (b'O', [0x60, 0x90, 0x90, 0x90, 0x60]),
    (b'P', [0xE0, 0x90, 0xE0, 0x80, 0x80]),
    (b'Q', [0x60, 0x90, 0x90, 0xB0, 0x70]),
    (b'R', [0xE0, 0x90, 0xE0, 0xA0, 0x90]),
    (b'S', [0x70, 0x80, 0x60, 0x10, 0xE0]),
    (b'T', [0xE0, 0x40, 0x40, 0x40, 0x40]),
    (b'U', [0x90, 0x90, 0x90, 0x90, 0x60]),
    (b'V', [0x90, 0x90, 0x90, 0x60, 0x60]),
    (b'W', [0x90, 0x90, 0xF0, 0xF0, 0x90]),
    (b'X', [0x90, 0x90, 0x60, 0x90, 0x90]),
    (b'Y', [0xA0, 0xA0, 0x40, 0x40, 0x40]),
    (b'Z', [0xF0, 0x10, 0x60, 0x80, 0xF0]),
];
