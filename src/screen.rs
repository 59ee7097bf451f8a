//! Screen model seen by the bridge
//!
//! [`ScreenSink`] is the drawing interface the engine integration layer calls
//! into, one method per drawing event. [`ScreenGrid`] mirrors the cell
//! contents so composition bookkeeping can look backward from the cursor.

use crate::protocol::payload::DefaultColors;
use crate::render::HighlightAttributes;

/// Cell coordinates on the grid (0-indexed)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellPos {
    pub row: u32,
    pub col: u32,
}

impl CellPos {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Drawing callbacks produced by the engine
pub trait ScreenSink {
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    /// Clear from the put position to the end of its row
    fn eol_clear(&mut self);
    /// Move the put position without moving the cursor
    fn goto(&mut self, row: u32, col: u32);
    /// Move the cursor, which also becomes the put position
    fn cursor_goto(&mut self, row: u32, col: u32);
    fn highlight_set(&mut self, attrs: HighlightAttributes);
    /// Draw one cell at the put position and advance it
    fn put(&mut self, text: &str);
    fn set_scroll_region(&mut self, top: u32, bottom: u32, left: u32, right: u32);
    fn scroll(&mut self, count: i32);
    fn set_colors(&mut self, colors: DefaultColors);
    fn mode_change(&mut self, mode: &str, index: u32);
    fn set_title(&mut self, title: &str);
    fn set_icon(&mut self, icon: &str);
    fn bell(&mut self);
    fn visual_bell(&mut self);
    fn busy_start(&mut self);
    fn busy_stop(&mut self);
    fn mouse_on(&mut self);
    fn mouse_off(&mut self);
    fn flush(&mut self);
}

/// Largest width or height a grid may have
pub const MAX_GRID_DIMENSION: u32 = 10_000;

/// Largest number of cells a grid may hold
pub const MAX_GRID_CELLS: u64 = 1 << 20;

/// Whether `width` x `height` fits inside the grid limits
pub fn grid_fits(width: u32, height: u32) -> bool {
    width <= MAX_GRID_DIMENSION
        && height <= MAX_GRID_DIMENSION
        && u64::from(width) * u64::from(height) <= MAX_GRID_CELLS
}

/// Cell-addressed copy of what the host is showing
#[derive(Debug, Clone, Default)]
pub struct ScreenGrid {
    width: u32,
    height: u32,
    cells: Vec<String>,
}

impl ScreenGrid {
    pub fn new(width: u32, height: u32) -> Self {
        let mut grid = Self::default();
        grid.resize(width, height);
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resize and blank the grid; sizes past the limits are clamped
    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.min(MAX_GRID_DIMENSION);
        let mut height = height.min(MAX_GRID_DIMENSION);
        if !grid_fits(width, height) {
            height = (MAX_GRID_CELLS / u64::from(width)) as u32;
            tracing::warn!(width, height, "grid size clamped");
        }
        self.width = width;
        self.height = height;
        self.cells = vec![" ".to_string(); self.cell_count()];
    }

    /// Number of cells, at most [`MAX_GRID_CELLS`]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn index(&self, row: u32, col: u32) -> Option<usize> {
        (row < self.height && col < self.width)
            .then(|| row as usize * self.width as usize + col as usize)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&str> {
        self.index(row, col).map(|i| self.cells[i].as_str())
    }

    /// Empty (right half of a wide char) or a space; cells off the grid count as blank
    pub fn is_blank(&self, row: u32, col: u32) -> bool {
        self.cell(row, col)
            .map_or(true, |text| text.is_empty() || text == " ")
    }

    pub fn set(&mut self, row: u32, col: u32, text: &str) {
        if let Some(i) = self.index(row, col) {
            self.cells[i].clear();
            self.cells[i].push_str(text);
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
            cell.push(' ');
        }
    }

    pub fn clear_to_eol(&mut self, row: u32, col: u32) {
        for c in col..self.width {
            self.set(row, c, " ");
        }
    }

    /// Scroll the inclusive region by `count` rows; positive moves content up
    pub fn scroll(&mut self, top: u32, bottom: u32, left: u32, right: u32, count: i32) {
        if self.width == 0 || self.height == 0 || count == 0 {
            return;
        }
        let bottom = bottom.min(self.height - 1);
        let right = right.min(self.width - 1);
        if top > bottom || left > right {
            return;
        }

        let rows: Vec<u32> = if count > 0 {
            (top..=bottom).collect()
        } else {
            (top..=bottom).rev().collect()
        };
        for row in rows {
            let src = row as i64 + count as i64;
            for col in left..=right {
                let text = if src >= top as i64 && src <= bottom as i64 {
                    self.cell(src as u32, col).unwrap_or(" ").to_string()
                } else {
                    " ".to_string()
                };
                self.set(row, col, &text);
            }
        }
    }

    /// Row contents joined, for diagnostics and tests
    pub fn row_text(&self, row: u32) -> String {
        (0..self.width)
            .filter_map(|col| self.cell(row, col))
            .collect()
    }
}
