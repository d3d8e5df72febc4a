//! The framebuffer: a small VT-style terminal emulator.
//!
//! Consumes an arbitrary byte stream (see [`parser`]) and maintains a
//! `cols x rows` grid of styled [`Cell`]s plus cursor state. [`Framebuffer::serialize`]
//! produces a self-contained escape-sequence stream that reconstructs the
//! current visible state on a fresh emulator (see [`serialize`]).
//!
//! The framebuffer never fails and performs no I/O; malformed input is
//! silently tolerated. Callers are responsible for serializing access to a
//! single instance (it is not internally synchronized).

pub mod cell;
mod parser;
mod serialize;

pub use cell::{Cell, CellAttrs, Color, CursorState, SavedCursor};
pub use parser::ParserState;

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Alternate-screen state stashed by `CSI ? 1049 h` and restored by
/// `CSI ? 1049 l`.
#[derive(Debug)]
struct AltScreen {
    grid: Vec<Vec<Cell>>,
    cursor: CursorState,
}

/// Stateful terminal emulator. See module docs.
#[derive(Debug)]
pub struct Framebuffer {
    cols: u16,
    rows: u16,
    grid: Vec<Vec<Cell>>,
    alt: Option<AltScreen>,
    cursor: CursorState,
    cur_fg: Color,
    cur_bg: Color,
    cur_attrs: CellAttrs,
    scroll_top: u16,
    scroll_bottom: u16,
    saved: Option<SavedCursor>,
    parser: ParserState,
}

fn blank_row(cols: u16) -> Vec<Cell> {
    vec![Cell::default(); cols as usize]
}

fn make_grid(cols: u16, rows: u16) -> Vec<Vec<Cell>> {
    (0..rows).map(|_| blank_row(cols)).collect()
}

impl Framebuffer {
    /// Construct a framebuffer with the given dimensions (spec default is
    /// 80x24).
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Framebuffer {
            cols,
            rows,
            grid: make_grid(cols, rows),
            alt: None,
            cursor: CursorState::default(),
            cur_fg: Color::Default,
            cur_bg: Color::Default,
            cur_attrs: CellAttrs::empty(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            saved: None,
            parser: ParserState::default(),
        }
    }

    /// Current `(cols, rows)`.
    pub fn get_size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Feed raw bytes to the parser, mutating the grid as far as a complete
    /// parse allows. Incomplete trailing sequences are retained internally
    /// for the next call.
    pub fn write(&mut self, bytes: &[u8]) {
        parser::feed(self, bytes);
    }

    /// Reshape the grid, preserving the top-left `min(old, new)` rectangle.
    /// Resets the scroll region to full height and clamps the cursor.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.grid = resized_grid(&self.grid, cols, rows);
        if let Some(alt) = &mut self.alt {
            alt.grid = resized_grid(&alt.grid, cols, rows);
        }
        self.cols = cols;
        self.rows = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.cursor.x = self.cursor.x.min(cols.saturating_sub(1));
        self.cursor.y = self.cursor.y.min(rows.saturating_sub(1));
    }

    /// Inspect a cell (for tests / debugging).
    pub fn cell(&self, x: u16, y: u16) -> Cell {
        self.grid
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or_default()
    }

    /// Current cursor state.
    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    /// Escape-sequence serialization of the current visible state.
    pub fn serialize(&self) -> String {
        serialize::serialize(self)
    }

    fn active_grid_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.grid
    }

    fn row_mut(&mut self, y: u16) -> &mut Vec<Cell> {
        &mut self.active_grid_mut()[y as usize]
    }

    fn clamp_cursor(&mut self) {
        self.cursor.x = self.cursor.x.min(self.cols.saturating_sub(1));
        self.cursor.y = self.cursor.y.min(self.rows.saturating_sub(1));
    }

    // ---- cursor motion -------------------------------------------------

    fn cursor_up(&mut self, n: u16) {
        self.cursor.y = self.cursor.y.saturating_sub(n);
    }

    fn cursor_down(&mut self, n: u16) {
        self.cursor.y = (self.cursor.y + n).min(self.rows - 1);
    }

    fn cursor_forward(&mut self, n: u16) {
        self.cursor.x = (self.cursor.x + n).min(self.cols - 1);
    }

    fn cursor_backward(&mut self, n: u16) {
        self.cursor.x = self.cursor.x.saturating_sub(n);
    }

    // ---- linefeed / scrolling -------------------------------------------

    /// Line feed semantics (also used by `ESC D`).
    fn linefeed(&mut self) {
        if self.cursor.y == self.scroll_bottom {
            self.scroll_up_region();
        } else if self.cursor.y < self.rows - 1 {
            self.cursor.y += 1;
        }
    }

    /// Reverse index (`ESC M`): symmetric to linefeed.
    fn reverse_index(&mut self) {
        if self.cursor.y == self.scroll_top {
            self.scroll_down_region();
        } else if self.cursor.y > 0 {
            self.cursor.y -= 1;
        }
    }

    fn scroll_up_region(&mut self) {
        let top = self.scroll_top as usize;
        let bottom = self.scroll_bottom as usize;
        let cols = self.cols;
        let grid = self.active_grid_mut();
        if top <= bottom && bottom < grid.len() {
            grid.remove(top);
            grid.insert(bottom, blank_row(cols));
        }
    }

    fn scroll_down_region(&mut self) {
        let top = self.scroll_top as usize;
        let bottom = self.scroll_bottom as usize;
        let cols = self.cols;
        let grid = self.active_grid_mut();
        if top <= bottom && bottom < grid.len() {
            grid.remove(bottom);
            grid.insert(top, blank_row(cols));
        }
    }

    fn carriage_return(&mut self) {
        self.cursor.x = 0;
    }

    fn next_line(&mut self) {
        self.carriage_return();
        self.linefeed();
    }

    fn tab(&mut self) {
        let next = ((self.cursor.x / 8) + 1) * 8;
        self.cursor.x = next.min(self.cols - 1);
    }

    fn backspace(&mut self) {
        self.cursor.x = self.cursor.x.saturating_sub(1);
    }

    // ---- printing --------------------------------------------------------

    fn put_char(&mut self, c: char) {
        if self.cursor.x >= self.cols {
            self.carriage_return();
            self.linefeed();
        }
        let fg = self.cur_fg;
        let bg = self.cur_bg;
        let attrs = self.cur_attrs;
        let (x, y) = (self.cursor.x, self.cursor.y);
        let row = self.row_mut(y);
        if (x as usize) < row.len() {
            row[x as usize] = Cell { ch: c, fg, bg, attrs };
        }
        self.cursor.x += 1;
    }

    // ---- erase / insert / delete -----------------------------------------

    fn erase_line(&mut self, mode: i64) {
        let cols = self.cols;
        let (x, y) = (self.cursor.x, self.cursor.y);
        let row = self.row_mut(y);
        match mode {
            0 => {
                for cell in row.iter_mut().skip(x as usize) {
                    *cell = Cell::default();
                }
            }
            1 => {
                for cell in row.iter_mut().take((x as usize + 1).min(cols as usize)) {
                    *cell = Cell::default();
                }
            }
            _ => {
                for cell in row.iter_mut() {
                    *cell = Cell::default();
                }
            }
        }
    }

    fn erase_display(&mut self, mode: i64) {
        match mode {
            0 => {
                let y = self.cursor.y;
                self.erase_line(0);
                let rows = self.rows;
                for row_y in (y + 1)..rows {
                    self.row_mut(row_y).iter_mut().for_each(|c| *c = Cell::default());
                }
            }
            1 => {
                let y = self.cursor.y;
                for row_y in 0..y {
                    self.row_mut(row_y).iter_mut().for_each(|c| *c = Cell::default());
                }
                self.erase_line(1);
            }
            _ => {
                let cols = self.cols;
                let rows = self.rows;
                *self.active_grid_mut() = make_grid(cols, rows);
            }
        }
    }

    fn erase_chars(&mut self, n: u16) {
        let cols = self.cols;
        let x = self.cursor.x as usize;
        let y = self.cursor.y;
        let row = self.row_mut(y);
        let end = (x + n as usize).min(cols as usize);
        for cell in row.iter_mut().take(end).skip(x) {
            *cell = Cell::default();
        }
    }

    fn insert_chars(&mut self, n: u16) {
        let cols = self.cols as usize;
        let x = self.cursor.x as usize;
        let y = self.cursor.y;
        let row = self.row_mut(y);
        for _ in 0..n {
            if x <= row.len() {
                row.insert(x, Cell::default());
            }
        }
        row.truncate(cols);
    }

    fn delete_chars(&mut self, n: u16) {
        let cols = self.cols as usize;
        let x = self.cursor.x as usize;
        let y = self.cursor.y;
        let row = self.row_mut(y);
        for _ in 0..n {
            if x < row.len() {
                row.remove(x);
            }
        }
        while row.len() < cols {
            row.push(Cell::default());
        }
    }

    fn insert_lines(&mut self, n: u16) {
        if self.cursor.y < self.scroll_top || self.cursor.y > self.scroll_bottom {
            return;
        }
        let region = (self.scroll_bottom - self.scroll_top + 1) as u16;
        let n = n.min(region);
        let cols = self.cols;
        let (y, bottom) = (self.cursor.y as usize, self.scroll_bottom as usize);
        let grid = self.active_grid_mut();
        for _ in 0..n {
            if bottom < grid.len() {
                grid.remove(bottom);
                grid.insert(y, blank_row(cols));
            }
        }
    }

    fn delete_lines(&mut self, n: u16) {
        if self.cursor.y < self.scroll_top || self.cursor.y > self.scroll_bottom {
            return;
        }
        let region = (self.scroll_bottom - self.scroll_top + 1) as u16;
        let n = n.min(region);
        let cols = self.cols;
        let (y, bottom) = (self.cursor.y as usize, self.scroll_bottom as usize);
        let grid = self.active_grid_mut();
        for _ in 0..n {
            if y < grid.len() {
                grid.remove(y);
                grid.insert(bottom, blank_row(cols));
            }
        }
    }

    // ---- cursor save/restore ----------------------------------------------

    fn save_cursor(&mut self) {
        self.saved = Some(SavedCursor {
            x: self.cursor.x,
            y: self.cursor.y,
            fg: self.cur_fg,
            bg: self.cur_bg,
            attrs: self.cur_attrs,
        });
    }

    fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved {
            self.cursor.x = saved.x;
            self.cursor.y = saved.y;
            self.cur_fg = saved.fg;
            self.cur_bg = saved.bg;
            self.cur_attrs = saved.attrs;
            self.clamp_cursor();
        }
    }

    // ---- scroll region / alt screen ---------------------------------------

    fn set_scroll_region(&mut self, top: i64, bottom: i64) {
        let top = top.max(0) as u16;
        let bottom = (bottom.max(0) as u16).min(self.rows.saturating_sub(1));
        if top <= bottom {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        } else {
            self.scroll_top = 0;
            self.scroll_bottom = self.rows.saturating_sub(1);
        }
    }

    fn enter_alt_screen(&mut self) {
        if self.alt.is_some() {
            return;
        }
        let cols = self.cols;
        let rows = self.rows;
        let stashed = std::mem::replace(&mut self.grid, make_grid(cols, rows));
        self.alt = Some(AltScreen { grid: stashed, cursor: self.cursor });
        self.cursor = CursorState { x: 0, y: 0, visible: self.cursor.visible };
    }

    fn leave_alt_screen(&mut self) {
        if let Some(alt) = self.alt.take() {
            self.grid = alt.grid;
            self.cursor = alt.cursor;
        }
    }

    fn full_reset(&mut self) {
        let (cols, rows) = (self.cols, self.rows);
        *self = Framebuffer::new(cols, rows);
    }
}

/// Rebuild a grid at new dimensions, preserving the overlapping top-left
/// rectangle.
fn resized_grid(old: &[Vec<Cell>], cols: u16, rows: u16) -> Vec<Vec<Cell>> {
    let mut grid = make_grid(cols, rows);
    for (y, old_row) in old.iter().enumerate().take(rows as usize) {
        for (x, cell) in old_row.iter().enumerate().take(cols as usize) {
            grid[y][x] = *cell;
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_has_expected_defaults() {
        let fb = Framebuffer::new(80, 24);
        assert_eq!(fb.get_size(), (80, 24));
        assert_eq!(fb.cursor(), CursorState { x: 0, y: 0, visible: true });
        assert_eq!(fb.scroll_top, 0);
        assert_eq!(fb.scroll_bottom, 23);
    }

    #[test]
    fn resize_preserves_overlap_and_clamps_cursor() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"hi");
        fb.resize(4, 3);
        assert_eq!(fb.get_size(), (4, 3));
        assert_eq!(fb.cell(0, 0).ch, 'h');
        assert_eq!(fb.cell(1, 0).ch, 'i');
        assert!(fb.cursor().x < 4 && fb.cursor().y < 3);
    }

    #[test]
    fn resize_idempotent() {
        let mut fb = Framebuffer::new(80, 24);
        fb.resize(80, 24);
        assert_eq!(fb.get_size(), (80, 24));
    }

    #[test]
    fn backspace_at_origin_is_noop() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(&[0x08]);
        assert_eq!(fb.cursor(), CursorState { x: 0, y: 0, visible: true });
    }
}
