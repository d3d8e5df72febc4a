//! Cell, color, and cursor primitives that make up a [`super::Framebuffer`] grid.

use bitflags::bitflags;

/// A cell color. `Default` is the terminal's ambient foreground/background;
/// `Indexed` covers the standard (0-7), bright (8-15), and 256-color (16-255)
/// palette, including 24-bit RGB already downsampled to the 6x6x6 cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Default,
    Indexed(u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

bitflags! {
    /// Boolean style flags recognized by SGR (see spec §4.1.2.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CellAttrs: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const BLINK         = 1 << 4;
        const INVERSE       = 1 << 5;
        const HIDDEN        = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

/// One display cell: a single character plus its rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::empty(),
        }
    }
}

/// Cursor position and visibility. `x`/`y` are always kept in-bounds by the
/// framebuffer except for the "phantom" column `cols` reached after writing
/// the last column of a row (see spec boundary behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub x: u16,
    pub y: u16,
    pub visible: bool,
}

impl Default for CursorState {
    fn default() -> Self {
        CursorState { x: 0, y: 0, visible: true }
    }
}

/// Cursor + attribute snapshot taken by `ESC 7` / `CSI s`, restored by
/// `ESC 8` / `CSI u`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedCursor {
    pub x: u16,
    pub y: u16,
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

/// Downsample a 24-bit RGB triple to the xterm 6x6x6 color cube index.
pub fn rgb_to_cube_index(r: u8, g: u8, b: u8) -> u8 {
    let r = u32::from(r) / 51;
    let g = u32::from(g) / 51;
    let b = u32::from(b) / 51;
    (16 + 36 * r + 6 * g + b) as u8
}
