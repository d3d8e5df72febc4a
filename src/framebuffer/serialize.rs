//! Turns a [`super::Framebuffer`]'s current state into a self-contained
//! escape-sequence stream (see spec §4.1.4). Applying the output to a fresh
//! emulator reproduces the grid, cursor position, and cursor visibility.

use super::cell::{CellAttrs, Color};
use super::Framebuffer;

fn sgr_params(attrs: CellAttrs, fg: Color, bg: Color) -> Vec<u16> {
    let mut params = Vec::new();
    if attrs.contains(CellAttrs::BOLD) {
        params.push(1);
    }
    if attrs.contains(CellAttrs::DIM) {
        params.push(2);
    }
    if attrs.contains(CellAttrs::ITALIC) {
        params.push(3);
    }
    if attrs.contains(CellAttrs::UNDERLINE) {
        params.push(4);
    }
    if attrs.contains(CellAttrs::BLINK) {
        params.push(5);
    }
    if attrs.contains(CellAttrs::INVERSE) {
        params.push(7);
    }
    if attrs.contains(CellAttrs::HIDDEN) {
        params.push(8);
    }
    if attrs.contains(CellAttrs::STRIKETHROUGH) {
        params.push(9);
    }
    match fg {
        Color::Default => {}
        Color::Indexed(i) if i < 8 => params.push(30 + u16::from(i)),
        Color::Indexed(i) if i < 16 => params.push(90 + u16::from(i - 8)),
        Color::Indexed(i) => params.extend([38, 5, u16::from(i)]),
    }
    match bg {
        Color::Default => {}
        Color::Indexed(i) if i < 8 => params.push(40 + u16::from(i)),
        Color::Indexed(i) if i < 16 => params.push(100 + u16::from(i - 8)),
        Color::Indexed(i) => params.extend([48, 5, u16::from(i)]),
    }
    params
}

pub fn serialize(fb: &Framebuffer) -> String {
    let mut out = String::with_capacity(fb.rows as usize * fb.cols as usize * 8 + 64);
    out.push_str("\x1b[0m\x1b[2J\x1b[H");

    let mut last = (CellAttrs::empty(), Color::Default, Color::Default);
    for y in 0..fb.rows {
        out.push_str(&format!("\x1b[{};1H", y + 1));
        for x in 0..fb.cols {
            let cell = fb.cell(x, y);
            let key = (cell.attrs, cell.fg, cell.bg);
            if key != last {
                out.push_str("\x1b[0");
                for p in sgr_params(cell.attrs, cell.fg, cell.bg) {
                    out.push(';');
                    out.push_str(&p.to_string());
                }
                out.push('m');
                last = key;
            }
            out.push(cell.ch);
        }
    }

    out.push_str("\x1b[0m");
    let cursor = fb.cursor();
    let cx = cursor.x.min(fb.cols.saturating_sub(1));
    let cy = cursor.y.min(fb.rows.saturating_sub(1));
    out.push_str(&format!("\x1b[{};{}H", cy + 1, cx + 1));
    if !cursor.visible {
        out.push_str("\x1b[?25l");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::Framebuffer;

    #[test]
    fn serialize_then_replay_round_trips() {
        let mut fb = Framebuffer::new(20, 5);
        fb.write(b"\x1b[1;32mhello\x1b[0m world\r\n\x1b[3;3H!");
        let first = fb.serialize();

        let mut replay = Framebuffer::new(20, 5);
        replay.write(first.as_bytes());
        let second = replay.serialize();

        assert_eq!(first, second);
        assert_eq!(replay.cursor(), fb.cursor());
        for y in 0..5u16 {
            for x in 0..20u16 {
                assert_eq!(replay.cell(x, y), fb.cell(x, y));
            }
        }
    }

    #[test]
    fn phantom_column_cursor_round_trips_byte_identical() {
        let mut fb = Framebuffer::new(5, 2);
        fb.write(b"abcde"); // cursor now sits at the phantom column (x == cols)
        let first = fb.serialize();

        let mut replay = Framebuffer::new(5, 2);
        replay.write(first.as_bytes());
        let second = replay.serialize();

        assert_eq!(first, second);
        assert!(first.contains("\x1b[1;5H"));
    }

    #[test]
    fn serialize_hidden_cursor_emits_dectcem_reset() {
        let mut fb = Framebuffer::new(10, 2);
        fb.write(b"\x1b[?25l");
        let out = fb.serialize();
        assert!(out.ends_with("\x1b[?25l"));
    }
}
