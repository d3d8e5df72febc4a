//! Ground/escape/CSI/OSC byte-stream parser driving a [`super::Framebuffer`].
//!
//! This is a tagged-variant state machine, not a regex over a buffer: state
//! persists across [`super::Framebuffer::write`] calls so a sequence split
//! across two reads resumes correctly. A CSI or OSC sequence that runs past
//! 32 bytes without a terminator is treated as malformed and the parser
//! resyncs to ground rather than wedge indefinitely.

use super::cell::rgb_to_cube_index;
use super::{CellAttrs, Color, Framebuffer};

const MAX_SEQUENCE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ground,
    Escape,
    EscCharset,
    Csi,
    Osc,
    OscEscape,
}

/// Parser state retained between `write()` calls.
#[derive(Debug)]
pub struct ParserState {
    phase: Phase,
    csi_prefix: Option<u8>,
    csi_params: Vec<i64>,
    csi_current: Option<i64>,
    seq_len: usize,
    utf8_pending: Vec<u8>,
    utf8_need: usize,
}

impl Default for ParserState {
    fn default() -> Self {
        ParserState {
            phase: Phase::Ground,
            csi_prefix: None,
            csi_params: Vec::new(),
            csi_current: None,
            seq_len: 0,
            utf8_pending: Vec::new(),
            utf8_need: 0,
        }
    }
}

fn param(params: &[i64], idx: usize, default: i64) -> i64 {
    match params.get(idx) {
        Some(&v) if v != 0 => v,
        _ => default,
    }
}

pub fn feed(fb: &mut Framebuffer, bytes: &[u8]) {
    for &byte in bytes {
        feed_byte(fb, byte);
    }
}

fn feed_byte(fb: &mut Framebuffer, byte: u8) {
    if fb.parser.utf8_need > 0 {
        if (0x80..0xC0).contains(&byte) {
            fb.parser.utf8_pending.push(byte);
            fb.parser.utf8_need -= 1;
            if fb.parser.utf8_need == 0 {
                if let Ok(s) = std::str::from_utf8(&fb.parser.utf8_pending) {
                    if let Some(c) = s.chars().next() {
                        fb.put_char(c);
                    }
                }
                fb.parser.utf8_pending.clear();
            }
        } else {
            // Malformed continuation: drop what we had and reprocess this
            // byte fresh.
            fb.parser.utf8_pending.clear();
            fb.parser.utf8_need = 0;
            feed_byte(fb, byte);
        }
        return;
    }

    match fb.parser.phase {
        Phase::Ground => feed_ground(fb, byte),
        Phase::Escape => feed_escape(fb, byte),
        Phase::EscCharset => {
            fb.parser.phase = Phase::Ground;
        }
        Phase::Csi => feed_csi(fb, byte),
        Phase::Osc => feed_osc(fb, byte),
        Phase::OscEscape => {
            fb.parser.phase = Phase::Ground;
            if byte != b'\\' {
                feed_byte(fb, byte);
            }
        }
    }
}

fn feed_ground(fb: &mut Framebuffer, byte: u8) {
    match byte {
        0x1B => {
            fb.parser.phase = Phase::Escape;
            fb.parser.seq_len = 0;
        }
        0x08 => fb.backspace(),
        0x09 => fb.tab(),
        0x0A => fb.linefeed(),
        0x0D => fb.carriage_return(),
        0x00..=0x1F | 0x7F => { /* ignored C0 control (including BEL) */ }
        0x20..=0x7E => fb.put_char(byte as char),
        0xC0..=0xDF => start_utf8(fb, byte, 1),
        0xE0..=0xEF => start_utf8(fb, byte, 2),
        0xF0..=0xF7 => start_utf8(fb, byte, 3),
        _ => { /* stray continuation byte or invalid lead: ignore */ }
    }
}

fn start_utf8(fb: &mut Framebuffer, byte: u8, continuation_bytes: usize) {
    fb.parser.utf8_pending.clear();
    fb.parser.utf8_pending.push(byte);
    fb.parser.utf8_need = continuation_bytes;
}

fn feed_escape(fb: &mut Framebuffer, byte: u8) {
    match byte {
        b'[' => {
            fb.parser.phase = Phase::Csi;
            fb.parser.csi_prefix = None;
            fb.parser.csi_params.clear();
            fb.parser.csi_current = None;
            fb.parser.seq_len = 0;
        }
        b']' => {
            fb.parser.phase = Phase::Osc;
            fb.parser.seq_len = 0;
        }
        b'7' => {
            fb.save_cursor();
            fb.parser.phase = Phase::Ground;
        }
        b'8' => {
            fb.restore_cursor();
            fb.parser.phase = Phase::Ground;
        }
        b'D' => {
            fb.linefeed();
            fb.parser.phase = Phase::Ground;
        }
        b'E' => {
            fb.next_line();
            fb.parser.phase = Phase::Ground;
        }
        b'M' => {
            fb.reverse_index();
            fb.parser.phase = Phase::Ground;
        }
        b'c' => {
            fb.full_reset();
            fb.parser.phase = Phase::Ground;
        }
        b'(' | b')' => {
            fb.parser.phase = Phase::EscCharset;
        }
        _ => {
            fb.parser.phase = Phase::Ground;
        }
    }
}

fn feed_csi(fb: &mut Framebuffer, byte: u8) {
    fb.parser.seq_len += 1;
    if fb.parser.seq_len > MAX_SEQUENCE_LEN {
        fb.parser.phase = Phase::Ground;
        return;
    }
    match byte {
        b'0'..=b'9' => {
            let digit = i64::from(byte - b'0');
            fb.parser.csi_current = Some(fb.parser.csi_current.unwrap_or(0) * 10 + digit);
        }
        b';' => {
            fb.parser.csi_params.push(fb.parser.csi_current.take().unwrap_or(0));
        }
        b'?' | b'!' | b'>' => {
            if fb.parser.csi_prefix.is_none() {
                fb.parser.csi_prefix = Some(byte);
            }
        }
        0x20..=0x2F => { /* intermediate byte; no CSI final in our table uses one */ }
        0x40..=0x7E => {
            if let Some(v) = fb.parser.csi_current.take() {
                fb.parser.csi_params.push(v);
            }
            let prefix = fb.parser.csi_prefix.take();
            let params = std::mem::take(&mut fb.parser.csi_params);
            fb.parser.phase = Phase::Ground;
            dispatch_csi(fb, prefix, &params, byte as char);
        }
        _ => {}
    }
}

fn feed_osc(fb: &mut Framebuffer, byte: u8) {
    fb.parser.seq_len += 1;
    if byte == 0x07 {
        fb.parser.phase = Phase::Ground;
        return;
    }
    if byte == 0x1B {
        fb.parser.phase = Phase::OscEscape;
        return;
    }
    if fb.parser.seq_len > MAX_SEQUENCE_LEN * 8 {
        // OSC payloads (titles, hyperlinks) are legitimately longer than a
        // CSI sequence; use a looser bound before resyncing.
        fb.parser.phase = Phase::Ground;
    }
}

fn dispatch_csi(fb: &mut Framebuffer, prefix: Option<u8>, params: &[i64], action: char) {
    if prefix == Some(b'?') {
        dec_private_mode(fb, params, action);
        return;
    }
    match action {
        'A' => fb.cursor_up(param(params, 0, 1) as u16),
        'B' => fb.cursor_down(param(params, 0, 1) as u16),
        'C' => fb.cursor_forward(param(params, 0, 1) as u16),
        'D' => fb.cursor_backward(param(params, 0, 1) as u16),
        'E' => {
            fb.carriage_return();
            fb.cursor_down(param(params, 0, 1) as u16);
        }
        'F' => {
            fb.carriage_return();
            fb.cursor_up(param(params, 0, 1) as u16);
        }
        'G' => {
            let x = (param(params, 0, 1) - 1).max(0) as u16;
            fb.cursor.x = x.min(fb.cols.saturating_sub(1));
        }
        'd' => {
            let y = (param(params, 0, 1) - 1).max(0) as u16;
            fb.cursor.y = y.min(fb.rows.saturating_sub(1));
        }
        'H' | 'f' => {
            let row = (param(params, 0, 1) - 1).max(0) as u16;
            let col = (param(params, 1, 1) - 1).max(0) as u16;
            fb.cursor.y = row.min(fb.rows.saturating_sub(1));
            fb.cursor.x = col.min(fb.cols.saturating_sub(1));
        }
        'J' => fb.erase_display(param(params, 0, 0)),
        'K' => fb.erase_line(param(params, 0, 0)),
        'L' => fb.insert_lines(param(params, 0, 1) as u16),
        'M' => fb.delete_lines(param(params, 0, 1) as u16),
        '@' => fb.insert_chars(param(params, 0, 1) as u16),
        'P' => fb.delete_chars(param(params, 0, 1) as u16),
        'X' => fb.erase_chars(param(params, 0, 1) as u16),
        'm' => apply_sgr(fb, params),
        'r' => {
            let top = param(params, 0, 1) - 1;
            let bottom = param(params, 1, i64::from(fb.rows)) - 1;
            fb.set_scroll_region(top, bottom);
        }
        's' => fb.save_cursor(),
        'u' => fb.restore_cursor(),
        // status/device/mode reports are not forwarded anywhere in this
        // relay; ignored per spec §4.1.2.
        'n' | 'c' | 'h' | 'l' => {}
        _ => {}
    }
}

fn dec_private_mode(fb: &mut Framebuffer, params: &[i64], action: char) {
    let set = match action {
        'h' => true,
        'l' => false,
        _ => return,
    };
    for &code in params {
        match code {
            25 => fb.cursor.visible = set,
            1049 => {
                if set {
                    fb.enter_alt_screen();
                } else {
                    fb.leave_alt_screen();
                }
            }
            1 | 7 | 12 | 47 | 1047 | 1048 | 2004 => { /* accepted, no-op */ }
            _ => {}
        }
    }
}

fn apply_sgr(fb: &mut Framebuffer, params: &[i64]) {
    if params.is_empty() {
        fb.cur_attrs = CellAttrs::empty();
        fb.cur_fg = Color::Default;
        fb.cur_bg = Color::Default;
        return;
    }
    let mut i = 0;
    while i < params.len() {
        let code = params[i];
        match code {
            0 => {
                fb.cur_attrs = CellAttrs::empty();
                fb.cur_fg = Color::Default;
                fb.cur_bg = Color::Default;
            }
            1 => fb.cur_attrs.insert(CellAttrs::BOLD),
            2 => fb.cur_attrs.insert(CellAttrs::DIM),
            3 => fb.cur_attrs.insert(CellAttrs::ITALIC),
            4 => fb.cur_attrs.insert(CellAttrs::UNDERLINE),
            5 => fb.cur_attrs.insert(CellAttrs::BLINK),
            7 => fb.cur_attrs.insert(CellAttrs::INVERSE),
            8 => fb.cur_attrs.insert(CellAttrs::HIDDEN),
            9 => fb.cur_attrs.insert(CellAttrs::STRIKETHROUGH),
            22 => fb.cur_attrs.remove(CellAttrs::BOLD | CellAttrs::DIM),
            23 => fb.cur_attrs.remove(CellAttrs::ITALIC),
            24 => fb.cur_attrs.remove(CellAttrs::UNDERLINE),
            25 => fb.cur_attrs.remove(CellAttrs::BLINK),
            27 => fb.cur_attrs.remove(CellAttrs::INVERSE),
            28 => fb.cur_attrs.remove(CellAttrs::HIDDEN),
            29 => fb.cur_attrs.remove(CellAttrs::STRIKETHROUGH),
            30..=37 => fb.cur_fg = Color::Indexed((code - 30) as u8),
            38 => {
                if let Some(skip) = extended_color(params, i) {
                    fb.cur_fg = skip.0;
                    i = skip.1;
                    continue;
                }
            }
            39 => fb.cur_fg = Color::Default,
            40..=47 => fb.cur_bg = Color::Indexed((code - 40) as u8),
            48 => {
                if let Some(skip) = extended_color(params, i) {
                    fb.cur_bg = skip.0;
                    i = skip.1;
                    continue;
                }
            }
            49 => fb.cur_bg = Color::Default,
            90..=97 => fb.cur_fg = Color::Indexed((code - 90 + 8) as u8),
            100..=107 => fb.cur_bg = Color::Indexed((code - 100 + 8) as u8),
            _ => {}
        }
        i += 1;
    }
}

/// Parses the `38`/`48` extended color sub-forms starting at `params[i]`
/// (which is the `38`/`48` itself). Returns the resolved color and the next
/// index to continue the outer loop from.
fn extended_color(params: &[i64], i: usize) -> Option<(Color, usize)> {
    match params.get(i + 1) {
        Some(5) => {
            let idx = *params.get(i + 2)? as u8;
            Some((Color::Indexed(idx), i + 3))
        }
        Some(2) => {
            let r = *params.get(i + 2)? as u8;
            let g = *params.get(i + 3)? as u8;
            let b = *params.get(i + 4)? as u8;
            Some((Color::Indexed(rgb_to_cube_index(r, g, b)), i + 5))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::CursorState;

    #[test]
    fn sgr_bold_red_text_then_reset() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"\x1b[1;31mHi\x1b[0m!");
        assert_eq!(fb.cell(0, 0).ch, 'H');
        assert!(fb.cell(0, 0).attrs.contains(CellAttrs::BOLD));
        assert_eq!(fb.cell(0, 0).fg, Color::Indexed(1));
        assert_eq!(fb.cell(1, 0).ch, 'i');
        assert_eq!(fb.cell(2, 0).ch, '!');
        assert_eq!(fb.cell(2, 0).fg, Color::Default);
        assert_eq!(fb.cursor(), CursorState { x: 3, y: 0, visible: true });
    }

    #[test]
    fn wraps_after_last_column() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(&vec![b'X'; 82]);
        assert_eq!(fb.cell(79, 0).ch, 'X');
        assert_eq!(fb.cell(0, 1).ch, 'X');
        assert_eq!(fb.cell(1, 1).ch, 'X');
        assert_eq!(fb.cursor(), CursorState { x: 2, y: 1, visible: true });
    }

    #[test]
    fn thirty_linefeeds_scroll_to_blank_screen() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(&vec![b'\n'; 30]);
        assert_eq!(fb.cursor().y, 23);
        for y in 0..24 {
            for x in 0..80 {
                assert_eq!(fb.cell(x, y), Cell::default());
            }
        }
    }

    #[test]
    fn alt_screen_round_trip_restores_primary_and_cursor() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"before");
        let cursor_before = fb.cursor();
        fb.write(b"\x1b[?1049h");
        fb.write(b"foo");
        fb.write(b"\x1b[?1049l");
        assert_eq!(fb.cell(0, 0).ch, 'b');
        assert_eq!(fb.cursor(), cursor_before);
    }

    #[test]
    fn csi_0j_at_origin_clears_whole_screen() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"hello world, this spans the row");
        fb.write(b"\x1b[H\x1b[0J");
        for x in 0..80u16 {
            assert_eq!(fb.cell(x, 0), Cell::default());
        }
    }

    #[test]
    fn csi_0j_at_bottom_right_clears_only_that_cell() {
        let mut fb = Framebuffer::new(4, 2);
        fb.write(b"abcdefgh");
        fb.write(b"\x1b[2;4H\x1b[0J");
        assert_eq!(fb.cell(3, 1), Cell::default());
        assert_eq!(fb.cell(2, 1).ch, 'g');
    }

    #[test]
    fn save_restore_cursor_round_trips() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"\x1b[5;5H\x1b[1;32m\x1b7");
        fb.write(b"\x1b[10;10H\x1b[0m");
        fb.write(b"\x1b8");
        assert_eq!(fb.cursor(), CursorState { x: 4, y: 4, visible: true });
        assert!(fb.cur_attrs.contains(CellAttrs::BOLD));
        assert_eq!(fb.cur_fg, Color::Indexed(2));
    }

    #[test]
    fn scroll_region_out_of_range_clamps() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"\x1b[5;999r");
        assert_eq!(fb.scroll_top, 4);
        assert_eq!(fb.scroll_bottom, 23);
    }

    #[test]
    fn split_escape_sequence_across_writes() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write(b"\x1b[1");
        fb.write(b";31mHi");
        assert_eq!(fb.cell(0, 0).ch, 'H');
        assert!(fb.cell(0, 0).attrs.contains(CellAttrs::BOLD));
    }

    #[test]
    fn utf8_multibyte_char_written_as_one_cell() {
        let mut fb = Framebuffer::new(80, 24);
        fb.write("héllo".as_bytes());
        assert_eq!(fb.cell(0, 0).ch, 'h');
        assert_eq!(fb.cell(1, 0).ch, 'é');
        assert_eq!(fb.cell(2, 0).ch, 'l');
    }

    #[test]
    fn malformed_csi_over_32_bytes_resyncs_without_wedging() {
        let mut fb = Framebuffer::new(80, 24);
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat(b'5').take(40));
        fb.write(&bytes);
        fb.write(b"A");
        assert_eq!(fb.cell(0, 0).ch, 'A');
    }
}
