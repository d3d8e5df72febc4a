//! A small dictionary coder ("smaz") tuned for short ASCII bursts — the
//! kind of keystroke-granularity traffic a terminal session produces.
//!
//! Encoding is a sequence of tokens:
//! - byte `0..=COOKBOOK_LEN-1`: index into [`CODEBOOK`], expands to that entry
//! - byte `254`: verbatim run, followed by a length byte, followed by that
//!   many raw bytes
//! - byte `255`: single verbatim byte follows
//!
//! The codebook below is sized to stay well under the 254-entry byte-space
//! reserved for table lookups (bytes 254/255 are the escapes); it favors
//! fragments common in shell prompts and command output rather than
//! English prose.

const VERBATIM_RUN: u8 = 254;
const VERBATIM_ONE: u8 = 255;
const MAX_VERBATIM_RUN: usize = 255;

#[rustfmt::skip]
const CODEBOOK: &[&str] = &[
    " ", "e", "t", "a", "o", "i", "n", "s", "h", "r", "d", "l", "u", "c", "m", "w",
    "f", "g", "y", "p", "b", ".", ",", "\n", "\r\n", "\t", "-", "_", "/", "=", ":", "0",
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "the", " the", "the ", "and", " and", "to ", " to",
    "of ", " of", "in ", " in", "is ", " is", "it ", " it", "you", " you", "that", " that", "for ", " for",
    "on ", " on", "with", " with", "this", " this", "error", "Error", "warning", "Warning", "null", "true", "false",
    "function", "return", "const", "let ", "var ", "import", "export", "class ", "public", "private",
    "$ ", "# ", "==", "!=", "=>", "->", "::", "//", "/*", "*/", "http://", "https://",
    "\x1b[", "\x1b[0m", "\x1b[1m", "\x1b[2m", "\x1b[3m", "\x1b[4m", "\x1b[m",
    "root@", "user@", "localhost", "~/", "$ ", "% ", "> ", "\x1b[32m", "\x1b[31m", "\x1b[33m",
    "command not found", "No such file or directory", "Permission denied", "cd ", "ls ", "git ",
    "npm ", "cargo ", "make", "exit", "done", "ok", "OK", "fail", "FAIL", "passed", "failed",
];

fn build_codebook_bytes() -> Vec<&'static [u8]> {
    CODEBOOK.iter().map(|s| s.as_bytes()).collect()
}

/// Greedy longest-match compression against [`CODEBOOK`], falling back to
/// verbatim runs for anything the codebook can't represent.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let book = build_codebook_bytes();
    let max_entry_len = book.iter().map(|e| e.len()).max().unwrap_or(1);

    let mut out = Vec::with_capacity(data.len());
    let mut literal_start: Option<usize> = None;
    let mut i = 0;

    let flush_literal = |out: &mut Vec<u8>, start: usize, end: usize, data: &[u8]| {
        let mut pos = start;
        while pos < end {
            let chunk_end = (pos + MAX_VERBATIM_RUN).min(end);
            let len = chunk_end - pos;
            if len == 1 {
                out.push(VERBATIM_ONE);
                out.push(data[pos]);
            } else {
                out.push(VERBATIM_RUN);
                out.push(len as u8);
                out.extend_from_slice(&data[pos..chunk_end]);
            }
            pos = chunk_end;
        }
    };

    while i < data.len() {
        let mut matched = None;
        for len in (1..=max_entry_len.min(data.len() - i)).rev() {
            if let Some(idx) = book.iter().position(|e| e.len() == len && *e == &data[i..i + len]) {
                matched = Some((idx, len));
                break;
            }
        }
        match matched {
            Some((idx, len)) => {
                if let Some(start) = literal_start.take() {
                    flush_literal(&mut out, start, i, data);
                }
                out.push(idx as u8);
                i += len;
            }
            None => {
                if literal_start.is_none() {
                    literal_start = Some(i);
                }
                i += 1;
            }
        }
    }
    if let Some(start) = literal_start.take() {
        flush_literal(&mut out, start, data.len(), data);
    }
    out
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, String> {
    let book = build_codebook_bytes();
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            VERBATIM_RUN => {
                let len = *data.get(i + 1).ok_or("truncated verbatim run length")? as usize;
                let start = i + 2;
                let end = start + len;
                let chunk = data.get(start..end).ok_or("truncated verbatim run body")?;
                out.extend_from_slice(chunk);
                i = end;
            }
            VERBATIM_ONE => {
                let byte = *data.get(i + 1).ok_or("truncated verbatim byte")?;
                out.push(byte);
                i += 2;
            }
            idx => {
                let entry = book.get(idx as usize).ok_or("codebook index out of range")?;
                out.extend_from_slice(entry);
                i += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_plain_ascii() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let compressed = compress(data);
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrips_shell_prompt_fragment() {
        let data = b"root@localhost:~/project$ cargo build\r\nerror: could not compile";
        let compressed = compress(data);
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrips_ansi_escape_heavy_text() {
        let data = b"\x1b[1m\x1b[32mok\x1b[0m \x1b[31mfailed\x1b[0m";
        let compressed = compress(data);
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrips_empty_input() {
        assert!(compress(b"").is_empty());
        assert_eq!(decompress(&[]).unwrap(), b"");
    }

    #[test]
    fn roundtrips_non_ascii_bytes_via_verbatim_escape() {
        let data: Vec<u8> = vec![0xFF_u8.wrapping_sub(1), 0x00, 0x01, 0x80, 0x90];
        let compressed = compress(&data);
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn long_literal_run_splits_across_255_byte_chunks() {
        let data = vec![7u8; 600];
        let compressed = compress(&data);
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, data);
    }
}
