//! The compression codec: four selectable modes, plus the padded framing
//! applied to replay snapshots (spec §4.2).
//!
//! `deflate` is intentionally not implemented here — it delegates entirely
//! to the transport's per-message-deflate WebSocket extension, so at the
//! codec layer it behaves exactly like `none` (see [`CompressionMode::encode`]).

mod smaz;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RelayError;

/// One of the four wire-level codecs announced in the `session`/`compression`
/// control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    None,
    Zstd,
    Smaz,
    Deflate,
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompressionMode::None => "none",
            CompressionMode::Zstd => "zstd",
            CompressionMode::Smaz => "smaz",
            CompressionMode::Deflate => "deflate",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for CompressionMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CompressionMode::None),
            "zstd" => Ok(CompressionMode::Zstd),
            "smaz" => Ok(CompressionMode::Smaz),
            "deflate" => Ok(CompressionMode::Deflate),
            other => Err(RelayError::InvalidConfig(format!("unknown compression mode {other:?}"))),
        }
    }
}

impl CompressionMode {
    /// Whether this mode enables the transport's own per-message-deflate
    /// extension instead of an application-level codec.
    pub fn uses_transport_deflate(self) -> bool {
        matches!(self, CompressionMode::Deflate)
    }

    /// Compress a payload for the runner->relay->viewer binary path. `none`
    /// and `deflate` both pass bytes through unchanged at this layer.
    pub fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            CompressionMode::None | CompressionMode::Deflate => data.to_vec(),
            CompressionMode::Zstd => zstd::encode_all(data, 0).unwrap_or_else(|_| data.to_vec()),
            CompressionMode::Smaz => smaz::compress(data),
        }
    }

    /// Decompress a payload produced by [`CompressionMode::compress`].
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, RelayError> {
        match self {
            CompressionMode::None | CompressionMode::Deflate => Ok(data.to_vec()),
            CompressionMode::Zstd => {
                zstd::decode_all(data).map_err(|e| RelayError::DecompressionFailed(e.to_string()))
            }
            CompressionMode::Smaz => {
                smaz::decompress(data).map_err(RelayError::DecompressionFailed)
            }
        }
    }
}

const PAD_MIN: usize = 16;
const PAD_MAX: usize = 128;

/// Wrap a compressed snapshot payload in the padded framing envelope:
/// `[u16 BE padLen][padLen random bytes][payload]`. Only used for snapshot
/// frames under `zstd`/`smaz`; live runner frames are never padded.
pub fn pad_frame(compressed: &[u8]) -> Vec<u8> {
    let mut rng = rand::rng();
    let pad_len = PAD_MIN + (rng.next_u32() as usize % (PAD_MAX - PAD_MIN));
    let mut padding = vec![0u8; pad_len];
    rng.fill_bytes(&mut padding);

    let mut framed = Vec::with_capacity(2 + pad_len + compressed.len());
    framed.extend_from_slice(&(pad_len as u16).to_be_bytes());
    framed.extend_from_slice(&padding);
    framed.extend_from_slice(compressed);
    framed
}

/// Strip the padded framing envelope, returning the compressed payload.
pub fn unpad_frame(framed: &[u8]) -> Result<&[u8], RelayError> {
    if framed.len() < 2 {
        return Err(RelayError::DecompressionFailed("frame shorter than pad length header".into()));
    }
    let pad_len = u16::from_be_bytes([framed[0], framed[1]]) as usize;
    let payload_start = 2 + pad_len;
    framed
        .get(payload_start..)
        .ok_or_else(|| RelayError::DecompressionFailed("frame shorter than declared padding".into()))
}

/// Build a complete snapshot frame for a given mode: compress, then pad if
/// the mode calls for application-level framing.
pub fn compress_for_replay(mode: CompressionMode, data: &[u8]) -> Vec<u8> {
    let compressed = mode.compress(data);
    match mode {
        CompressionMode::Zstd | CompressionMode::Smaz => pad_frame(&compressed),
        CompressionMode::None | CompressionMode::Deflate => compressed,
    }
}

/// Inverse of [`compress_for_replay`].
pub fn decompress_from_buffer(mode: CompressionMode, framed: &[u8]) -> Result<Vec<u8>, RelayError> {
    match mode {
        CompressionMode::Zstd | CompressionMode::Smaz => {
            let payload = unpad_frame(framed)?;
            mode.decompress(payload)
        }
        CompressionMode::None | CompressionMode::Deflate => mode.decompress(framed),
    }
}
