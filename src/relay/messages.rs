//! JSON control message shapes exchanged over text WebSocket frames (spec
//! §6). Defined as one sum type over the five known shapes; unknown `type`
//! tags fail to deserialize and are treated as a no-op by the caller —
//! forwarding of the raw text still proceeds (spec §7, Protocol errors).

use serde::{Deserialize, Serialize};

use crate::codec::CompressionMode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Session { id: String, compression: CompressionMode },
    Resize { cols: u16, rows: u16 },
    Exit { code: i32 },
    Compression { mode: CompressionMode },
    Ready,
}

/// Best-effort parse: malformed JSON or an unrecognized `type` yields `None`
/// rather than an error, matching spec §7's "ignored" protocol-error class.
pub fn try_parse(text: &str) -> Option<ControlMessage> {
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resize() {
        let msg = try_parse(r#"{"type":"resize","cols":100,"rows":40}"#).unwrap();
        assert_eq!(msg, ControlMessage::Resize { cols: 100, rows: 40 });
    }

    #[test]
    fn parses_exit() {
        let msg = try_parse(r#"{"type":"exit","code":0}"#).unwrap();
        assert_eq!(msg, ControlMessage::Exit { code: 0 });
    }

    #[test]
    fn unknown_type_tag_is_ignored() {
        assert!(try_parse(r#"{"type":"ping"}"#).is_none());
    }

    #[test]
    fn malformed_json_is_ignored() {
        assert!(try_parse("not json").is_none());
    }

    #[test]
    fn session_message_serializes_with_expected_shape() {
        let msg = ControlMessage::Session { id: "a-b-c".into(), compression: CompressionMode::Zstd };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"session","id":"a-b-c","compression":"zstd"}"#);
    }
}
