//! JSON framing for [`SignalingMessage`].
//!
//! Decoding looks at the `type` discriminator before anything else so callers can tell
//! a frame from a foreign vocabulary (keepalives, server diagnostics) apart from a
//! corrupt one. Neither is fatal to the signaling connection.

use super::messages::SignalingMessage;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unknown signaling message type: {0}")]
    UnknownType(String),

    #[error("malformed signaling frame: {0}")]
    Malformed(String),
}

/// Decode one signaling frame.
///
/// # Errors
/// Returns [`DecodeError::UnknownType`] when the `type` tag is not part of the
/// vocabulary, and [`DecodeError::Malformed`] when the frame is not a JSON object with
/// a string `type` or its fields do not match the tagged variant.
pub fn decode(bytes: &[u8]) -> Result<SignalingMessage, DecodeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|err| DecodeError::Malformed(err.to_string()))?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::Malformed("missing string `type` field".to_string()))?;

    if !SignalingMessage::TYPES.contains(&tag) {
        return Err(DecodeError::UnknownType(tag.to_string()));
    }

    serde_json::from_value(value).map_err(|err| DecodeError::Malformed(err.to_string()))
}

/// Encode a message as a single JSON text frame.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn encode(message: &SignalingMessage) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::IceCandidate;

    #[test]
    fn decodes_answer() {
        let msg = decode(br#"{"type":"answer","sdp":"v=0\r\n"}"#).unwrap();
        assert_eq!(msg, SignalingMessage::Answer { sdp: "v=0\r\n".to_string() });
    }

    #[test]
    fn decodes_remote_ice_candidate() {
        let frame = br#"{"type":"ice-candidate","candidate":{"candidate":"candidate:0 1 UDP 1 1.2.3.4 5 typ srflx","sdpMLineIndex":1,"sdpMid":"1"}}"#;
        let msg = decode(frame).unwrap();
        assert_eq!(
            msg,
            SignalingMessage::IceCandidate {
                candidate: IceCandidate::new("candidate:0 1 UDP 1 1.2.3.4 5 typ srflx", 1, "1"),
            }
        );
    }

    #[test]
    fn unknown_type_is_reported_as_such() {
        let err = decode(br#"{"type":"ping"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(tag) if tag == "ping"));
    }

    #[test]
    fn corrupt_frames_are_malformed() {
        assert!(matches!(decode(b"{not json").unwrap_err(), DecodeError::Malformed(_)));
        assert!(matches!(decode(br#"{"sdp":"v=0"}"#).unwrap_err(), DecodeError::Malformed(_)));
        assert!(matches!(decode(br#"{"type":7}"#).unwrap_err(), DecodeError::Malformed(_)));
        assert!(matches!(decode(br#"{"type":"offer"}"#).unwrap_err(), DecodeError::Malformed(_)));
    }

    #[test]
    fn encodes_prompt_with_exact_text() {
        let json = encode(&SignalingMessage::prompt("a watercolor city")).unwrap();
        assert_eq!(json, r#"{"type":"prompt","prompt":"a watercolor city"}"#);
    }
}
