//! HTTP body codec: messages travel base64 encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;

use fints_core::error::{FintsError, Result};

pub fn encode_body(message: &[u8]) -> String {
    STANDARD.encode(message)
}

/// Decode a response body. Line breaks inserted by some servers are ignored.
pub fn decode_body(body: &str) -> Result<Bytes> {
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map(Bytes::from)
        .map_err(|e| FintsError::Transport(format!("invalid base64 body: {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn body_round_trip_keeps_latin1_bytes() {
        let raw = b"HNHBS:1:1+1'\xfc";
        let body = encode_body(raw);
        assert_eq!(decode_body(&body).unwrap().as_ref(), raw);
    }

    #[test]
    fn wrapped_body_is_accepted() {
        let body = "SE5I\r\nQlM6\nMTox\nKzEn";
        assert_eq!(decode_body(body).unwrap().as_ref(), b"HNHBS:1:1+1'");
    }

    #[test]
    fn garbage_is_a_transport_error() {
        let err = decode_body("%%%").unwrap_err();
        assert_eq!(err.class().as_str(), "TRANSPORT");
    }
}
