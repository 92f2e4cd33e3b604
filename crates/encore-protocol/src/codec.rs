//! Codec trait and implementations for packet payloads.
//!
//! The server never inspects raw payload bytes itself: handlers ask the
//! configured [`Codec`] to turn bytes into a payload struct and outbound
//! [`ServerPacket`](crate::ServerPacket)s back into bytes. Swapping the
//! byte layout means swapping the codec, nothing else.
//!
//! [`JsonCodec`] is the default (readable in logs, easy to fake in tests).

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// request task through the server state.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// truncated, or don't match the expected payload shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use encore_protocol::{Codec, JoinMatchRequest, JsonCodec, MatchId};
///
/// let codec = JsonCodec;
/// let request = JoinMatchRequest { match_id: MatchId(3), password: None };
///
/// let bytes = codec.encode(&request).unwrap();
/// let decoded: JoinMatchRequest = codec.decode(&bytes).unwrap();
/// assert_eq!(request, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ChatMessage, ServerPacket, Toggle, UserId};

    #[test]
    fn test_json_codec_decode_truncated_bytes_fails() {
        let codec = JsonCodec;
        let bytes = codec.encode(&Toggle { enabled: true }).unwrap();

        let result: Result<Toggle, _> = codec.decode(&bytes[..bytes.len() - 1]);

        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_decode_wrong_shape_fails() {
        let codec = JsonCodec;
        let result: Result<ChatMessage, _> = codec.decode(br#"{"enabled":true}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_server_packet_survives_encoding() {
        let codec = JsonCodec;
        let packet = ServerPacket::UserLogout { user_id: UserId(9) };

        let bytes = codec.encode(&packet).unwrap();
        let decoded: ServerPacket = codec.decode(&bytes).unwrap();

        assert_eq!(decoded, packet);
    }
}
