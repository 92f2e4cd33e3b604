//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means a payload couldn't be turned into (or
//! out of) bytes. Session, match, and scoring failures live in their own
//! crates.

/// Errors that can occur while encoding or decoding packet payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, missing fields, or a
    /// payload of the wrong shape for its packet kind.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The numeric packet tag isn't one the server understands.
    #[error("unknown packet tag {0}")]
    UnknownPacket(u16),

    /// The payload decoded but violates a protocol rule (e.g. an
    /// out-of-range slot index).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
