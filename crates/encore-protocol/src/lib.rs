//! Wire-level vocabulary for Encore.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity and domain types** ([`UserId`], [`MatchId`],
//!   [`SessionToken`], [`GameMode`], [`Mods`], [`Rank`], [`UserStats`]).
//! - **Packets** ([`PacketKind`], [`Packet`], payload structs) and the
//!   outbound [`ServerPacket`] enum with its view types.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payloads become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol crate is the leaf of the workspace. It knows nothing about
//! sessions, matches, or scores beyond their serializable shapes.
//!
//! ```text
//! Transport (bytes) → Protocol (Packet) → Session → Match / Scoring
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod packets;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use packets::{
    Action, AwayMessage, ChatMessage, CreateMatchRequest, JoinMatchRequest,
    MatchSettings, MatchSnapshot, MatchStatus, ModsRequest, Occupancy, Packet,
    PacketKind, PasswordRequest, PresenceView, ScoringType, ServerPacket,
    SlotRequest, SlotView, Status, Team, TeamMode, Toggle, UserDataView,
    UserIdList,
};
pub use types::{GameMode, MatchId, Mods, Rank, SessionToken, UserId, UserStats};
