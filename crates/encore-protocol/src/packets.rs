//! Packet kinds, inbound packets, payloads, and outbound server packets.
//!
//! The client speaks a tagged-packet protocol: every message carries a
//! numeric type tag followed by a payload. This module defines:
//!
//! - [`PacketKind`]: the type tags the server understands.
//! - [`Packet`]: one inbound message (tag + encoded payload bytes).
//! - Payload structs: what handlers decode out of a packet's bytes.
//! - View structs ([`PresenceView`], [`UserDataView`], [`MatchSnapshot`]):
//!   the broadcastable projections of server-side state.
//! - [`ServerPacket`]: everything the server can push into a session's
//!   outbound queue.
//!
//! The exact byte layout is the codec's business; these are the shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Codec, GameMode, MatchId, Mods, ProtocolError, Rank, UserId};

// ---------------------------------------------------------------------------
// PacketKind
// ---------------------------------------------------------------------------

/// The type tag of an inbound client packet.
///
/// Discriminants match the numeric ids the client sends, so
/// [`PacketKind::from_id`] is a direct lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PacketKind {
    ChangeAction = 0,
    SendPublicMessage = 1,
    Logout = 2,
    RequestStatusUpdate = 3,
    Ping = 4,
    SendPrivateMessage = 25,
    CreateMatch = 31,
    JoinMatch = 32,
    PartMatch = 33,
    MatchChangeSlot = 38,
    MatchReady = 39,
    MatchLock = 40,
    MatchChangeSettings = 41,
    MatchStart = 44,
    MatchComplete = 49,
    MatchChangeMods = 51,
    MatchLoadComplete = 52,
    MatchNoBeatmap = 54,
    MatchNotReady = 55,
    MatchFailed = 56,
    MatchHasBeatmap = 59,
    MatchSkipRequest = 60,
    MatchTransferHost = 70,
    MatchChangeTeam = 77,
    SetAwayMessage = 82,
    UserStatsRequest = 85,
    MatchAbort = 88,
    MatchChangePassword = 90,
    UserPresenceRequest = 97,
    UserPresenceRequestAll = 98,
    ToggleBlockNonFriendDms = 99,
}

impl PacketKind {
    /// Every kind the server understands.
    pub const KNOWN: [PacketKind; 31] = [
        Self::ChangeAction,
        Self::SendPublicMessage,
        Self::Logout,
        Self::RequestStatusUpdate,
        Self::Ping,
        Self::SendPrivateMessage,
        Self::CreateMatch,
        Self::JoinMatch,
        Self::PartMatch,
        Self::MatchChangeSlot,
        Self::MatchReady,
        Self::MatchLock,
        Self::MatchChangeSettings,
        Self::MatchStart,
        Self::MatchComplete,
        Self::MatchChangeMods,
        Self::MatchLoadComplete,
        Self::MatchNoBeatmap,
        Self::MatchNotReady,
        Self::MatchFailed,
        Self::MatchHasBeatmap,
        Self::MatchSkipRequest,
        Self::MatchTransferHost,
        Self::MatchChangeTeam,
        Self::SetAwayMessage,
        Self::UserStatsRequest,
        Self::MatchAbort,
        Self::MatchChangePassword,
        Self::UserPresenceRequest,
        Self::UserPresenceRequestAll,
        Self::ToggleBlockNonFriendDms,
    ];

    /// Resolves a numeric tag. Tags the server doesn't handle yield `None`.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::KNOWN.iter().copied().find(|kind| kind.id() == id)
    }

    /// The numeric tag sent by the client.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// `true` for packets that only make sense inside a match.
    pub fn is_match_scoped(self) -> bool {
        matches!(
            self,
            Self::PartMatch
                | Self::MatchChangeSlot
                | Self::MatchReady
                | Self::MatchLock
                | Self::MatchChangeSettings
                | Self::MatchStart
                | Self::MatchComplete
                | Self::MatchChangeMods
                | Self::MatchLoadComplete
                | Self::MatchNoBeatmap
                | Self::MatchNotReady
                | Self::MatchFailed
                | Self::MatchHasBeatmap
                | Self::MatchSkipRequest
                | Self::MatchTransferHost
                | Self::MatchChangeTeam
                | Self::MatchAbort
                | Self::MatchChangePassword
        )
    }
}

// ---------------------------------------------------------------------------
// Packet (inbound)
// ---------------------------------------------------------------------------

/// One inbound client message: a type tag plus its encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A packet with no payload (ping, logout, part match, ...).
    pub fn empty(kind: PacketKind) -> Self {
        Self {
            kind,
            payload: Vec::new(),
        }
    }

    /// Builds a packet from the numeric tag and payload the transport
    /// read off the wire.
    ///
    /// # Errors
    /// Returns `ProtocolError::UnknownPacket` for tags the server doesn't
    /// handle.
    pub fn from_wire(tag: u16, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        let kind = PacketKind::from_id(tag).ok_or(ProtocolError::UnknownPacket(tag))?;
        Ok(Self { kind, payload })
    }

    /// Encodes `value` with `codec` and wraps it in a packet.
    pub fn encode<C: Codec, T: Serialize>(
        codec: &C,
        kind: PacketKind,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind,
            payload: codec.encode(value)?,
        })
    }

    /// Decodes this packet's payload as `T`.
    pub fn decode<C: Codec, T: DeserializeOwned>(
        &self,
        codec: &C,
    ) -> Result<T, ProtocolError> {
        codec.decode(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// Status / presence payloads
// ---------------------------------------------------------------------------

/// What a player is currently doing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Action {
    #[default]
    Idle,
    Afk,
    Playing,
    Editing,
    Modding,
    Multiplayer,
    Watching,
    Testing,
    Submitting,
    Paused,
    Lobby,
    Multiplaying,
    Direct,
}

/// A player's status line, sent with `ChangeAction` and echoed in
/// [`UserDataView`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub action: Action,
    #[serde(default)]
    pub info_text: String,
    #[serde(default)]
    pub beatmap_checksum: String,
    #[serde(default)]
    pub beatmap_id: i32,
    #[serde(default)]
    pub mods: Mods,
    #[serde(default)]
    pub mode: GameMode,
}

/// A list of user ids (presence and stats requests).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserIdList {
    pub ids: Vec<UserId>,
}

/// The payload of `SetAwayMessage`. Empty or missing text clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AwayMessage {
    pub text: Option<String>,
}

/// The payload of `ToggleBlockNonFriendDms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
}

/// A chat message. Inbound, only `target` and `text` are meaningful; the
/// server fills the sender fields before relaying.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub sender_id: UserId,
    /// A channel (`#osu`, `#multiplayer`) or a username for private
    /// messages.
    pub target: String,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Multiplayer payloads
// ---------------------------------------------------------------------------

/// How players are grouped in a match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum TeamMode {
    #[default]
    HeadToHead,
    TagCoop,
    TeamVs,
    TagTeamVs,
}

impl TeamMode {
    /// `true` for the two team-based modes.
    pub fn is_team_based(self) -> bool {
        matches!(self, Self::TeamVs | Self::TagTeamVs)
    }
}

/// The win condition of a match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum ScoringType {
    #[default]
    Score,
    Accuracy,
    Combo,
    ScoreV2,
}

/// A slot's team assignment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Team {
    #[default]
    Neutral,
    Blue,
    Red,
}

/// Whether a slot can take a player.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum Occupancy {
    #[default]
    Free,
    Locked,
    Occupied,
}

/// The overall status of a match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub enum MatchStatus {
    #[default]
    Idle,
    Playing,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Playing => write!(f, "Playing"),
        }
    }
}

/// Host-controlled match settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchSettings {
    pub name: String,
    #[serde(default)]
    pub beatmap_name: String,
    #[serde(default)]
    pub beatmap_id: i32,
    #[serde(default)]
    pub beatmap_checksum: String,
    #[serde(default)]
    pub mode: GameMode,
    #[serde(default)]
    pub team_mode: TeamMode,
    #[serde(default)]
    pub scoring: ScoringType,
    #[serde(default)]
    pub free_mods: bool,
}

/// The payload of `CreateMatch`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreateMatchRequest {
    pub settings: MatchSettings,
    #[serde(default)]
    pub password: Option<String>,
}

/// The payload of `JoinMatch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinMatchRequest {
    pub match_id: MatchId,
    #[serde(default)]
    pub password: Option<String>,
}

/// A slot index (change slot, lock, transfer host).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub slot: usize,
}

/// The payload of `MatchChangeMods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModsRequest {
    pub mods: Mods,
}

/// The payload of `MatchChangePassword`. `None` or empty clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PasswordRequest {
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Views (outbound projections)
// ---------------------------------------------------------------------------

/// The presence card other players see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceView {
    pub user_id: UserId,
    pub username: String,
    pub utc_offset: i8,
    pub country: u8,
    pub privileges: Rank,
    pub mode: GameMode,
    pub latitude: f32,
    pub longitude: f32,
    pub global_rank: u32,
}

/// Statistics for the player's current mode, shown to self and
/// spectators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDataView {
    pub user_id: UserId,
    pub status: Status,
    pub ranked_score: u64,
    /// Fraction in `0.0..=1.0` (the client multiplies by 100).
    pub accuracy: f32,
    pub play_count: u32,
    pub total_score: u64,
    pub global_rank: u32,
    pub performance: u32,
}

/// One slot as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub occupancy: Occupancy,
    pub user_id: Option<UserId>,
    pub ready: bool,
    pub has_beatmap: bool,
    pub team: Team,
    pub mods: Mods,
    pub playing: bool,
    pub completed: bool,
}

/// A broadcastable copy of a match. The password never leaves the
/// server; clients only learn whether one is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: MatchId,
    pub host: UserId,
    pub has_password: bool,
    pub status: MatchStatus,
    pub settings: MatchSettings,
    pub mods: Mods,
    pub slots: Vec<SlotView>,
    /// The match's modification counter when the snapshot was taken.
    pub seq: u64,
}

// ---------------------------------------------------------------------------
// ServerPacket (outbound)
// ---------------------------------------------------------------------------

/// Everything the server can push into a session's outbound queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerPacket {
    LoginReply { user_id: UserId },
    Notification { text: String },
    Pong,
    Presence(PresenceView),
    UserData(UserDataView),
    UserLogout { user_id: UserId },
    Chat(ChatMessage),
    /// The session was replaced by a newer login or evicted.
    Disconnected { reason: String },
    AccountRestricted,
    MatchNew(MatchSnapshot),
    MatchUpdate(MatchSnapshot),
    MatchDisposed { match_id: MatchId },
    MatchJoinSuccess(MatchSnapshot),
    MatchJoinFail,
    MatchStart(MatchSnapshot),
    MatchTransferHost,
    MatchAllPlayersLoaded,
    MatchPlayerSkipped { slot: usize },
    MatchSkip,
    MatchPlayerFailed { slot: usize },
    MatchComplete,
    MatchAbort,
}
