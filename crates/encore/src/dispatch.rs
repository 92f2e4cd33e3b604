//! Packet dispatch: token → session → handler.
//!
//! Every inbound packet goes through [`Server::dispatch`]. The flow is:
//!   1. Resolve the session by token (evicted sessions are rejected)
//!   2. Record activity so the sweeper leaves the session alone
//!   3. Look up the handler for the packet kind; unknown kinds are dropped
//!   4. Match-scoped handlers get the session's current match, or don't
//!      run at all when there isn't one
//!
//! Handlers decode their own payloads, enqueue their own broadcasts, and
//! never retry or roll back.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use encore_match::{MatchError, MatchHandle};
use encore_protocol::{Codec, Packet, PacketKind};
use encore_scoring::ScoreStore;
use encore_session::{Authenticator, Session};

use crate::handlers::{chat, multiplayer, presence};
use crate::{DispatchError, EncoreError, Server};

/// The boxed future returned by session-level handlers.
pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), EncoreError>> + Send + 'a>>;

/// A handler for one packet kind.
pub enum Handler<A, S, C> {
    /// Runs with just the session. May await the store.
    Session(for<'a> fn(&'a Server<A, S, C>, &'a Arc<Session>, &'a Packet) -> HandlerFuture<'a>),
    /// Runs against the session's current match. Synchronous, so the
    /// match lock can never be held across an `.await`.
    Match(fn(&Server<A, S, C>, &Arc<Session>, &MatchHandle, &Packet) -> Result<(), EncoreError>),
}

macro_rules! session_handler {
    ($handler:path) => {
        Handler::Session(|server, session, packet| Box::pin($handler(server, session, packet)))
    };
}

/// Maps each [`PacketKind`] to its handler.
pub struct HandlerRegistry<A, S, C> {
    handlers: HashMap<PacketKind, Handler<A, S, C>>,
}

impl<A, S, C> HandlerRegistry<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with every built-in handler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Presence
        registry.register(PacketKind::Ping, session_handler!(presence::ping));
        registry.register(PacketKind::ChangeAction, session_handler!(presence::change_action));
        registry.register(PacketKind::Logout, session_handler!(presence::logout));
        registry.register(
            PacketKind::RequestStatusUpdate,
            session_handler!(presence::request_status_update),
        );
        registry.register(
            PacketKind::UserStatsRequest,
            session_handler!(presence::user_stats_request),
        );
        registry.register(
            PacketKind::UserPresenceRequest,
            session_handler!(presence::user_presence_request),
        );
        registry.register(
            PacketKind::UserPresenceRequestAll,
            session_handler!(presence::presence_request_all),
        );
        registry.register(PacketKind::SetAwayMessage, session_handler!(presence::set_away_message));
        registry.register(
            PacketKind::ToggleBlockNonFriendDms,
            session_handler!(presence::toggle_block_dms),
        );

        // Chat
        registry.register(PacketKind::SendPublicMessage, session_handler!(chat::public_message));
        registry.register(PacketKind::SendPrivateMessage, session_handler!(chat::private_message));

        // Multiplayer, outside a match
        registry.register(PacketKind::CreateMatch, session_handler!(multiplayer::create_match));
        registry.register(PacketKind::JoinMatch, session_handler!(multiplayer::join_match));

        // Multiplayer, inside a match
        registry.register(PacketKind::PartMatch, Handler::Match(multiplayer::part_match));
        registry.register(PacketKind::MatchChangeSlot, Handler::Match(multiplayer::change_slot));
        registry.register(PacketKind::MatchReady, Handler::Match(multiplayer::ready));
        registry.register(PacketKind::MatchNotReady, Handler::Match(multiplayer::not_ready));
        registry.register(PacketKind::MatchHasBeatmap, Handler::Match(multiplayer::has_beatmap));
        registry.register(PacketKind::MatchNoBeatmap, Handler::Match(multiplayer::no_beatmap));
        registry.register(PacketKind::MatchLock, Handler::Match(multiplayer::lock));
        registry.register(
            PacketKind::MatchChangeSettings,
            Handler::Match(multiplayer::change_settings),
        );
        registry.register(PacketKind::MatchStart, Handler::Match(multiplayer::start));
        registry.register(PacketKind::MatchAbort, Handler::Match(multiplayer::abort));
        registry.register(
            PacketKind::MatchLoadComplete,
            Handler::Match(multiplayer::load_complete),
        );
        registry.register(PacketKind::MatchSkipRequest, Handler::Match(multiplayer::skip_request));
        registry.register(PacketKind::MatchComplete, Handler::Match(multiplayer::complete));
        registry.register(PacketKind::MatchFailed, Handler::Match(multiplayer::failed));
        registry.register(PacketKind::MatchChangeMods, Handler::Match(multiplayer::change_mods));
        registry.register(PacketKind::MatchChangeTeam, Handler::Match(multiplayer::change_team));
        registry.register(
            PacketKind::MatchTransferHost,
            Handler::Match(multiplayer::transfer_host),
        );
        registry.register(
            PacketKind::MatchChangePassword,
            Handler::Match(multiplayer::change_password),
        );

        registry
    }

    /// Registers `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: PacketKind, handler: Handler<A, S, C>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: PacketKind) -> Option<&Handler<A, S, C>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<A, S, C> Default for HandlerRegistry<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server entry points
// ---------------------------------------------------------------------------

impl<A, S, C> Server<A, S, C>
where
    A: Authenticator,
    S: ScoreStore,
    C: Codec,
{
    /// Routes one packet from the client holding `token`.
    ///
    /// # Errors
    /// - `DispatchError::Unauthenticated`: no live session for `token`.
    /// - whatever the handler returns. Inside a match, requests refused by
    ///   the match state (wrong host, slot, or phase) are silent no-ops.
    pub async fn dispatch(&self, token: &str, packet: Packet) -> Result<(), EncoreError> {
        let session = self
            .directory()
            .by_token(token)
            .filter(|s| !s.is_evicted())
            .ok_or(DispatchError::Unauthenticated)?;
        session.touch();

        let Some(handler) = self.handlers.get(packet.kind) else {
            tracing::debug!(user_id = %session.id(), kind = ?packet.kind, "no handler for packet");
            return Ok(());
        };

        let handler = match handler {
            Handler::Session(handler) => return handler(self, &session, &packet).await,
            Handler::Match(handler) => handler,
        };
        let Some(game) = self.current_match(&session) else {
            tracing::debug!(user_id = %session.id(), kind = ?packet.kind, "not in a match");
            return Ok(());
        };

        match handler(self, &session, &game, &packet) {
            Err(EncoreError::Match(e)) if is_ignorable(&e) => {
                tracing::debug!(
                    user_id = %session.id(),
                    kind = ?packet.kind,
                    error = %e,
                    "ignored"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Like [`dispatch`](Self::dispatch), from the raw tag and payload the
    /// transport read. Unknown tags are logged and dropped.
    pub async fn dispatch_raw(
        &self,
        token: &str,
        tag: u16,
        payload: Vec<u8>,
    ) -> Result<(), EncoreError> {
        match Packet::from_wire(tag, payload) {
            Ok(packet) => self.dispatch(token, packet).await,
            Err(e) => {
                tracing::debug!(tag, error = %e, "dropping unknown packet");
                Ok(())
            }
        }
    }

    /// Registers or replaces a packet handler. Call before sharing the
    /// server.
    pub fn register_handler(&mut self, kind: PacketKind, handler: Handler<A, S, C>) {
        self.handlers.register(kind, handler);
    }
}

/// Refusals a client provokes by acting on a stale view of its match. The
/// next snapshot corrects the client.
fn is_ignorable(error: &MatchError) -> bool {
    matches!(
        error,
        MatchError::NotHost(..)
            | MatchError::NotInMatch(..)
            | MatchError::InvalidSlot(..)
            | MatchError::SlotNotOccupied(..)
            | MatchError::SlotUnavailable(..)
            | MatchError::InvalidState { .. }
    )
}

#[cfg(test)]
mod tests {
    use encore_protocol::{JsonCodec, MatchId, MatchStatus, UserId};
    use encore_scoring::memory::MemoryStore;
    use encore_session::{LoginRequest, SessionError, UserAccount};

    use super::*;

    type TestRegistry = HandlerRegistry<NoAuth, MemoryStore, JsonCodec>;

    struct NoAuth;

    impl Authenticator for NoAuth {
        async fn authenticate(&self, request: &LoginRequest) -> Result<UserAccount, SessionError> {
            Err(SessionError::AuthFailed(request.username.clone()))
        }
    }

    #[test]
    fn test_with_defaults_covers_every_known_kind() {
        let registry: TestRegistry = HandlerRegistry::with_defaults();

        for &kind in PacketKind::KNOWN.iter() {
            assert!(registry.get(kind).is_some(), "{kind:?} has no handler");
        }
    }

    #[test]
    fn test_with_defaults_match_scoped_kinds_use_match_handlers() {
        let registry: TestRegistry = HandlerRegistry::with_defaults();

        for &kind in PacketKind::KNOWN.iter() {
            let is_match_handler = matches!(registry.get(kind), Some(Handler::Match(_)));
            assert_eq!(is_match_handler, kind.is_match_scoped(), "{kind:?}");
        }
    }

    #[test]
    fn test_register_replaces_handler() {
        let mut registry: TestRegistry = HandlerRegistry::new();
        registry.register(PacketKind::Ping, Handler::Match(multiplayer::part_match));
        registry.register(PacketKind::Ping, session_handler!(presence::ping));

        assert_eq!(registry.len(), 1);
        assert!(matches!(registry.get(PacketKind::Ping), Some(Handler::Session(_))));
    }

    #[test]
    fn test_is_ignorable_match_state_refusals_only() {
        let game = MatchId(1);
        let user = UserId(7);

        assert!(is_ignorable(&MatchError::NotHost(user, game)));
        assert!(is_ignorable(&MatchError::NotInMatch(user, game)));
        assert!(is_ignorable(&MatchError::InvalidSlot(99)));
        assert!(is_ignorable(&MatchError::SlotNotOccupied(3)));
        assert!(is_ignorable(&MatchError::SlotUnavailable(3)));
        assert!(is_ignorable(&MatchError::InvalidState {
            match_id: game,
            status: MatchStatus::Playing,
            reason: "already playing",
        }));

        assert!(!is_ignorable(&MatchError::NotFound(game)));
        assert!(!is_ignorable(&MatchError::Full(game)));
        assert!(!is_ignorable(&MatchError::WrongPassword(game)));
        assert!(!is_ignorable(&MatchError::AlreadyInMatch(user, game)));
    }
}
