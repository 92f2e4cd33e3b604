//! Session types: the server's record of one connected client.
//!
//! A [`Session`] is shared (`Arc<Session>`) between the directory, every
//! in-flight request for that player, and match fan-out. Everything that
//! can change after login sits behind interior mutability:
//!
//! - presence and the current match behind short-lived `std::sync` locks
//!   (never held across an `.await`),
//! - the eviction flag as an `AtomicBool`,
//! - outbound delivery through an unbounded mpsc queue whose receiver is
//!   handed to the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use encore_protocol::{
    GameMode, MatchId, MatchSnapshot, Rank, ServerPacket, SessionToken, UserId,
};
use tokio::sync::mpsc;

use crate::Presence;

/// The receiving half of a session's outbound queue. The transport drains
/// it and writes each packet to the client.
pub type OutboundReceiver = mpsc::UnboundedReceiver<ServerPacket>;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long (in seconds) a client may go without pinging before the
    /// sweeper logs it out.
    ///
    /// Default: 80 seconds.
    pub ping_timeout_secs: u64,
}

impl SessionConfig {
    /// The ping timeout as a `Duration`.
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_timeout_secs: 80,
        }
    }
}

// ---------------------------------------------------------------------------
// UserAccount
// ---------------------------------------------------------------------------

/// The persistent account a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub rank: Rank,
    /// Numeric country code from the account profile.
    pub country: u8,
    pub restricted: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connected client.
///
/// Created on successful login, destroyed on logout, ping timeout,
/// duplicate login, or restriction.
#[derive(Debug)]
pub struct Session {
    account: UserAccount,
    token: SessionToken,
    presence: RwLock<Presence>,
    current_match: Mutex<Option<MatchId>>,
    /// `(match, seq)` of the last match snapshot delivered to this client.
    last_match_seq: Mutex<Option<(MatchId, u64)>>,
    outbound: mpsc::UnboundedSender<ServerPacket>,
    evicted: AtomicBool,
}

impl Session {
    /// Creates a session and the receiver for its outbound queue.
    pub fn new(
        account: UserAccount,
        token: SessionToken,
        presence: Presence,
    ) -> (Self, OutboundReceiver) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let session = Self {
            account,
            token,
            presence: RwLock::new(presence),
            current_match: Mutex::new(None),
            last_match_seq: Mutex::new(None),
            outbound,
            evicted: AtomicBool::new(false),
        };
        (session, receiver)
    }

    pub fn id(&self) -> UserId {
        self.account.id
    }

    pub fn username(&self) -> &str {
        &self.account.username
    }

    pub fn rank(&self) -> Rank {
        self.account.rank
    }

    pub fn account(&self) -> &UserAccount {
        &self.account
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    // -- Presence ---------------------------------------------------------

    /// Reads the presence under a short read lock.
    pub fn with_presence<R>(&self, f: impl FnOnce(&Presence) -> R) -> R {
        let presence = self.presence.read().unwrap_or_else(PoisonError::into_inner);
        f(&presence)
    }

    /// Mutates the presence under a short write lock.
    pub fn update_presence<R>(&self, f: impl FnOnce(&mut Presence) -> R) -> R {
        let mut presence = self.presence.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut presence)
    }

    pub fn current_mode(&self) -> GameMode {
        self.with_presence(Presence::current_mode)
    }

    pub fn is_bot(&self) -> bool {
        self.with_presence(|p| p.bot)
    }

    // -- Activity ---------------------------------------------------------

    /// Records inbound activity: any request counts as a ping.
    pub fn touch(&self) {
        self.update_presence(Presence::touch_ping);
    }

    /// Time since the last inbound request.
    pub fn idle_for(&self) -> Duration {
        self.with_presence(Presence::since_last_ping)
    }

    // -- Match membership -------------------------------------------------

    pub fn current_match(&self) -> Option<MatchId> {
        *self.current_match.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets (or clears) the match this session occupies and returns the
    /// previous one.
    pub fn set_current_match(&self, match_id: Option<MatchId>) -> Option<MatchId> {
        let mut current = self.current_match.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, match_id)
    }

    // -- Outbound ---------------------------------------------------------

    /// Queues a packet for this client. Returns `false` if the transport
    /// already dropped the receiver.
    pub fn send(&self, packet: ServerPacket) -> bool {
        self.outbound.send(packet).is_ok()
    }

    /// Queues a match snapshot unless this client already saw a newer (or
    /// the same) revision of that match.
    ///
    /// Broadcasts are built under the match lock but enqueued after it is
    /// released, so two broadcasts for the same match can race. The
    /// sequence check keeps the client from regressing to an older state.
    pub fn enqueue_match_update(&self, snapshot: MatchSnapshot) -> bool {
        {
            let mut last = self.last_match_seq.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((match_id, seq)) = *last {
                if match_id == snapshot.match_id && snapshot.seq <= seq {
                    tracing::trace!(
                        user_id = %self.id(),
                        match_id = %match_id,
                        stale = snapshot.seq,
                        seen = seq,
                        "dropping stale match snapshot"
                    );
                    return false;
                }
            }
            *last = Some((snapshot.match_id, snapshot.seq));
        }
        self.send(ServerPacket::MatchUpdate(snapshot))
    }

    // -- Eviction ---------------------------------------------------------

    /// Marks the session evicted. Returns `true` only for the first call,
    /// so cleanup runs exactly once.
    pub fn mark_evicted(&self) -> bool {
        !self.evicted.swap(true, Ordering::AcqRel)
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.load(Ordering::Acquire)
    }
}

/// Generates a random 32-character hex session token (128 bits).
pub fn generate_token() -> SessionToken {
    let bytes: [u8; 16] = rand::random();
    SessionToken(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use encore_protocol::{MatchSettings, MatchStatus, Mods};

    use std::time::Instant;

    use super::*;
    use crate::{ClientFingerprint, Location};

    fn account(id: i32) -> UserAccount {
        UserAccount {
            id: UserId(id),
            username: format!("player{id}"),
            rank: Rank::Player,
            country: 0,
            restricted: false,
        }
    }

    fn session(id: i32) -> (Session, OutboundReceiver) {
        Session::new(
            account(id),
            generate_token(),
            Presence::new(Location::default(), ClientFingerprint::default()),
        )
    }

    fn snapshot(match_id: u32, seq: u64) -> MatchSnapshot {
        MatchSnapshot {
            match_id: MatchId(match_id),
            host: UserId(1),
            has_password: false,
            status: MatchStatus::Idle,
            settings: MatchSettings::default(),
            mods: Mods::NONE,
            slots: Vec::new(),
            seq,
        }
    }

    // =====================================================================
    // generate_token()
    // =====================================================================

    #[test]
    fn test_generate_token_is_32_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();

        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    // =====================================================================
    // send() / enqueue_match_update()
    // =====================================================================

    #[test]
    fn test_send_delivers_to_receiver() {
        let (session, mut rx) = session(1);

        assert!(session.send(ServerPacket::Pong));

        assert_eq!(rx.try_recv().unwrap(), ServerPacket::Pong);
    }

    #[test]
    fn test_send_after_receiver_dropped_returns_false() {
        let (session, rx) = session(1);
        drop(rx);

        assert!(!session.send(ServerPacket::Pong));
    }

    #[test]
    fn test_enqueue_match_update_drops_stale_snapshot() {
        let (session, mut rx) = session(1);

        assert!(session.enqueue_match_update(snapshot(1, 5)));
        assert!(!session.enqueue_match_update(snapshot(1, 4)));
        assert!(!session.enqueue_match_update(snapshot(1, 5)));
        assert!(session.enqueue_match_update(snapshot(1, 6)));

        let seqs: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|packet| match packet {
                ServerPacket::MatchUpdate(s) => s.seq,
                other => panic!("unexpected packet {other:?}"),
            })
            .collect();
        assert_eq!(seqs, vec![5, 6]);
    }

    #[test]
    fn test_enqueue_match_update_other_match_resets_counter() {
        // Counters are per match: a fresh match starts low again.
        let (session, _rx) = session(1);

        assert!(session.enqueue_match_update(snapshot(1, 40)));
        assert!(session.enqueue_match_update(snapshot(2, 1)));
    }

    // =====================================================================
    // current match / eviction / activity
    // =====================================================================

    #[test]
    fn test_set_current_match_returns_previous() {
        let (session, _rx) = session(1);

        assert_eq!(session.set_current_match(Some(MatchId(3))), None);
        assert_eq!(session.current_match(), Some(MatchId(3)));
        assert_eq!(session.set_current_match(None), Some(MatchId(3)));
        assert_eq!(session.current_match(), None);
    }

    #[test]
    fn test_mark_evicted_is_idempotent() {
        let (session, _rx) = session(1);

        assert!(!session.is_evicted());
        assert!(session.mark_evicted());
        assert!(!session.mark_evicted());
        assert!(session.is_evicted());
    }

    #[test]
    fn test_update_presence_is_visible_to_readers() {
        let (session, _rx) = session(1);

        session.update_presence(|p| p.status.mode = GameMode::Catch);

        assert_eq!(session.current_mode(), GameMode::Catch);
    }

    #[test]
    fn test_touch_resets_idle_time() {
        let (session, _rx) = session(1);
        session.update_presence(|p| p.last_ping = Instant::now() - Duration::from_secs(90));
        assert!(session.idle_for() >= Duration::from_secs(90));

        session.touch();

        assert!(session.idle_for() < Duration::from_secs(5));
    }
}
