//! The session directory: every connected client, indexed three ways.
//!
//! Requests arrive carrying a token, chat addresses players by name, and
//! match slots refer to user ids. The directory answers all three in O(1)
//! from one set of indices kept consistent under a single write lock.
//!
//! # Concurrency note
//!
//! The directory is shared (`Arc<SessionDirectory>`) by every request task.
//! It uses a `std::sync::RwLock`: every operation takes the lock, touches
//! the maps, and releases it before returning. Nothing here awaits, so no
//! guard can end up held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use encore_protocol::{SessionToken, UserId};

use crate::Session;

/// The three indices. Invariant: every token in `by_token` has exactly one
/// entry in `by_user` and one in `by_name`, and vice versa.
#[derive(Debug, Default)]
struct Indices {
    by_token: HashMap<SessionToken, Arc<Session>>,
    by_user: HashMap<UserId, SessionToken>,
    /// Lowercased username → user id.
    by_name: HashMap<String, UserId>,
}

impl Indices {
    fn insert(&mut self, session: Arc<Session>) {
        self.by_user.insert(session.id(), session.token().clone());
        self.by_name.insert(session.username().to_lowercase(), session.id());
        self.by_token.insert(session.token().clone(), session);
    }

    fn remove_token(&mut self, token: &SessionToken) -> Option<Arc<Session>> {
        let session = self.by_token.remove(token)?;
        self.by_user.remove(&session.id());
        self.by_name.remove(&session.username().to_lowercase());
        Some(session)
    }
}

/// Tracks every connected session.
///
/// ## Lifecycle
///
/// ```text
/// login ──→ register() ──→ [indexed] ──→ remove() / expire_stale()
///               │
///               └──→ evicts the previous session for the same user
/// ```
#[derive(Debug, Default)]
pub struct SessionDirectory {
    inner: RwLock<Indices>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Indices> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indices> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a new session, evicting any existing session for the same
    /// user in the same critical section.
    ///
    /// The evicted session (already marked evicted and removed from every
    /// index) is returned so the caller can notify it and clean up its
    /// match membership.
    pub fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        let mut indices = self.write();

        let evicted = indices
            .by_user
            .get(&session.id())
            .cloned()
            .and_then(|token| indices.remove_token(&token));
        if let Some(old) = &evicted {
            old.mark_evicted();
            tracing::info!(
                user_id = %old.id(),
                old_token = %old.token(),
                "evicting previous session for user"
            );
        }

        tracing::info!(
            user_id = %session.id(),
            username = session.username(),
            token = %session.token(),
            "session registered"
        );
        indices.insert(session);
        evicted
    }

    /// Looks up a live session by token.
    pub fn by_token(&self, token: &str) -> Option<Arc<Session>> {
        self.read().by_token.get(token).cloned()
    }

    pub fn by_user_id(&self, user_id: UserId) -> Option<Arc<Session>> {
        let indices = self.read();
        let token = indices.by_user.get(&user_id)?;
        indices.by_token.get(token).cloned()
    }

    /// Looks up a session by username, ignoring case.
    pub fn by_username(&self, username: &str) -> Option<Arc<Session>> {
        let indices = self.read();
        let user_id = indices.by_name.get(&username.to_lowercase())?;
        let token = indices.by_user.get(user_id)?;
        indices.by_token.get(token).cloned()
    }

    /// Removes `session`, but only if the directory still indexes that
    /// exact session under its token, and marks it evicted. Returns `true`
    /// if it was removed.
    ///
    /// Calling it twice, or with a session that was already replaced, is a
    /// no-op returning `false`.
    pub fn remove(&self, session: &Arc<Session>) -> bool {
        let mut indices = self.write();
        let indexed = indices
            .by_token
            .get(session.token())
            .is_some_and(|current| Arc::ptr_eq(current, session));
        if !indexed {
            return false;
        }
        indices.remove_token(session.token());
        session.mark_evicted();
        tracing::info!(user_id = %session.id(), "session removed");
        true
    }

    /// Removes every non-bot session that hasn't pinged within `timeout`,
    /// marks each evicted, and returns them.
    pub fn expire_stale(&self, timeout: Duration) -> Vec<Arc<Session>> {
        let mut indices = self.write();
        let stale: Vec<SessionToken> = indices
            .by_token
            .values()
            .filter(|s| !s.is_bot() && s.with_presence(|p| p.since_last_ping()) > timeout)
            .map(|s| s.token().clone())
            .collect();

        stale
            .iter()
            .filter_map(|token| indices.remove_token(token))
            .inspect(|session| {
                session.mark_evicted();
                tracing::info!(
                    user_id = %session.id(),
                    timeout_secs = timeout.as_secs(),
                    "session expired (ping timeout)"
                );
            })
            .collect()
    }

    /// A snapshot of every connected session.
    pub fn all(&self) -> Vec<Arc<Session>> {
        self.read().by_token.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_token.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionDirectory`.
    //!
    //! Naming: `test_{function}_{scenario}_{expected}`.

    use encore_protocol::Rank;

    use super::*;
    use crate::{
        ClientFingerprint, Location, OutboundReceiver, Presence, UserAccount, generate_token,
    };

    // -- Helpers ----------------------------------------------------------

    fn make_session(id: i32, name: &str) -> (Arc<Session>, OutboundReceiver) {
        let (session, rx) = Session::new(
            UserAccount {
                id: UserId(id),
                username: name.into(),
                rank: Rank::Player,
                country: 0,
                restricted: false,
            },
            generate_token(),
            Presence::new(Location::default(), ClientFingerprint::default()),
        );
        (Arc::new(session), rx)
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_new_user_is_findable_three_ways() {
        let dir = SessionDirectory::new();
        let (session, _rx) = make_session(1, "Ayame");

        assert!(dir.register(session.clone()).is_none());

        assert!(Arc::ptr_eq(&dir.by_token(session.token().as_str()).unwrap(), &session));
        assert!(Arc::ptr_eq(&dir.by_user_id(UserId(1)).unwrap(), &session));
        assert!(Arc::ptr_eq(&dir.by_username("ayame").unwrap(), &session));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_register_same_user_evicts_previous_session() {
        let dir = SessionDirectory::new();
        let (first, _rx1) = make_session(1, "Ayame");
        let (second, _rx2) = make_session(1, "Ayame");
        dir.register(first.clone());

        let evicted = dir.register(second.clone()).expect("first should be evicted");

        assert!(Arc::ptr_eq(&evicted, &first));
        assert!(first.is_evicted());
        assert!(!second.is_evicted());
        assert!(dir.by_token(first.token().as_str()).is_none());
        assert!(Arc::ptr_eq(&dir.by_user_id(UserId(1)).unwrap(), &second));
        assert_eq!(dir.len(), 1);
    }

    // =====================================================================
    // lookups
    // =====================================================================

    #[test]
    fn test_by_username_is_case_insensitive() {
        let dir = SessionDirectory::new();
        let (session, _rx) = make_session(1, "MixedCase");
        dir.register(session);

        assert!(dir.by_username("mixedcase").is_some());
        assert!(dir.by_username("MIXEDCASE").is_some());
        assert!(dir.by_username("other").is_none());
    }

    #[test]
    fn test_by_token_unknown_returns_none() {
        let dir = SessionDirectory::new();
        assert!(dir.by_token("nope").is_none());
        assert!(dir.is_empty());
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_is_idempotent() {
        let dir = SessionDirectory::new();
        let (session, _rx) = make_session(1, "Ayame");
        dir.register(session.clone());

        assert!(dir.remove(&session));
        assert!(session.is_evicted(), "removed sessions are fenced off");
        assert!(!dir.remove(&session));
        assert!(dir.is_empty());
        assert!(dir.by_username("ayame").is_none());
    }

    #[test]
    fn test_remove_replaced_session_leaves_new_one() {
        // A stale logout for an evicted session must not remove its
        // replacement.
        let dir = SessionDirectory::new();
        let (first, _rx1) = make_session(1, "Ayame");
        let (second, _rx2) = make_session(1, "Ayame");
        dir.register(first.clone());
        dir.register(second.clone());

        assert!(!dir.remove(&first));

        assert!(Arc::ptr_eq(&dir.by_user_id(UserId(1)).unwrap(), &second));
    }

    // =====================================================================
    // expire_stale()
    // =====================================================================

    #[test]
    fn test_expire_stale_zero_timeout_removes_players_but_not_bots() {
        let dir = SessionDirectory::new();
        let (player, _rx1) = make_session(1, "Ayame");
        let (bot, _rx2) = make_session(2, "Encore");
        bot.update_presence(|p| p.bot = true);
        dir.register(player.clone());
        dir.register(bot.clone());
        std::thread::sleep(Duration::from_millis(5));

        let expired = dir.expire_stale(Duration::ZERO);

        assert_eq!(expired.len(), 1);
        assert!(Arc::ptr_eq(&expired[0], &player));
        assert!(player.is_evicted());
        assert!(!bot.is_evicted());
        assert!(dir.by_user_id(UserId(2)).is_some());
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_expire_stale_long_timeout_keeps_everyone() {
        let dir = SessionDirectory::new();
        let (player, _rx) = make_session(1, "Ayame");
        dir.register(player);

        let expired = dir.expire_stale(Duration::from_secs(3600));

        assert!(expired.is_empty());
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_all_returns_every_session() {
        let dir = SessionDirectory::new();
        let (a, _rx1) = make_session(1, "a");
        let (b, _rx2) = make_session(2, "b");
        dir.register(a);
        dir.register(b);

        let mut ids: Vec<UserId> = dir.all().iter().map(|s| s.id()).collect();
        ids.sort();
        assert_eq!(ids, vec![UserId(1), UserId(2)]);
    }
}
