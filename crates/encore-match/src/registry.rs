//! Match registry: creates, tracks, and removes matches.
//!
//! Each match lives behind its own `Arc<std::sync::Mutex<Match>>`
//! ([`MatchHandle`]), so operations on different matches never contend.
//! The registry's own lock only guards the id → handle map and is never
//! held while a match is locked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use encore_protocol::{MatchId, MatchSettings, MatchSnapshot, UserId};

use crate::{Match, MatchConfig};

// ---------------------------------------------------------------------------
// MatchHandle
// ---------------------------------------------------------------------------

/// A shared reference to one match. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    inner: Arc<Mutex<Match>>,
}

impl MatchHandle {
    fn new(game: Match) -> Self {
        Self {
            match_id: game.id(),
            inner: Arc::new(Mutex::new(game)),
        }
    }

    /// The match id, readable without locking.
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Locks the match. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Match> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a snapshot under a short lock.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.lock().snapshot()
    }
}

// ---------------------------------------------------------------------------
// MatchRegistry
// ---------------------------------------------------------------------------

/// All live matches.
#[derive(Debug)]
pub struct MatchRegistry {
    matches: RwLock<HashMap<MatchId, MatchHandle>>,
    next_id: AtomicU32,
    config: MatchConfig,
}

impl MatchRegistry {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            config,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<MatchId, MatchHandle>> {
        self.matches.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<MatchId, MatchHandle>> {
        self.matches.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a match hosted by `host` (seated in slot 0) and returns it.
    pub fn create(
        &self,
        host: UserId,
        settings: MatchSettings,
        password: Option<String>,
    ) -> MatchHandle {
        let match_id = MatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = MatchHandle::new(Match::new(match_id, host, settings, password, &self.config));
        self.write().insert(match_id, handle.clone());
        tracing::info!(%match_id, %host, "match created");
        handle
    }

    pub fn get(&self, match_id: MatchId) -> Option<MatchHandle> {
        self.read().get(&match_id).cloned()
    }

    /// Removes a match. Returns the handle if it was present.
    pub fn remove(&self, match_id: MatchId) -> Option<MatchHandle> {
        let removed = self.write().remove(&match_id);
        if removed.is_some() {
            tracing::info!(%match_id, "match removed");
        }
        removed
    }

    /// Snapshots of every match, ordered by id, for lobby listings.
    pub fn snapshots(&self) -> Vec<MatchSnapshot> {
        let handles: Vec<MatchHandle> = self.read().values().cloned().collect();
        let mut snapshots: Vec<MatchSnapshot> = handles.iter().map(MatchHandle::snapshot).collect();
        snapshots.sort_by_key(|s| s.match_id);
        snapshots
    }

    pub fn ids(&self) -> Vec<MatchId> {
        let mut ids: Vec<MatchId> = self.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(name: &str) -> MatchSettings {
        MatchSettings {
            name: name.into(),
            ..MatchSettings::default()
        }
    }

    #[test]
    fn test_create_allocates_increasing_ids() {
        let registry = MatchRegistry::default();

        let a = registry.create(UserId(1), settings("a"), None);
        let b = registry.create(UserId(2), settings("b"), None);

        assert!(b.match_id() > a.match_id());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![a.match_id(), b.match_id()]);
    }

    #[test]
    fn test_create_seats_host() {
        let registry = MatchRegistry::default();

        let handle = registry.create(UserId(7), settings("room"), Some("pw".into()));

        let game = handle.lock();
        assert_eq!(game.host(), UserId(7));
        assert_eq!(game.slot_of(UserId(7)), Some(0));
        assert_eq!(game.password(), Some("pw"));
    }

    #[test]
    fn test_get_and_remove() {
        let registry = MatchRegistry::default();
        let handle = registry.create(UserId(1), settings("a"), None);
        let id = handle.match_id();

        assert!(registry.get(id).is_some());
        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_share_state() {
        let registry = MatchRegistry::default();
        let handle = registry.create(UserId(1), settings("a"), None);

        handle.lock().join(UserId(2), None).unwrap();

        let again = registry.get(handle.match_id()).unwrap();
        assert!(again.lock().contains(UserId(2)));
    }

    #[test]
    fn test_snapshots_sorted_and_password_free() {
        let registry = MatchRegistry::default();
        registry.create(UserId(1), settings("a"), Some("secret".into()));
        registry.create(UserId(2), settings("b"), None);

        let snapshots = registry.snapshots();

        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[0].match_id < snapshots[1].match_id);
        assert!(snapshots[0].has_password);
        assert!(!snapshots[1].has_password);
    }
}
