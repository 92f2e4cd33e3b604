//! Read-through beatmap cache keyed by checksum.
//!
//! Lookups hit the in-process map first and fall back to the store on a
//! miss. Only beatmaps that exist are cached, so a map uploaded after a
//! failed lookup is found on the next try.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::{Beatmap, ScoreStore, ScoringError};

#[derive(Debug, Default)]
pub struct BeatmapCache {
    entries: RwLock<HashMap<String, Beatmap>>,
}

impl BeatmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached beatmap for `checksum`, loading it from `store`
    /// on a miss.
    ///
    /// The lock is released before the store is awaited. Two concurrent
    /// misses both hit the store and the second insert wins, which is
    /// harmless since both saw the same row.
    pub async fn resolve<S: ScoreStore>(
        &self,
        store: &S,
        checksum: &str,
    ) -> Result<Option<Beatmap>, ScoringError> {
        if let Some(hit) = self.get(checksum) {
            return Ok(Some(hit));
        }

        let Some(beatmap) = store.beatmap_by_checksum(checksum).await? else {
            return Ok(None);
        };
        tracing::debug!(beatmap_id = beatmap.id, checksum, "beatmap cached");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(checksum.to_owned(), beatmap.clone());
        Ok(Some(beatmap))
    }

    /// Cached entry only; never touches the store.
    pub fn get(&self, checksum: &str) -> Option<Beatmap> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(checksum)
            .cloned()
    }

    pub fn invalidate(&self, checksum: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(checksum)
            .is_some()
    }

    /// Drops every entry, e.g. after beatmap statuses change in bulk.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "beatmap cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::BeatmapStatus;
    use crate::memory::MemoryStore;

    fn beatmap(checksum: &str) -> Beatmap {
        Beatmap {
            id: 75,
            set_id: 1,
            checksum: checksum.into(),
            status: BeatmapStatus::Ranked,
            play_count: 0,
            pass_count: 0,
            last_updated: Utc::now(),
            url: "https://osu.example/b/75".into(),
        }
    }

    #[tokio::test]
    async fn test_resolve_miss_loads_from_store_and_caches() {
        let store = MemoryStore::new();
        store.insert_beatmap(beatmap("abc"));
        let cache = BeatmapCache::new();

        let found = cache.resolve(&store, "abc").await.unwrap();

        assert_eq!(found.map(|b| b.id), Some(75));
        assert!(cache.get("abc").is_some());
    }

    #[tokio::test]
    async fn test_resolve_serves_cached_entry_after_store_changes() {
        let store = MemoryStore::new();
        store.insert_beatmap(beatmap("abc"));
        let cache = BeatmapCache::new();
        cache.resolve(&store, "abc").await.unwrap();

        let mut changed = beatmap("abc");
        changed.status = BeatmapStatus::Loved;
        store.insert_beatmap(changed);

        let cached = cache.resolve(&store, "abc").await.unwrap().unwrap();
        assert_eq!(cached.status, BeatmapStatus::Ranked);

        cache.invalidate_all();
        let fresh = cache.resolve(&store, "abc").await.unwrap().unwrap();
        assert_eq!(fresh.status, BeatmapStatus::Loved);
    }

    #[tokio::test]
    async fn test_resolve_unknown_checksum_is_not_cached() {
        let store = MemoryStore::new();
        let cache = BeatmapCache::new();

        assert!(cache.resolve(&store, "missing").await.unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_single_entry() {
        let cache = BeatmapCache::new();
        assert!(!cache.invalidate("abc"));
    }
}
