//! Snapshot cache.
//!
//! Holds the latest fetched value per stream with its fetch time and
//! answers freshness queries. Each key is backed by a `watch` channel, so
//! the stored snapshot and the change notification are the same object:
//! subscribers always observe exactly what the cache holds.

use std::sync::Arc;
use std::time::Duration;

use caden_core::StreamKey;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Immutable fetched value of one stream.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub value: Arc<T>,
    /// Start instant of the fetch that produced `value`.
    pub fetched_at: Instant,
    pub stream_key: StreamKey,
    /// Write counter for the key, starting at 1.
    pub version: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
            stream_key: self.stream_key.clone(),
            version: self.version,
        }
    }
}

struct CacheSlot<T> {
    tx: watch::Sender<Option<Snapshot<T>>>,
    ttl: Duration,
    invalidated: bool,
}

impl<T> CacheSlot<T> {
    fn new(ttl: Duration) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            ttl,
            invalidated: false,
        }
    }
}

/// Per-stream snapshot cache.
pub struct SnapshotCache<T> {
    slots: DashMap<StreamKey, CacheSlot<T>>,
    default_ttl: Duration,
}

impl<T> SnapshotCache<T> {
    /// Create a cache; keys not registered explicitly use `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            default_ttl,
        }
    }

    /// Set the time-to-live of `key`.
    pub fn register(&self, key: StreamKey, ttl: Duration) {
        self.slots
            .entry(key)
            .and_modify(|slot| slot.ttl = ttl)
            .or_insert_with(|| CacheSlot::new(ttl));
    }

    pub fn get(&self, key: &StreamKey) -> Option<Snapshot<T>> {
        self.slots.get(key).and_then(|slot| slot.tx.borrow().clone())
    }

    /// Store `value` as fetched now, unconditionally.
    pub fn put(&self, key: &StreamKey, value: T) -> Snapshot<T> {
        let mut slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| CacheSlot::new(self.default_ttl));
        let version = slot.tx.borrow().as_ref().map_or(0, |s| s.version) + 1;
        let snapshot = Snapshot {
            value: Arc::new(value),
            fetched_at: Instant::now(),
            stream_key: key.clone(),
            version,
        };
        slot.invalidated = false;
        slot.tx.send_replace(Some(snapshot.clone()));
        snapshot
    }

    /// Store the result of a fetch that started at `fetched_at`.
    ///
    /// Rejected (returns `None`) when the stored snapshot came from a
    /// fetch that started later, so a slow, older fetch can never replace
    /// newer data.
    pub fn put_observed(
        &self,
        key: &StreamKey,
        value: Arc<T>,
        fetched_at: Instant,
    ) -> Option<Snapshot<T>> {
        let mut slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| CacheSlot::new(self.default_ttl));

        let (stored_at, version) = {
            let current = slot.tx.borrow();
            (
                current.as_ref().map(|s| s.fetched_at),
                current.as_ref().map_or(0, |s| s.version),
            )
        };
        if stored_at.is_some_and(|stored| fetched_at < stored) {
            debug!(stream = %key, "Discarding snapshot older than the cached one");
            return None;
        }

        let snapshot = Snapshot {
            value,
            fetched_at,
            stream_key: key.clone(),
            version: version + 1,
        };
        slot.invalidated = false;
        slot.tx.send_replace(Some(snapshot.clone()));
        Some(snapshot)
    }

    /// True iff a snapshot exists, was not invalidated, and
    /// `now - fetched_at < ttl`.
    pub fn is_fresh(&self, key: &StreamKey) -> bool {
        let Some(slot) = self.slots.get(key) else {
            return false;
        };
        if slot.invalidated {
            return false;
        }
        let fetched_at = slot.tx.borrow().as_ref().map(|s| s.fetched_at);
        fetched_at.is_some_and(|at| Instant::now().duration_since(at) < slot.ttl)
    }

    /// Mark `key` stale without dropping the last good value.
    pub fn invalidate(&self, key: &StreamKey) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.invalidated = true;
        }
    }

    /// Receive every snapshot written for `key` from now on.
    pub fn subscribe(&self, key: &StreamKey) -> watch::Receiver<Option<Snapshot<T>>> {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| CacheSlot::new(self.default_ttl))
            .tx
            .subscribe()
    }

    /// Number of writes accepted for `key`.
    pub fn version(&self, key: &StreamKey) -> u64 {
        self.get(key).map_or(0, |s| s.version)
    }
}
