//! Fetch deduplication.
//!
//! At most one fetch runs per stream key. A caller arriving while a fetch
//! is in flight joins it and receives the same result, success or error.
//! The fetch itself runs on its own task, so it completes even if every
//! caller is dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use caden_core::StreamKey;
use caden_ledger::BoxFuture;
use futures_util::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

type SharedFetch<T> = Shared<BoxFuture<'static, SyncResult<Arc<T>>>>;

pub struct FetchDeduplicator<T> {
    inflight: Mutex<HashMap<StreamKey, (u64, SharedFetch<T>)>>,
    next_generation: AtomicU64,
}

impl<T> Default for FetchDeduplicator<T> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }
}

impl<T: Send + Sync + 'static> FetchDeduplicator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key` unless one is already in flight, in which
    /// case join it. `fetch` is not called when joining.
    pub async fn run_exclusive<F, Fut>(&self, key: &StreamKey, fetch: F) -> SyncResult<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<Arc<T>>> + Send + 'static,
    {
        let (generation, pending) = {
            let mut inflight = self.inflight.lock();
            // A completed entry is waiting for its owner to remove it.
            let joinable = inflight
                .get(key)
                .filter(|(_, pending)| pending.peek().is_none())
                .map(|(generation, pending)| (*generation, pending.clone()));
            match joinable {
                Some(joined) => {
                    debug!(stream = %key, "Joining in-flight fetch");
                    joined
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let handle = tokio::spawn(fetch());
                    let joined: BoxFuture<'static, SyncResult<Arc<T>>> = Box::pin(async move {
                        handle
                            .await
                            .unwrap_or_else(|e| Err(SyncError::TaskAborted(e.to_string())))
                    });
                    let pending = joined.shared();
                    inflight.insert(key.clone(), (generation, pending.clone()));
                    (generation, pending)
                }
            }
        };

        let result = pending.await;

        let mut inflight = self.inflight.lock();
        if inflight.get(key).is_some_and(|(g, _)| *g == generation) {
            inflight.remove(key);
        }
        result
    }

    pub fn is_in_flight(&self, key: &StreamKey) -> bool {
        self.inflight
            .lock()
            .get(key)
            .is_some_and(|(_, pending)| pending.peek().is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caden_ledger::LedgerError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key() -> StreamKey {
        StreamKey::new("position:abc")
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let dedup = Arc::new(FetchDeduplicator::<u64>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let dedup = Arc::clone(&dedup);
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                dedup
                    .run_exclusive(&key(), move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok(Arc::new(7))
                        }
                    })
                    .await
            }));
        }

        for task in tasks {
            assert_eq!(*task.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!dedup.is_in_flight(&key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_joined_caller() {
        let dedup = Arc::new(FetchDeduplicator::<u64>::new());
        let slow_error = || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err(SyncError::Fetch(LedgerError::RateLimited("429".into())))
        };

        let a = tokio::spawn({
            let dedup = Arc::clone(&dedup);
            async move { dedup.run_exclusive(&key(), slow_error).await }
        });
        tokio::task::yield_now().await;
        assert!(dedup.is_in_flight(&key()));
        let b = dedup
            .run_exclusive(&key(), || async { Ok(Arc::new(1)) })
            .await;

        let a = a.await.unwrap();
        assert_eq!(a, b);
        assert!(a.unwrap_err().is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_calls_fetch_again() {
        let dedup = FetchDeduplicator::<u64>::new();
        let calls = AtomicUsize::new(0);

        for expected in 1..=3u64 {
            let value = dedup
                .run_exclusive(&key(), || {
                    let n = calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
                    async move { Ok(Arc::new(n)) }
                })
                .await
                .unwrap();
            assert_eq!(*value, expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let dedup = Arc::new(FetchDeduplicator::<u64>::new());
        let slow = |v: u64| {
            move || async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Arc::new(v))
            }
        };

        let (first, other) = (key(), StreamKey::new("market"));
        let (a, b) = tokio::join!(
            dedup.run_exclusive(&first, slow(1)),
            dedup.run_exclusive(&other, slow(2))
        );
        assert_eq!(*a.unwrap(), 1);
        assert_eq!(*b.unwrap(), 2);
    }
}
