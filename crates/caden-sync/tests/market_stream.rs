//! Market stream polled against the in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use caden_core::{MarketQuote, Price, StreamKey, StreamKind};
use caden_ledger::{LedgerError, LedgerReader, MockLedger};
use caden_sync::{
    BackoffController, FetchDeduplicator, PollerConfig, SnapshotCache, StreamDescriptor,
    StreamHandle, StreamPoller,
};
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;

struct Setup {
    ledger: Arc<MockLedger>,
    cache: Arc<SnapshotCache<MarketQuote>>,
    dedup: Arc<FetchDeduplicator<MarketQuote>>,
    backoff: Arc<BackoffController>,
    cancel: CancellationToken,
}

impl Setup {
    fn new() -> Self {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_market(MarketQuote {
            near_price: Some(Price::new(dec!(100))),
            far_price: Some(Price::new(dec!(101))),
            ..Default::default()
        });
        Self {
            ledger,
            cache: Arc::new(SnapshotCache::new(Duration::from_secs(2))),
            dedup: Arc::new(FetchDeduplicator::new()),
            backoff: Arc::new(BackoffController::default()),
            cancel: CancellationToken::new(),
        }
    }

    fn spawn(&self, interval_ms: u64, ttl_ms: u64) -> StreamHandle<MarketQuote> {
        self.spawn_with(interval_ms, ttl_ms, self.cancel.clone())
    }

    fn spawn_with(
        &self,
        interval_ms: u64,
        ttl_ms: u64,
        cancel: CancellationToken,
    ) -> StreamHandle<MarketQuote> {
        let ledger = Arc::clone(&self.ledger);
        let descriptor = StreamDescriptor::new(
            StreamKey::global(StreamKind::Market),
            Duration::from_millis(interval_ms),
            Duration::from_millis(ttl_ms),
            move || {
                let ledger = Arc::clone(&ledger);
                async move { ledger.market().await }
            },
        );
        let (poller, handle) = StreamPoller::new(
            descriptor,
            Arc::clone(&self.cache),
            Arc::clone(&self.dedup),
            Arc::clone(&self.backoff),
            PollerConfig::default(),
            cancel,
        );
        poller.spawn();
        handle
    }
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_two_rate_limits() {
    let setup = Setup::new();
    for _ in 0..2 {
        setup.ledger.fail_next_read(
            StreamKind::Market,
            LedgerError::RateLimited("HTTP 429: Too Many Requests".into()),
        );
    }
    let handle = setup.spawn(5000, 5000);

    tokio::time::sleep(Duration::from_millis(4000)).await;

    assert_eq!(setup.ledger.read_calls(StreamKind::Market), 3);
    let key = StreamKey::global(StreamKind::Market);
    assert_eq!(setup.cache.version(&key), 1);
    assert!(setup.cache.is_fresh(&key));
    assert_eq!(setup.backoff.state(&key).consecutive_failures, 0);

    let state = handle.state();
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert_eq!(
        state.data.and_then(|q| q.near_price),
        Some(Price::new(dec!(100)))
    );
    setup.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_refreshes_collapse_into_one_fetch() {
    let setup = Setup::new();
    let handle = setup.spawn(60_000, 60_000);
    settle().await;
    assert_eq!(setup.ledger.read_calls(StreamKind::Market), 1);

    setup.ledger.set_read_delay(Duration::from_millis(200));
    for _ in 0..8 {
        handle.refresh_now();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(setup.ledger.read_calls(StreamKind::Market), 2);
    assert_eq!(setup.cache.version(&StreamKey::global(StreamKind::Market)), 2);
    setup.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_two_pollers_on_one_key_share_fetches() {
    let setup = Setup::new();
    setup.ledger.set_read_delay(Duration::from_millis(100));
    let a = setup.spawn(1000, 500);
    let b = setup.spawn(1000, 500);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(setup.ledger.read_calls(StreamKind::Market), 1);
    assert!(a.state().data.is_some());
    assert!(b.state().data.is_some());
    setup.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_joined_fetch_of_closed_poller_is_refetched() {
    let setup = Setup::new();
    setup.ledger.set_read_delay(Duration::from_millis(100));
    let closing = CancellationToken::new();
    let _a = setup.spawn_with(60_000, 60_000, closing.clone());
    settle().await;
    let b = setup.spawn(60_000, 60_000);
    settle().await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    closing.cancel();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(setup.ledger.read_calls(StreamKind::Market), 2);
    assert_eq!(setup.cache.version(&StreamKey::global(StreamKind::Market)), 1);
    let state = b.state();
    assert!(state.data.is_some());
    assert!(state.error.is_none());
    assert!(!state.loading);
    setup.cancel.cancel();
}
