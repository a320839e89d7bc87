//! Stream poller.
//!
//! One poller per stream. Each tick consults the snapshot cache first and
//! only goes remote when the snapshot is stale. Rate limits schedule a
//! single one-shot retry on top of the regular interval; the retry slot
//! is replaced, never stacked, so sustained throttling cannot accumulate
//! timers.
//!
//! ```text
//! Idle -> Fetching -> { Updated | RateLimited | Failed } -> Idle
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use caden_core::StreamKey;
use caden_ledger::{BoxFuture, LedgerResult};
use caden_telemetry::Metrics;
use tokio::sync::{watch, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::BackoffController;
use crate::cache::SnapshotCache;
use crate::dedup::FetchDeduplicator;
use crate::error::{SyncError, SyncResult};

/// Remote read for one stream.
pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, LedgerResult<T>> + Send + Sync>;

/// Polling policy of one stream. Immutable after startup.
pub struct StreamDescriptor<T> {
    pub key: StreamKey,
    pub interval: Duration,
    pub ttl: Duration,
    pub fetch: FetchFn<T>,
}

impl<T> Clone for StreamDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            interval: self.interval,
            ttl: self.ttl,
            fetch: Arc::clone(&self.fetch),
        }
    }
}

impl<T: 'static> StreamDescriptor<T> {
    pub fn new<F, Fut>(key: StreamKey, interval: Duration, ttl: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LedgerResult<T>> + Send + 'static,
    {
        Self {
            key,
            interval,
            ttl,
            fetch: Arc::new(move || -> BoxFuture<'static, LedgerResult<T>> { Box::pin(fetch()) }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Fetching,
    Updated,
    RateLimited,
    Failed,
}

/// What a stream's subscribers see.
#[derive(Debug)]
pub struct StreamState<T> {
    /// Last good value; kept across failures.
    pub data: Option<Arc<T>>,
    /// True only until the first outcome is known.
    pub loading: bool,
    pub error: Option<SyncError>,
    pub phase: PollerPhase,
}

impl<T> Clone for StreamState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
            phase: self.phase,
        }
    }
}

impl<T> Default for StreamState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            phase: PollerPhase::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Consecutive rate limits absorbed before the error is surfaced.
    pub max_silent_retries: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_silent_retries: 3,
        }
    }
}

/// Pending "refresh now" request of one poller.
///
/// Requests arriving while one is pending, or while the forced fetch it
/// started is still running, collapse into it.
#[derive(Default)]
struct RefreshSignal {
    notify: Notify,
    pending: AtomicBool,
}

impl RefreshSignal {
    /// Returns `false` when a refresh was already pending.
    fn request(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_one();
        true
    }

    async fn requested(&self) {
        self.notify.notified().await;
    }

    fn complete(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Cached,
    Updated,
    Discarded,
    /// Retry once after the given delay.
    RateLimited(Duration),
    Failed,
}

/// Subscriber-side handle of a running poller.
pub struct StreamHandle<T> {
    key: StreamKey,
    cache: Arc<SnapshotCache<T>>,
    state_rx: watch::Receiver<StreamState<T>>,
    refresh: Arc<RefreshSignal>,
    cancel: CancellationToken,
}

impl<T> Clone for StreamHandle<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            cache: Arc::clone(&self.cache),
            state_rx: self.state_rx.clone(),
            refresh: Arc::clone(&self.refresh),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> StreamHandle<T> {
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamState<T>> {
        self.state_rx.clone()
    }

    pub fn state(&self) -> StreamState<T> {
        self.state_rx.borrow().clone()
    }

    /// Invalidate the snapshot and fetch immediately.
    ///
    /// Concurrent calls result in a single fetch.
    pub fn refresh_now(&self) {
        self.cache.invalidate(&self.key);
        if !self.refresh.request() {
            debug!(stream = %self.key, "Refresh already pending");
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

pub struct StreamPoller<T> {
    descriptor: StreamDescriptor<T>,
    cache: Arc<SnapshotCache<T>>,
    dedup: Arc<FetchDeduplicator<T>>,
    backoff: Arc<BackoffController>,
    config: PollerConfig,
    state_tx: watch::Sender<StreamState<T>>,
    refresh: Arc<RefreshSignal>,
    cancel: CancellationToken,
    label: &'static str,
}

impl<T: Send + Sync + 'static> StreamPoller<T> {
    /// Pollers may share `cache` and `dedup` for the same key. A poller
    /// that joins a fetch whose starter was shut down fetches again
    /// itself.
    pub fn new(
        descriptor: StreamDescriptor<T>,
        cache: Arc<SnapshotCache<T>>,
        dedup: Arc<FetchDeduplicator<T>>,
        backoff: Arc<BackoffController>,
        config: PollerConfig,
        cancel: CancellationToken,
    ) -> (Self, StreamHandle<T>) {
        cache.register(descriptor.key.clone(), descriptor.ttl);

        let (state_tx, state_rx) = watch::channel(StreamState::default());
        let refresh = Arc::new(RefreshSignal::default());
        let handle = StreamHandle {
            key: descriptor.key.clone(),
            cache: Arc::clone(&cache),
            state_rx,
            refresh: Arc::clone(&refresh),
            cancel: cancel.clone(),
        };
        let label = descriptor.key.kind().map_or("other", |k| k.as_str());

        let poller = Self {
            descriptor,
            cache,
            dedup,
            backoff,
            config,
            state_tx,
            refresh,
            cancel,
            label,
        };
        (poller, handle)
    }

    /// Spawn the poll loop on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Poll until cancelled.
    pub async fn run(self) {
        let key = self.descriptor.key.clone();
        info!(
            stream = %key,
            interval_ms = self.descriptor.interval.as_millis() as u64,
            ttl_ms = self.descriptor.ttl.as_millis() as u64,
            "Stream poller started"
        );

        let mut ticker = tokio::time::interval(self.descriptor.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut retry_at: Option<Instant> = None;

        loop {
            let force = tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => false,
                _ = tokio::time::sleep_until(retry_at.unwrap_or_else(Instant::now)),
                    if retry_at.is_some() =>
                {
                    retry_at = None;
                    debug!(stream = %key, "Rate-limit retry due");
                    false
                }
                _ = self.refresh.requested() => true,
            };

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => break,
                outcome = self.poll_once(force) => outcome,
            };
            if force {
                self.refresh.complete();
            }
            match outcome {
                PollOutcome::RateLimited(delay) => retry_at = Some(Instant::now() + delay),
                PollOutcome::Updated | PollOutcome::Cached => retry_at = None,
                PollOutcome::Discarded | PollOutcome::Failed => {}
            }
        }

        info!(stream = %key, "Stream poller stopped");
    }

    async fn poll_once(&self, force: bool) -> PollOutcome {
        let key = &self.descriptor.key;

        if !force && self.cache.is_fresh(key) {
            debug!(stream = %key, "Snapshot fresh, skipping remote fetch");
            Metrics::stream_outcome(self.label, "cached");
            let data = self.cache.get(key).map(|s| s.value);
            self.state_tx.send_modify(|state| {
                if data.is_some() {
                    state.loading = false;
                }
                state.data = data;
                state.phase = PollerPhase::Idle;
            });
            return PollOutcome::Cached;
        }

        self.state_tx
            .send_modify(|state| state.phase = PollerPhase::Fetching);

        let mut result = self.fetch_and_store().await;
        if matches!(result, Err(SyncError::Cancelled(_))) && !self.cancel.is_cancelled() {
            debug!(stream = %key, "Joined fetch was dropped by a closed poller, fetching again");
            result = self.fetch_and_store().await;
        }

        match result {
            Ok(_) => {
                self.backoff.on_success(key);
                Metrics::stream_outcome(self.label, "updated");
                Metrics::stream_backoff(self.label, 0.0);
                let data = self.cache.get(key).map(|s| s.value);
                self.state_tx.send_modify(|state| {
                    state.data = data;
                    state.loading = false;
                    state.error = None;
                    state.phase = PollerPhase::Updated;
                });
                PollOutcome::Updated
            }
            Err(SyncError::Cancelled(_)) => {
                Metrics::stream_outcome(self.label, "discarded");
                PollOutcome::Discarded
            }
            Err(e) if e.is_rate_limited() => {
                let backoff = self.backoff.on_rate_limited(key);
                let delay = backoff.current_delay;
                Metrics::stream_outcome(self.label, "rate_limited");
                Metrics::stream_backoff(self.label, delay.as_millis() as f64);
                warn!(
                    stream = %key,
                    delay_ms = delay.as_millis() as u64,
                    consecutive = backoff.consecutive_failures,
                    "Rate limited, scheduling retry"
                );

                let surfaced = (backoff.consecutive_failures > self.config.max_silent_retries)
                    .then(|| SyncError::RateLimitPersisted {
                        retries: backoff.consecutive_failures,
                        last: match e {
                            SyncError::Fetch(inner) => inner,
                            other => caden_ledger::LedgerError::RateLimited(other.to_string()),
                        },
                    });
                self.state_tx.send_modify(|state| {
                    state.phase = PollerPhase::RateLimited;
                    if surfaced.is_some() {
                        state.loading = false;
                        state.error = surfaced;
                    }
                });
                PollOutcome::RateLimited(delay)
            }
            Err(e) => {
                self.backoff.on_other_error(key);
                Metrics::stream_outcome(self.label, "failed");
                warn!(stream = %key, error = %e, "Stream fetch failed, keeping last snapshot");
                self.state_tx.send_modify(|state| {
                    state.loading = false;
                    state.error = Some(e);
                    state.phase = PollerPhase::Failed;
                });
                PollOutcome::Failed
            }
        }
    }

    /// Deduplicated fetch that writes the cache exactly once on success.
    ///
    /// The write is skipped when the poller that started the fetch was
    /// torn down meanwhile.
    async fn fetch_and_store(&self) -> SyncResult<Arc<T>> {
        let key = self.descriptor.key.clone();
        let fetch = Arc::clone(&self.descriptor.fetch);
        let cache = Arc::clone(&self.cache);
        let cancel = self.cancel.clone();
        let label = self.label;

        self.dedup
            .run_exclusive(&self.descriptor.key, move || async move {
                let started = Instant::now();
                let value = Arc::new(fetch().await?);
                Metrics::stream_fetch_latency(label, started.elapsed().as_secs_f64() * 1000.0);

                if cancel.is_cancelled() {
                    debug!(stream = %key, "Poller closed, dropping fetch result");
                    return Err(SyncError::Cancelled(key));
                }
                cache.put_observed(&key, Arc::clone(&value), started);
                Ok(value)
            })
            .await
    }
}
