//! Session wiring.
//!
//! One `SyncClient` owns every task of a session:
//! - stream pollers for position, market, holdings and accounts
//! - the derivation task recomputing `DerivedMetrics` on cache changes
//! - the liquidation monitor
//!
//! All consumers read the snapshot caches; nothing here keeps its own
//! copy of remote state.

use std::sync::Arc;
use std::time::Duration;

use caden_core::{
    derive_metrics, DerivedMetrics, LeveragedPosition, MarketQuote, PortfolioSummary,
    PositionHolding, StreamKey, StreamKind,
};
use caden_ledger::{
    Confirmation, DynReader, DynSigner, DynWriter, ProgramAddresses, RpcClient, RpcLedger,
};
use caden_liquidator::{LiquidationExecutor, LiquidationMonitor, LiquidatorStats, MonitorHandle};
use caden_sync::{
    BackoffController, FetchDeduplicator, PollerConfig, Snapshot, SnapshotCache,
    StreamDescriptor, StreamHandle, StreamPoller, StreamState,
};
use rust_decimal::Decimal;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, StreamConfig};
use crate::error::{AppError, AppResult};
use crate::signer::KeypairSigner;

/// Fallback TTL for keys nobody registered.
const DEFAULT_TTL: Duration = Duration::from_secs(2);

/// A stream's cache, shared by its poller and its readers.
struct Stream<T> {
    cache: Arc<SnapshotCache<T>>,
    handle: StreamHandle<T>,
}

impl<T> Stream<T> {
    fn subscribe_cache(&self) -> watch::Receiver<Option<Snapshot<T>>> {
        self.cache.subscribe(self.handle.key())
    }

    fn current(&self) -> Option<Arc<T>> {
        self.cache.get(self.handle.key()).map(|s| s.value)
    }
}

/// Spawns the pollers of one session with shared backoff.
struct StreamSpawner {
    backoff: Arc<BackoffController>,
    poller: PollerConfig,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamSpawner {
    fn spawn<T, F, Fut>(&mut self, key: StreamKey, config: StreamConfig, fetch: F) -> Stream<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = caden_ledger::LedgerResult<T>> + Send + 'static,
    {
        let cache = Arc::new(SnapshotCache::new(DEFAULT_TTL));
        let (poller, handle) = StreamPoller::new(
            StreamDescriptor::new(key, config.interval(), config.ttl(), fetch),
            Arc::clone(&cache),
            Arc::new(FetchDeduplicator::new()),
            Arc::clone(&self.backoff),
            self.poller,
            self.cancel.clone(),
        );
        self.tasks.push(poller.spawn());
        Stream { cache, handle }
    }
}

/// View-facing facade of one sync session.
pub struct SyncClient {
    owner: Pubkey,
    position: Stream<Option<LeveragedPosition>>,
    market: Stream<MarketQuote>,
    holdings: Stream<Vec<PositionHolding>>,
    accounts: Stream<Vec<LeveragedPosition>>,
    metrics: watch::Receiver<DerivedMetrics>,
    monitor: MonitorHandle,
    writer: DynWriter,
    signer: Option<DynSigner>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncClient {
    /// Connect to the configured RPC endpoint and start the session.
    pub fn connect(config: &AppConfig) -> AppResult<Self> {
        let addresses = ProgramAddresses::derive(config.program_id()?);
        let ledger = Arc::new(RpcLedger::new(RpcClient::new(&config.rpc_url)?, addresses));

        let signer: Option<DynSigner> = match &config.keypair_path {
            Some(path) => Some(Arc::new(KeypairSigner::from_file(path)?)),
            None => None,
        };

        info!(
            rpc_url = %config.rpc_url,
            program_id = %config.program_id,
            watch_only = signer.is_none(),
            "Connecting sync client"
        );
        Self::start(config, ledger.clone(), ledger, signer)
    }

    /// Start the session against explicit ledger seams.
    pub fn start(
        config: &AppConfig,
        reader: DynReader,
        writer: DynWriter,
        signer: Option<DynSigner>,
    ) -> AppResult<Self> {
        config.validate()?;
        let owner = match (config.owner()?, &signer) {
            (Some(owner), _) => owner,
            (None, Some(signer)) => signer.identity(),
            (None, None) => {
                return Err(AppError::Config(
                    "Either owner or keypair_path must be set".to_string(),
                ))
            }
        };

        let cancel = CancellationToken::new();
        let mut spawner = StreamSpawner {
            backoff: Arc::new(BackoffController::new(config.backoff.policy())),
            poller: config.backoff.poller(),
            cancel: cancel.clone(),
            tasks: Vec::new(),
        };
        let streams = &config.streams;

        let position = {
            let reader = Arc::clone(&reader);
            spawner.spawn(
                StreamKey::scoped(StreamKind::Position, owner),
                streams.position,
                move || {
                    let reader = Arc::clone(&reader);
                    async move { reader.position(owner).await }
                },
            )
        };
        let market = {
            let reader = Arc::clone(&reader);
            spawner.spawn(
                StreamKey::global(StreamKind::Market),
                streams.market,
                move || {
                    let reader = Arc::clone(&reader);
                    async move { reader.market().await }
                },
            )
        };
        let holdings = {
            let reader = Arc::clone(&reader);
            spawner.spawn(
                StreamKey::scoped(StreamKind::Holdings, owner),
                streams.holdings,
                move || {
                    let reader = Arc::clone(&reader);
                    async move { reader.holdings(owner).await }
                },
            )
        };
        let accounts = {
            let reader = Arc::clone(&reader);
            spawner.spawn(
                StreamKey::global(StreamKind::Accounts),
                streams.accounts,
                move || {
                    let reader = Arc::clone(&reader);
                    async move { reader.all_positions().await }
                },
            )
        };

        let threshold = config.liquidation.maintenance_threshold_bps;
        let (metrics_tx, metrics) = watch::channel(DerivedMetrics::default());
        spawner.tasks.push(tokio::spawn(derive_loop(
            position.subscribe_cache(),
            market.subscribe_cache(),
            holdings.subscribe_cache(),
            metrics_tx,
            threshold,
            cancel.clone(),
        )));

        let executor = match &signer {
            Some(signer) => Some(LiquidationExecutor::new(
                Arc::clone(&writer),
                Arc::clone(signer),
                ProgramAddresses::derive(config.program_id()?),
                config.usdc_mint()?,
            )),
            None => None,
        };
        let (monitor, monitor_handle) = LiquidationMonitor::new(
            config.liquidation.clone(),
            accounts.subscribe_cache(),
            market.subscribe_cache(),
            executor,
            cancel.clone(),
        );
        spawner.tasks.push(monitor.spawn());

        info!(owner = %owner, tasks = spawner.tasks.len(), "Sync client started");
        Ok(Self {
            owner,
            position,
            market,
            holdings,
            accounts,
            metrics,
            monitor: monitor_handle,
            writer,
            signer,
            cancel,
            tasks: spawner.tasks,
        })
    }

    pub fn owner(&self) -> Pubkey {
        self.owner
    }

    pub fn position(&self) -> watch::Receiver<StreamState<Option<LeveragedPosition>>> {
        self.position.handle.subscribe()
    }

    pub fn market(&self) -> watch::Receiver<StreamState<MarketQuote>> {
        self.market.handle.subscribe()
    }

    pub fn holdings(&self) -> watch::Receiver<StreamState<Vec<PositionHolding>>> {
        self.holdings.handle.subscribe()
    }

    /// Derived figures, recomputed on every position/market/holdings write.
    pub fn metrics(&self) -> watch::Receiver<DerivedMetrics> {
        self.metrics.clone()
    }

    /// Portfolio summary of the current holdings snapshot.
    pub fn portfolio(&self) -> PortfolioSummary {
        let holdings = self.holdings.current();
        let market = self.market.current();
        PortfolioSummary::from_holdings(
            holdings.as_deref().map_or(&[][..], Vec::as_slice),
            market.as_deref(),
        )
    }

    pub fn liquidator_stats(&self) -> LiquidatorStats {
        self.monitor.stats()
    }

    pub fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    /// Number of leveraged positions in the current accounts snapshot.
    pub fn watched_accounts(&self) -> usize {
        self.accounts.current().map_or(0, |a| a.len())
    }

    /// Invalidate `stream` and fetch it now.
    pub fn refresh_now(&self, stream: StreamKind) {
        debug!(stream = %stream, "Refresh requested");
        match stream {
            StreamKind::Position => self.position.handle.refresh_now(),
            StreamKind::Market => self.market.handle.refresh_now(),
            StreamKind::Holdings => self.holdings.handle.refresh_now(),
            StreamKind::Accounts => self.accounts.handle.refresh_now(),
        }
    }

    /// Sign and submit an opaque instruction.
    pub async fn place_instruction(&self, instruction: Instruction) -> AppResult<Confirmation> {
        let signer = self.signer.clone().ok_or(AppError::WatchOnly)?;
        let confirmation = self.writer.submit(vec![instruction], signer).await?;
        info!(signature = %confirmation.signature, slot = confirmation.slot, "Instruction confirmed");
        Ok(confirmation)
    }

    /// Stop every task. In-flight fetches finish without writing.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Task ended abnormally during shutdown");
            }
        }
        info!("Sync client stopped");
    }
}

async fn derive_loop(
    mut position: watch::Receiver<Option<Snapshot<Option<LeveragedPosition>>>>,
    mut market: watch::Receiver<Option<Snapshot<MarketQuote>>>,
    mut holdings: watch::Receiver<Option<Snapshot<Vec<PositionHolding>>>>,
    tx: watch::Sender<DerivedMetrics>,
    maintenance_threshold_bps: Decimal,
    cancel: CancellationToken,
) {
    loop {
        let p = position.borrow_and_update().as_ref().map(|s| Arc::clone(&s.value));
        let m = market.borrow_and_update().as_ref().map(|s| Arc::clone(&s.value));
        let h = holdings.borrow_and_update().as_ref().map(|s| Arc::clone(&s.value));

        let metrics = derive_metrics(
            p.as_deref().and_then(Option::as_ref),
            h.as_deref().map_or(&[][..], Vec::as_slice),
            m.as_deref(),
            maintenance_threshold_bps,
        );
        tx.send_if_modified(|current| {
            if *current == metrics {
                return false;
            }
            debug!(
                unrealized_pnl = %metrics.unrealized_pnl,
                realized_pnl = %metrics.realized_pnl,
                spread_bps = ?metrics.spread_bps,
                health_bps = ?metrics.health_ratio,
                "Derived metrics updated"
            );
            *current = metrics;
            true
        });

        let changed = tokio::select! {
            _ = cancel.cancelled() => break,
            r = position.changed() => r,
            r = market.changed() => r,
            r = holdings.changed() => r,
        };
        if changed.is_err() {
            break;
        }
    }
}
