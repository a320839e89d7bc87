//! Liquidation monitor loop.
//!
//! Every `check_interval_ms` the monitor reads the accounts and market
//! snapshots from the cache, evaluates each open position and submits a
//! liquidation for any account below the maintenance threshold.
//!
//! Duplicate protection: an account enters the local in-flight set BEFORE
//! its submission is spawned and leaves it only when the submission's
//! outcome comes back on the outcome channel. The loop owns all state, so
//! the check-and-insert cannot race with another tick.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use caden_core::{LeveragedPosition, MarketQuote, PositionHealth};
use caden_ledger::Confirmation;
use caden_sync::Snapshot;
use caden_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::LiquidationConfig;
use crate::error::{LiquidatorError, LiquidatorResult};
use crate::executor::LiquidationExecutor;
use crate::state::{AccountState, LiquidationDecision, LiquidatorStats};

type AccountsRx = watch::Receiver<Option<Snapshot<Vec<LeveragedPosition>>>>;
type MarketRx = watch::Receiver<Option<Snapshot<MarketQuote>>>;

const OUTCOME_CHANNEL_CAPACITY: usize = 64;

struct SubmissionOutcome {
    decision: LiquidationDecision,
    result: LiquidatorResult<Confirmation>,
}

/// Read-only view of a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    stats: watch::Receiver<LiquidatorStats>,
    accounts: watch::Receiver<HashMap<Pubkey, AccountState>>,
}

impl MonitorHandle {
    pub fn stats(&self) -> LiquidatorStats {
        *self.stats.borrow()
    }

    pub fn account_state(&self, account: &Pubkey) -> Option<AccountState> {
        self.accounts.borrow().get(account).copied()
    }

    pub fn subscribe_accounts(&self) -> watch::Receiver<HashMap<Pubkey, AccountState>> {
        self.accounts.clone()
    }
}

pub struct LiquidationMonitor {
    config: LiquidationConfig,
    positions: AccountsRx,
    market: MarketRx,
    /// `None` in watch-only sessions: evaluate, never submit.
    executor: Option<LiquidationExecutor>,
    states: HashMap<Pubkey, AccountState>,
    in_flight: HashSet<Pubkey>,
    stats: LiquidatorStats,
    stats_tx: watch::Sender<LiquidatorStats>,
    accounts_tx: watch::Sender<HashMap<Pubkey, AccountState>>,
    cancel: CancellationToken,
}

impl LiquidationMonitor {
    #[must_use]
    pub fn new(
        config: LiquidationConfig,
        positions: AccountsRx,
        market: MarketRx,
        executor: Option<LiquidationExecutor>,
        cancel: CancellationToken,
    ) -> (Self, MonitorHandle) {
        let (stats_tx, stats_rx) = watch::channel(LiquidatorStats::default());
        let (accounts_tx, accounts_rx) = watch::channel(HashMap::new());
        let monitor = Self {
            config,
            positions,
            market,
            executor,
            states: HashMap::new(),
            in_flight: HashSet::new(),
            stats: LiquidatorStats::default(),
            stats_tx,
            accounts_tx,
            cancel,
        };
        let handle = MonitorHandle {
            stats: stats_rx,
            accounts: accounts_rx,
        };
        (monitor, handle)
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        if !self.config.enabled {
            info!("LiquidationMonitor disabled");
            return;
        }

        info!(
            maintenance_threshold_bps = %self.config.maintenance_threshold_bps,
            watch_threshold_bps = %self.config.watch_threshold_bps,
            check_interval_ms = self.config.check_interval_ms,
            submit_enabled = self.executor.is_some(),
            "LiquidationMonitor started"
        );

        let (outcome_tx, mut outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.check_interval_ms));

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.tick(&outcome_tx),
                Some(outcome) = outcome_rx.recv() => self.on_outcome(outcome),
            }
        }

        info!(
            submitted = self.stats.submitted,
            confirmed = self.stats.confirmed,
            failed = self.stats.failed,
            "LiquidationMonitor stopped"
        );
    }

    fn tick(&mut self, outcome_tx: &mpsc::Sender<SubmissionOutcome>) {
        let Some(positions) = self
            .positions
            .borrow()
            .as_ref()
            .map(|s| Arc::clone(&s.value))
        else {
            return;
        };
        let price = self
            .market
            .borrow()
            .as_ref()
            .and_then(|s| s.value.near_price);

        // Accounts gone from the snapshot are resolved, unless a submission
        // for them is still out.
        let present: HashSet<Pubkey> = positions.iter().map(|p| p.address).collect();
        self.states.retain(|account, _| {
            let keep = present.contains(account) || self.in_flight.contains(account);
            if !keep {
                Metrics::forget_account(&account.to_string());
            }
            keep
        });

        for position in positions.iter() {
            let account = position.address;
            if self.in_flight.contains(&account) {
                continue;
            }

            if position.liquidated {
                if self.states.insert(account, AccountState::Liquidated)
                    != Some(AccountState::Liquidated)
                {
                    info!(account = %account, "Account observed liquidated, no longer watching");
                    Metrics::forget_account(&account.to_string());
                }
                continue;
            }
            if self.states.get(&account) == Some(&AccountState::Liquidated) {
                continue;
            }

            // Unknown price or out-of-range health never triggers.
            let Some(health) =
                PositionHealth::evaluate(position, price, self.config.maintenance_threshold_bps)
            else {
                continue;
            };
            Metrics::account_health(
                &account.to_string(),
                health.health_ratio_bps.to_f64().unwrap_or_default(),
            );

            if health.needs_liquidation {
                self.trigger(position, health.health_ratio_bps, outcome_tx);
                continue;
            }

            let next = if health.health_ratio_bps < self.config.watch_threshold_bps {
                AccountState::Watching
            } else {
                AccountState::Healthy
            };
            if self.states.insert(account, next) != Some(next) {
                debug!(
                    account = %account,
                    health_bps = %health.health_ratio_bps,
                    state = next.as_str(),
                    "Account state changed"
                );
            }
        }

        self.publish();
    }

    fn trigger(
        &mut self,
        position: &LeveragedPosition,
        health_bps: Decimal,
        outcome_tx: &mpsc::Sender<SubmissionOutcome>,
    ) {
        let account = position.address;
        let Some(executor) = self.executor.clone() else {
            if self.states.insert(account, AccountState::Watching) != Some(AccountState::Watching)
            {
                info!(
                    account = %account,
                    health_bps = %health_bps,
                    "Account below maintenance threshold (watch-only, not submitting)"
                );
            }
            return;
        };

        let decision = LiquidationDecision {
            account,
            triggered_at: Instant::now(),
            health_ratio_at_trigger: health_bps,
        };

        // Mark in flight BEFORE spawning to prevent duplicates
        self.in_flight.insert(account);
        self.states.insert(account, AccountState::Liquidating);
        self.stats.submitted += 1;
        Metrics::liquidation("submitted");
        info!(
            account = %account,
            owner = %position.owner,
            health_bps = %health_bps,
            "Submitting liquidation"
        );

        let position = position.clone();
        let outcome_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let submission = tokio::spawn(async move { executor.execute(&position).await });
            let result = submission
                .await
                .unwrap_or_else(|e| Err(LiquidatorError::TaskAborted(e.to_string())));
            // Receiver gone means the monitor stopped; nothing to record.
            let _ = outcome_tx.send(SubmissionOutcome { decision, result }).await;
        });
    }

    fn on_outcome(&mut self, outcome: SubmissionOutcome) {
        let SubmissionOutcome { decision, result } = outcome;
        let account = decision.account;
        self.in_flight.remove(&account);
        let elapsed_ms = decision.triggered_at.elapsed().as_millis() as u64;

        match result {
            Ok(confirmation) => {
                self.states.insert(account, AccountState::Liquidated);
                self.stats.confirmed += 1;
                Metrics::liquidation("confirmed");
                Metrics::forget_account(&account.to_string());
                info!(
                    account = %account,
                    signature = %confirmation.signature,
                    slot = confirmation.slot,
                    health_bps = %decision.health_ratio_at_trigger,
                    elapsed_ms,
                    "Liquidation confirmed"
                );
            }
            Err(e) => {
                self.states.insert(account, AccountState::Watching);
                self.stats.failed += 1;
                Metrics::liquidation("failed");
                warn!(
                    account = %account,
                    error = %e,
                    elapsed_ms,
                    "Liquidation failed, re-evaluating next tick"
                );
            }
        }

        self.publish();
    }

    fn publish(&self) {
        self.stats_tx.send_replace(self.stats);
        self.accounts_tx.send_replace(self.states.clone());
    }
}
