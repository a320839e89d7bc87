//! Shared fixtures for liquidator integration tests.

use std::sync::Arc;
use std::time::Duration;

use caden_core::{Amount, LeveragedPosition, MarketQuote, PositionSide, Price, StreamKey, StreamKind};
use caden_ledger::{LedgerReader, MockLedger};
use caden_sync::{
    BackoffController, FetchDeduplicator, PollerConfig, SnapshotCache, StreamDescriptor,
    StreamPoller,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;

pub fn position(collateral: Decimal) -> LeveragedPosition {
    LeveragedPosition {
        address: Pubkey::new_unique(),
        owner: Pubkey::new_unique(),
        side: PositionSide::Long,
        size: Amount::new(dec!(1000)),
        entry_price: Price::new(dec!(10)),
        cfd_tokens: Amount::new(dec!(1000)),
        leverage: 10,
        collateral: Amount::new(collateral),
        liquidated: false,
        liquidated_slot: 0,
    }
}

pub fn quote(near: Decimal) -> MarketQuote {
    MarketQuote {
        near_price: Some(Price::new(near)),
        ..Default::default()
    }
}

/// Caches fed by real pollers over the in-memory ledger.
pub struct Streams {
    pub accounts: Arc<SnapshotCache<Vec<LeveragedPosition>>>,
    pub market: Arc<SnapshotCache<MarketQuote>>,
}

pub fn spawn_streams(ledger: &Arc<MockLedger>, cancel: &CancellationToken) -> Streams {
    let backoff = Arc::new(BackoffController::default());

    let accounts = Arc::new(SnapshotCache::new(Duration::from_millis(200)));
    let reader = Arc::clone(ledger);
    let (poller, _) = StreamPoller::new(
        StreamDescriptor::new(
            StreamKey::global(StreamKind::Accounts),
            Duration::from_millis(400),
            Duration::from_millis(200),
            move || {
                let reader = Arc::clone(&reader);
                async move { reader.all_positions().await }
            },
        ),
        Arc::clone(&accounts),
        Arc::new(FetchDeduplicator::new()),
        Arc::clone(&backoff),
        PollerConfig::default(),
        cancel.clone(),
    );
    poller.spawn();

    let market = Arc::new(SnapshotCache::new(Duration::from_millis(2000)));
    let reader = Arc::clone(ledger);
    let (poller, _) = StreamPoller::new(
        StreamDescriptor::new(
            StreamKey::global(StreamKind::Market),
            Duration::from_millis(1000),
            Duration::from_millis(1000),
            move || {
                let reader = Arc::clone(&reader);
                async move { reader.market().await }
            },
        ),
        Arc::clone(&market),
        Arc::new(FetchDeduplicator::new()),
        backoff,
        PollerConfig::default(),
        cancel.clone(),
    );
    poller.spawn();

    Streams { accounts, market }
}
