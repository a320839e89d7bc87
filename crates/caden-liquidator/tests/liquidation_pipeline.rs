//! Monitor driven by live pollers over the in-memory ledger.

mod common;

use std::sync::Arc;
use std::time::Duration;

use caden_core::{StreamKey, StreamKind};
use caden_ledger::{LedgerError, MockLedger, MockSigner, ProgramAddresses};
use caden_liquidator::{AccountState, LiquidationConfig, LiquidationExecutor, LiquidationMonitor};
use rust_decimal_macros::dec;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;

use common::{position, quote, spawn_streams};

fn executor(ledger: &Arc<MockLedger>, addresses: ProgramAddresses) -> LiquidationExecutor {
    LiquidationExecutor::new(
        ledger.clone(),
        Arc::new(MockSigner::new(Pubkey::new_unique())),
        addresses,
        Pubkey::new_unique(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_price_drop_liquidates_once() {
    let ledger = Arc::new(MockLedger::new());
    let healthy = position(dec!(1000));
    let account = healthy.address;
    ledger.set_positions(vec![healthy]);
    ledger.set_market(quote(dec!(10)));
    let cancel = CancellationToken::new();
    let streams = spawn_streams(&ledger, &cancel);

    let addresses = ProgramAddresses::derive(Pubkey::new_unique());
    let (monitor, handle) = LiquidationMonitor::new(
        LiquidationConfig::default(),
        streams.accounts.subscribe(&StreamKey::global(StreamKind::Accounts)),
        streams.market.subscribe(&StreamKey::global(StreamKind::Market)),
        Some(executor(&ledger, addresses.clone())),
        cancel.clone(),
    );
    monitor.spawn();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.account_state(&account), Some(AccountState::Healthy));

    // 5% drop: collateral 1000 - 50 = 950 -> 9500 bps, watching
    ledger.set_market(quote(dec!(9.5)));
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(handle.account_state(&account), Some(AccountState::Watching));
    assert!(ledger.submissions().is_empty());

    // 20% drop: 800 -> 8000 bps, below maintenance
    ledger.set_submit_delay(Duration::from_millis(900));
    ledger.set_market(quote(dec!(8)));
    tokio::time::sleep(Duration::from_millis(3000)).await;

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 1);
    let ix = &submissions[0][0];
    assert_eq!(ix.program_id, addresses.program_id);
    assert_eq!(ix.accounts[0].pubkey, account);
    assert_eq!(handle.account_state(&account), Some(AccountState::Liquidated));
    assert_eq!(handle.stats().confirmed, 1);
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_competing_liquidator_wins() {
    let ledger = Arc::new(MockLedger::new());
    let pos = position(dec!(100));
    let account = pos.address;
    ledger.set_positions(vec![pos.clone()]);
    ledger.set_market(quote(dec!(10)));
    ledger.set_submit_delay(Duration::from_millis(1000));
    ledger.fail_next_submit(LedgerError::Rejected("PositionAlreadyLiquidated".into()));
    let cancel = CancellationToken::new();
    let streams = spawn_streams(&ledger, &cancel);

    let (monitor, handle) = LiquidationMonitor::new(
        LiquidationConfig::default(),
        streams.accounts.subscribe(&StreamKey::global(StreamKind::Accounts)),
        streams.market.subscribe(&StreamKey::global(StreamKind::Market)),
        Some(executor(&ledger, ProgramAddresses::derive(Pubkey::new_unique()))),
        cancel.clone(),
    );
    monitor.spawn();

    // Someone else liquidates while our submission is out.
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(ledger.submissions().len(), 1);
    assert_eq!(handle.account_state(&account), Some(AccountState::Liquidating));
    let mut taken = pos;
    taken.liquidated = true;
    ledger.upsert_position(taken);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(ledger.submissions().len(), 1);
    assert_eq!(handle.account_state(&account), Some(AccountState::Liquidated));
    assert_eq!(handle.stats().failed, 1);
    cancel.cancel();
}
