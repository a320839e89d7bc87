//! In-memory ledger and signer for tests.
//!
//! `MockLedger` serves scripted state, can inject failures per stream and
//! counts every read, so callers can assert on exactly how many remote
//! calls were made.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use caden_core::{LeveragedPosition, MarketQuote, PositionHolding, StreamKind};
use parking_lot::Mutex;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Confirmation, LedgerReader, LedgerWriter};
use crate::signer::{
    BoxFuture, DynSigner, SignedTransaction, TransactionSigner, UnsignedTransaction,
};

#[derive(Debug, Default)]
pub struct MockLedger {
    positions: Mutex<Vec<LeveragedPosition>>,
    market: Mutex<MarketQuote>,
    holdings: Mutex<HashMap<Pubkey, Vec<PositionHolding>>>,
    read_failures: Mutex<HashMap<StreamKind, VecDeque<LedgerError>>>,
    read_calls: Mutex<HashMap<StreamKind, usize>>,
    read_delay: Mutex<Duration>,
    submissions: Mutex<Vec<Vec<Instruction>>>,
    submit_failures: Mutex<VecDeque<LedgerError>>,
    submit_delay: Mutex<Duration>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_positions(&self, positions: Vec<LeveragedPosition>) {
        *self.positions.lock() = positions;
    }

    /// Replace the position at `position.address`, or add it.
    pub fn upsert_position(&self, position: LeveragedPosition) {
        let mut positions = self.positions.lock();
        match positions.iter_mut().find(|p| p.address == position.address) {
            Some(existing) => *existing = position,
            None => positions.push(position),
        }
    }

    pub fn set_market(&self, quote: MarketQuote) {
        *self.market.lock() = quote;
    }

    pub fn set_holdings(&self, owner: Pubkey, holdings: Vec<PositionHolding>) {
        self.holdings.lock().insert(owner, holdings);
    }

    /// Queue an error returned by the next read of `kind`.
    pub fn fail_next_read(&self, kind: StreamKind, error: LedgerError) {
        self.read_failures
            .lock()
            .entry(kind)
            .or_default()
            .push_back(error);
    }

    /// Delay every read, to hold fetches in flight.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    pub fn read_calls(&self, kind: StreamKind) -> usize {
        self.read_calls.lock().get(&kind).copied().unwrap_or(0)
    }

    /// Queue an error returned by the next submission.
    pub fn fail_next_submit(&self, error: LedgerError) {
        self.submit_failures.lock().push_back(error);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock() = delay;
    }

    pub fn submissions(&self) -> Vec<Vec<Instruction>> {
        self.submissions.lock().clone()
    }

    async fn read<T>(&self, kind: StreamKind, value: impl FnOnce() -> T) -> LedgerResult<T> {
        *self.read_calls.lock().entry(kind).or_default() += 1;
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failure = self
            .read_failures
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(e) => Err(e),
            None => Ok(value()),
        }
    }

    /// A confirmed submission marks its first account (the position) as
    /// liquidated, the way the program would.
    async fn record_submit(&self, instructions: Vec<Instruction>) -> LedgerResult<Confirmation> {
        let n = {
            let mut submissions = self.submissions.lock();
            submissions.push(instructions.clone());
            submissions.len()
        };
        let delay = *self.submit_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.submit_failures.lock().pop_front() {
            return Err(e);
        }

        let targets: Vec<Pubkey> = instructions
            .iter()
            .filter_map(|ix| ix.accounts.first().map(|m| m.pubkey))
            .collect();
        for p in self.positions.lock().iter_mut() {
            if targets.contains(&p.address) {
                p.liquidated = true;
            }
        }

        Ok(Confirmation {
            signature: format!("mock-sig-{n}"),
            slot: n as u64,
        })
    }
}

impl LedgerReader for MockLedger {
    fn position(&self, owner: Pubkey) -> BoxFuture<'_, LedgerResult<Option<LeveragedPosition>>> {
        Box::pin(self.read(StreamKind::Position, move || {
            self.positions
                .lock()
                .iter()
                .find(|p| p.owner == owner)
                .cloned()
        }))
    }

    fn market(&self) -> BoxFuture<'_, LedgerResult<MarketQuote>> {
        Box::pin(self.read(StreamKind::Market, || self.market.lock().clone()))
    }

    fn holdings(&self, owner: Pubkey) -> BoxFuture<'_, LedgerResult<Vec<PositionHolding>>> {
        Box::pin(self.read(StreamKind::Holdings, move || {
            self.holdings
                .lock()
                .get(&owner)
                .cloned()
                .unwrap_or_default()
        }))
    }

    fn all_positions(&self) -> BoxFuture<'_, LedgerResult<Vec<LeveragedPosition>>> {
        Box::pin(self.read(StreamKind::Accounts, || self.positions.lock().clone()))
    }
}

impl LedgerWriter for MockLedger {
    fn submit(
        &self,
        instructions: Vec<Instruction>,
        _signer: DynSigner,
    ) -> BoxFuture<'_, LedgerResult<Confirmation>> {
        Box::pin(self.record_submit(instructions))
    }
}

/// Signer that produces deterministic fake signatures.
#[derive(Debug)]
pub struct MockSigner {
    identity: Pubkey,
    signed: AtomicUsize,
}

impl MockSigner {
    pub fn new(identity: Pubkey) -> Self {
        Self {
            identity,
            signed: AtomicUsize::new(0),
        }
    }

    pub fn signed_count(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }
}

impl TransactionSigner for MockSigner {
    fn identity(&self) -> Pubkey {
        self.identity
    }

    fn sign(&self, tx: UnsignedTransaction) -> BoxFuture<'_, LedgerResult<SignedTransaction>> {
        Box::pin(async move {
            let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SignedTransaction {
                signature: format!("mock-{n}"),
                wire: tx.recent_blockhash.to_bytes().to_vec(),
            })
        })
    }
}
