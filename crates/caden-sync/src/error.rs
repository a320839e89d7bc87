//! Sync error types.

use caden_core::StreamKey;
use caden_ledger::LedgerError;
use thiserror::Error;

/// Errors published to stream subscribers.
///
/// `Clone` so a single deduplicated failure reaches every joined caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] LedgerError),

    #[error("Still rate limited after {retries} retries: {last}")]
    RateLimitPersisted { retries: u32, last: LedgerError },

    #[error("Fetch task aborted: {0}")]
    TaskAborted(String),

    #[error("Stream {0} closed before the fetch completed")]
    Cancelled(StreamKey),
}

impl SyncError {
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_rate_limited(),
            Self::RateLimitPersisted { .. } => true,
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
