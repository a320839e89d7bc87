//! Liquidator error types.

use caden_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiquidatorError {
    #[error("Liquidation submission failed: {0}")]
    Submission(#[from] LedgerError),

    #[error("Submission task aborted: {0}")]
    TaskAborted(String),
}

pub type LiquidatorResult<T> = Result<T, LiquidatorError>;
