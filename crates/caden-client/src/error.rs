//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] caden_ledger::LedgerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] caden_telemetry::TelemetryError),

    #[error("Session is watch-only: no keypair configured")]
    WatchOnly,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
