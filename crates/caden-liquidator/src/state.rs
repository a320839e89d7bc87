//! Per-account liquidation state.

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tokio::time::Instant;

/// Lifecycle of one watched account.
///
/// ```text
/// Healthy <-> Watching -> Liquidating -> Liquidated
///                ^             |
///                +-- failure --+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountState {
    Healthy,
    Watching,
    Liquidating,
    Liquidated,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Watching => "watching",
            Self::Liquidating => "liquidating",
            Self::Liquidated => "liquidated",
        }
    }
}

/// Produced the instant an account crosses the maintenance threshold and
/// consumed by the submission that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationDecision {
    pub account: Pubkey,
    pub triggered_at: Instant,
    pub health_ratio_at_trigger: Decimal,
}

/// Running liquidation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiquidatorStats {
    pub submitted: u64,
    pub confirmed: u64,
    pub failed: u64,
}
