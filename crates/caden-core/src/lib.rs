//! Core domain types for the Caden sync client.
//!
//! This crate provides the types every other crate exchanges:
//! - `Price`, `Amount`: precision-safe fixed-point numerics
//! - `StreamKey`, `StreamKind`: identifiers for independently polled state
//! - `PositionHolding`, `LeveragedPosition`, `MarketQuote`: decoded ledger entities
//! - `derivation`: pure P&L, spread and health computations

pub mod decimal;
pub mod derivation;
pub mod error;
pub mod portfolio;
pub mod stream;
pub mod types;

pub use decimal::{Amount, Price, FIXED_POINT_DECIMALS};
pub use derivation::{
    derive_metrics, health_ratio, spread_bps, unrealized_pnl, DerivedMetrics, Pnl, PositionHealth,
};
pub use error::{CoreError, Result};
pub use portfolio::PortfolioSummary;
pub use stream::{StreamKey, StreamKind};
pub use types::{
    AssetPrice, AssetType, LeveragedPosition, MarketQuote, MarketStatus, PositionHolding,
    PositionSide, PriceSource,
};
