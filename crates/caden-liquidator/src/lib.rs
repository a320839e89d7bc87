//! Liquidation monitor for the Caden sync client.
//!
//! Watches every leveraged position of the program through the shared
//! snapshot cache, evaluates its health against the market snapshot and
//! submits `liquidate_position` once an account falls below the
//! maintenance threshold. At most one submission per account is ever in
//! flight.

pub mod config;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod state;

pub use config::LiquidationConfig;
pub use error::{LiquidatorError, LiquidatorResult};
pub use executor::LiquidationExecutor;
pub use monitor::{LiquidationMonitor, MonitorHandle};
pub use state::{AccountState, LiquidationDecision, LiquidatorStats};
