//! Liquidation monitor configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationConfig {
    /// Whether the monitor runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tick interval (ms). One ledger slot by default.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Health below this (bps) triggers liquidation. At the threshold is healthy.
    #[serde(default = "default_maintenance_threshold_bps")]
    pub maintenance_threshold_bps: Decimal,
    /// Health below this (bps) is tracked as `Watching`.
    #[serde(default = "default_watch_threshold_bps")]
    pub watch_threshold_bps: Decimal,
}

fn default_enabled() -> bool {
    true
}

fn default_check_interval_ms() -> u64 {
    400
}

fn default_maintenance_threshold_bps() -> Decimal {
    Decimal::from(9000)
}

fn default_watch_threshold_bps() -> Decimal {
    Decimal::from(10000)
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            check_interval_ms: default_check_interval_ms(),
            maintenance_threshold_bps: default_maintenance_threshold_bps(),
            watch_threshold_bps: default_watch_threshold_bps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = LiquidationConfig::default();
        assert!(config.enabled);
        assert_eq!(config.check_interval_ms, 400);
        assert_eq!(config.maintenance_threshold_bps, dec!(9000));
        assert_eq!(config.watch_threshold_bps, dec!(10000));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: LiquidationConfig = toml::from_str("maintenance_threshold_bps = 8500").unwrap();
        assert_eq!(config.maintenance_threshold_bps, dec!(8500));
        assert_eq!(config.check_interval_ms, 400);
        assert!(config.enabled);
    }
}
