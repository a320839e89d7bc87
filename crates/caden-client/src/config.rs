//! Application configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use caden_liquidator::LiquidationConfig;
use caden_sync::{BackoffPolicy, PollerConfig};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{AppError, AppResult};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CADEN_CONFIG";

/// Config file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Polling policy of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub interval_ms: u64,
    pub ttl_ms: u64,
}

impl StreamConfig {
    pub const fn new(interval_ms: u64, ttl_ms: u64) -> Self {
        Self {
            interval_ms,
            ttl_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// Watched owner's leveraged position.
    #[serde(default = "default_position_stream")]
    pub position: StreamConfig,
    #[serde(default = "default_market_stream")]
    pub market: StreamConfig,
    /// Watched owner's settlement instruments.
    #[serde(default = "default_holdings_stream")]
    pub holdings: StreamConfig,
    /// Every leveraged position of the program, for the liquidation monitor.
    /// Default: one ledger slot.
    #[serde(default = "default_accounts_stream")]
    pub accounts: StreamConfig,
}

fn default_position_stream() -> StreamConfig {
    StreamConfig::new(5000, 200)
}

fn default_market_stream() -> StreamConfig {
    StreamConfig::new(5000, 2000)
}

fn default_holdings_stream() -> StreamConfig {
    StreamConfig::new(5000, 2000)
}

fn default_accounts_stream() -> StreamConfig {
    StreamConfig::new(400, 200)
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            position: default_position_stream(),
            market: default_market_stream(),
            holdings: default_holdings_stream(),
            accounts: default_accounts_stream(),
        }
    }
}

/// Rate-limit backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive rate limits tolerated before the stream reports an error.
    /// Retrying continues either way.
    #[serde(default = "default_max_silent_retries")]
    pub max_silent_retries: u32,
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10000
}

fn default_max_silent_retries() -> u32 {
    3
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_silent_retries: default_max_silent_retries(),
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            max_silent_retries: self.max_silent_retries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info,caden=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint of the ledger.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Settlement program id (base58).
    #[serde(default = "default_program_id")]
    pub program_id: String,
    /// Wallet whose position and holdings are watched. Defaults to the
    /// keypair's identity.
    #[serde(default)]
    pub owner: Option<String>,
    /// Keypair file. Without one the session is watch-only.
    #[serde(default)]
    pub keypair_path: Option<String>,
    /// Collateral mint (base58).
    #[serde(default = "default_usdc_mint")]
    pub usdc_mint: String,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub liquidation: LiquidationConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_rpc_url() -> String {
    "https://api.devnet.solana.com".to_string()
}

fn default_program_id() -> String {
    "3ZstoPk7ho2fAyotF3NTKFjJESr21qAjNXQuVaGSpQ5L".to_string()
}

fn default_usdc_mint() -> String {
    "HxkoRFKoM7kP2gFBbzDodB3nBji3KQ939wjJ5ZEC1B54".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            program_id: default_program_id(),
            owner: None,
            keypair_path: None,
            usdc_mint: default_usdc_mint(),
            streams: StreamsConfig::default(),
            backoff: BackoffConfig::default(),
            liquidation: LiquidationConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

fn parse_pubkey(field: &str, value: &str) -> AppResult<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| AppError::Config(format!("Invalid {field} '{value}': {e}")))
}

impl AppConfig {
    /// Resolve the config path: CLI arg > `CADEN_CONFIG` > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unparsable addresses and zero intervals up front.
    pub fn validate(&self) -> AppResult<()> {
        self.program_id()?;
        self.usdc_mint()?;
        self.owner()?;

        let streams = &self.streams;
        for (name, stream) in [
            ("position", streams.position),
            ("market", streams.market),
            ("holdings", streams.holdings),
            ("accounts", streams.accounts),
        ] {
            if stream.interval_ms == 0 {
                return Err(AppError::Config(format!(
                    "streams.{name}.interval_ms must be positive"
                )));
            }
        }
        if self.liquidation.check_interval_ms == 0 {
            return Err(AppError::Config(
                "liquidation.check_interval_ms must be positive".to_string(),
            ));
        }
        if self.backoff.base_delay_ms > self.backoff.max_delay_ms {
            return Err(AppError::Config(
                "backoff.base_delay_ms exceeds backoff.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn program_id(&self) -> AppResult<Pubkey> {
        parse_pubkey("program_id", &self.program_id)
    }

    pub fn usdc_mint(&self) -> AppResult<Pubkey> {
        parse_pubkey("usdc_mint", &self.usdc_mint)
    }

    pub fn owner(&self) -> AppResult<Option<Pubkey>> {
        self.owner
            .as_deref()
            .map(|o| parse_pubkey("owner", o))
            .transpose()
    }
}
