//! Caden sync client.
//!
//! Wires the stream pollers, the derivation of view figures and the
//! liquidation monitor into one session:
//! - `AppConfig`: TOML configuration
//! - `SyncClient`: view-facing facade (subscribe, refresh now, place instruction)
//! - `KeypairSigner`: keypair-file credential for the binary

pub mod app;
pub mod config;
pub mod error;
pub mod signer;

pub use app::SyncClient;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use signer::KeypairSigner;
