//! Prometheus metrics and structured logging for the Caden sync client.
//!
//! - Prometheus metrics for stream fetches, backoff and liquidations
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat};
pub use metrics::Metrics;
