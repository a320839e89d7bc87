//! Ledger boundary error types.
//!
//! Variants map onto the recovery classes the sync layer distinguishes:
//! rate limiting, transient transport faults, malformed data and
//! rejected submissions. All payloads are strings so one failure can be
//! cloned out to every caller that joined the same request.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Confirmation timed out: {0}")]
    ConfirmationTimeout(String),

    #[error("Signer error: {0}")]
    Signer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LedgerError {
    /// Classify a JSON-RPC error object.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        if code == 429 || code == -32429 || is_rate_limit_text(&message) {
            Self::RateLimited(format!("{code}: {message}"))
        } else {
            Self::Rpc { code, message }
        }
    }

    /// Classify a non-success HTTP response.
    pub fn from_http(status: u16, body: &str) -> Self {
        if status == 429 || is_rate_limit_text(body) {
            Self::RateLimited(format!("HTTP {status}: {body}"))
        } else {
            Self::Transport(format!("HTTP {status}: {body}"))
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Failures of a submitted instruction (as opposed to reads).
    #[must_use]
    pub fn is_submission_failure(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::ConfirmationTimeout(_))
    }
}

fn is_rate_limit_text(text: &str) -> bool {
    text.contains("429") || text.to_ascii_lowercase().contains("too many requests")
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(LedgerError::from_http(429, "").is_rate_limited());
        assert!(LedgerError::from_http(503, "Too Many Requests").is_rate_limited());
        assert!(LedgerError::from_rpc(-32429, "slow down").is_rate_limited());
        assert!(LedgerError::from_rpc(-32005, "Server responded with 429").is_rate_limited());
    }

    #[test]
    fn test_other_errors_not_rate_limited() {
        assert_eq!(
            LedgerError::from_http(502, "bad gateway"),
            LedgerError::Transport("HTTP 502: bad gateway".to_string())
        );
        let rpc = LedgerError::from_rpc(-32602, "invalid params");
        assert!(!rpc.is_rate_limited());
        assert!(!rpc.is_submission_failure());
        assert!(LedgerError::Rejected("custom program error".into()).is_submission_failure());
    }
}
