//! JSON-RPC transport for the ledger endpoint.
//!
//! Every call funnels through [`RpcClient::call`], which is where HTTP
//! and JSON-RPC failures are classified into [`LedgerError`] variants.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::decode::{coalesce_u64, decode_account_data, encode_base64};
use crate::error::{LedgerError, LedgerResult};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Commitment used for every read and for preflight.
const COMMITMENT: &str = "confirmed";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Account returned by a program-wide scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAccount {
    pub address: Pubkey,
    pub data: Vec<u8>,
}

/// Status of a submitted signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation_status: Option<String>,
    /// On-chain execution error, if the transaction failed.
    pub err: Option<Value>,
}

impl SignatureStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.confirmation_status.as_deref(),
            Some("confirmed") | Some("finalized")
        )
    }
}

/// `memcmp` filter for `getProgramAccounts`.
pub fn memcmp_filter(offset: usize, bytes: &[u8]) -> Value {
    json!({
        "memcmp": {
            "offset": offset,
            "bytes": encode_base64(bytes),
            "encoding": "base64",
        }
    })
}

/// Client for the ledger JSON-RPC endpoint.
pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client.
    ///
    /// # Arguments
    /// * `url` - HTTP endpoint of the RPC node (e.g., "https://api.devnet.solana.com")
    pub fn new(url: impl Into<String>) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> LedgerResult<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::from_http(status.as_u16(), &body));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("{method}: invalid response: {e}")))?;

        if let Some(err) = body.error {
            return Err(LedgerError::from_rpc(err.code, err.message));
        }

        debug!(method, "RPC call completed");
        Ok(body.result.unwrap_or(Value::Null))
    }

    /// Fetch several accounts in one round trip.
    ///
    /// Returns the context slot and one entry per key: `None` when the
    /// account does not exist or its data cannot be decoded.
    pub async fn get_multiple_accounts(
        &self,
        keys: &[Pubkey],
    ) -> LedgerResult<(u64, Vec<Option<Vec<u8>>>)> {
        let keys_b58: Vec<String> = keys.iter().map(Pubkey::to_string).collect();
        let result = self
            .call(
                "getMultipleAccounts",
                json!([keys_b58, { "encoding": "base64", "commitment": COMMITMENT }]),
            )
            .await?;

        let slot = coalesce_u64(&result["context"]["slot"]);
        let values = result["value"].as_array().cloned().unwrap_or_default();

        let accounts = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let entry = values.get(i).filter(|v| !v.is_null())?;
                let data = decode_account_data(&entry["data"]);
                if data.is_none() {
                    warn!(account = %key, "Undecodable account data, treating as absent");
                }
                data
            })
            .collect();

        Ok((slot, accounts))
    }

    /// Scan every account owned by `program_id` matching `filters`.
    ///
    /// Entries with an unparseable address or data are skipped.
    pub async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: Vec<Value>,
    ) -> LedgerResult<Vec<RawAccount>> {
        let result = self
            .call(
                "getProgramAccounts",
                json!([
                    program_id.to_string(),
                    { "encoding": "base64", "commitment": COMMITMENT, "filters": filters }
                ]),
            )
            .await?;

        // Newer nodes may wrap the list in a context object.
        let entries = match &result {
            Value::Array(list) => list.clone(),
            other => other["value"].as_array().cloned().unwrap_or_default(),
        };

        let mut accounts = Vec::with_capacity(entries.len());
        for entry in &entries {
            let address = entry["pubkey"].as_str().and_then(|s| Pubkey::from_str(s).ok());
            let data = decode_account_data(&entry["account"]["data"]);
            match (address, data) {
                (Some(address), Some(data)) => accounts.push(RawAccount { address, data }),
                _ => warn!(entry = %entry["pubkey"], "Skipping undecodable program account"),
            }
        }
        Ok(accounts)
    }

    pub async fn get_latest_blockhash(&self) -> LedgerResult<Hash> {
        let result = self
            .call("getLatestBlockhash", json!([{ "commitment": COMMITMENT }]))
            .await?;
        let blockhash = result["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| LedgerError::Decode("getLatestBlockhash: missing blockhash".into()))?;
        Hash::from_str(blockhash)
            .map_err(|e| LedgerError::Decode(format!("getLatestBlockhash: {e}")))
    }

    /// Submit a signed transaction; returns its signature.
    ///
    /// Preflight failures are reported as [`LedgerError::Rejected`].
    pub async fn send_transaction(&self, wire: &[u8]) -> LedgerResult<String> {
        let result = self
            .call(
                "sendTransaction",
                json!([
                    encode_base64(wire),
                    { "encoding": "base64", "preflightCommitment": COMMITMENT }
                ]),
            )
            .await
            .map_err(|e| match e {
                LedgerError::Rpc { code, message } => {
                    LedgerError::Rejected(format!("{code}: {message}"))
                }
                other => other,
            })?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LedgerError::Decode("sendTransaction: missing signature".into()))
    }

    pub async fn get_signature_status(
        &self,
        signature: &str,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let result = self
            .call("getSignatureStatuses", json!([[signature]]))
            .await?;

        let entry = &result["value"][0];
        if entry.is_null() {
            return Ok(None);
        }
        Ok(Some(SignatureStatus {
            slot: coalesce_u64(&entry["slot"]),
            confirmation_status: entry["confirmationStatus"].as_str().map(str::to_string),
            err: Some(entry["err"].clone()).filter(|e| !e.is_null()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memcmp_filter_shape() {
        let filter = memcmp_filter(8, &[1, 2, 3]);
        assert_eq!(filter["memcmp"]["offset"], 8);
        assert_eq!(filter["memcmp"]["bytes"], "AQID");
        assert_eq!(filter["memcmp"]["encoding"], "base64");
    }

    #[test]
    fn test_signature_status_confirmed() {
        let status = |s: Option<&str>| SignatureStatus {
            slot: 1,
            confirmation_status: s.map(str::to_string),
            err: None,
        };
        assert!(status(Some("confirmed")).is_confirmed());
        assert!(status(Some("finalized")).is_confirmed());
        assert!(!status(Some("processed")).is_confirmed());
        assert!(!status(None).is_confirmed());
    }

    #[test]
    fn test_client_builds() {
        let client = RpcClient::new("http://127.0.0.1:8899").unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:8899");
    }
}
