//! Decode-with-fallback helpers for RPC payloads.
//!
//! The RPC node has returned account data in more than one shape over
//! time. All representation guessing happens here so nothing downstream
//! has to.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use borsh::BorshDeserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, LedgerResult};

/// Length of the Anchor account/instruction discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Anchor discriminator: first 8 bytes of `sha256("<namespace>:<name>")`.
pub fn discriminator(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// Account discriminator for an Anchor account type.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    discriminator("account", name)
}

/// Raw bytes of an account `data` field.
///
/// Accepts `["<base64>", "base64"]` and a bare base64 string. Anything
/// else (including other encodings) is `None`.
pub fn decode_account_data(data: &Value) -> Option<Vec<u8>> {
    let encoded = match data {
        Value::Array(parts) => {
            let encoding = parts.get(1).and_then(Value::as_str).unwrap_or("base64");
            if encoding != "base64" {
                return None;
            }
            parts.first()?.as_str()?
        }
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    BASE64.decode(encoded).ok()
}

/// Numeric field as `u64`: JSON number, numeric string, else 0.
pub fn coalesce_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Deserialize an Anchor account body after checking its discriminator.
///
/// Trailing bytes (allocated but unused account space) are ignored.
pub fn decode_anchor<T: BorshDeserialize>(name: &str, data: &[u8]) -> LedgerResult<T> {
    if data.len() < DISCRIMINATOR_LEN {
        return Err(LedgerError::Decode(format!(
            "{name}: account too short ({} bytes)",
            data.len()
        )));
    }
    if data[..DISCRIMINATOR_LEN] != account_discriminator(name) {
        return Err(LedgerError::Decode(format!("{name}: discriminator mismatch")));
    }
    T::deserialize(&mut &data[DISCRIMINATOR_LEN..])
        .map_err(|e| LedgerError::Decode(format!("{name}: {e}")))
}

/// Base64 encoding used for transactions and memcmp filters.
pub fn encode_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use borsh::BorshSerialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, BorshSerialize, BorshDeserialize)]
    struct Sample {
        a: u64,
        b: bool,
    }

    fn anchor_bytes(name: &str, sample: &Sample) -> Vec<u8> {
        let mut out = account_discriminator(name).to_vec();
        out.extend(borsh::to_vec(sample).unwrap());
        out
    }

    #[test]
    fn test_decode_account_data_shapes() {
        let encoded = encode_base64(&[1, 2, 3]);
        assert_eq!(
            decode_account_data(&json!([encoded, "base64"])),
            Some(vec![1, 2, 3])
        );
        assert_eq!(decode_account_data(&json!(encoded)), Some(vec![1, 2, 3]));
        assert_eq!(decode_account_data(&json!(["abc", "base58"])), None);
        assert_eq!(decode_account_data(&json!("not base64!")), None);
        assert_eq!(decode_account_data(&json!(null)), None);
    }

    #[test]
    fn test_coalesce_u64() {
        assert_eq!(coalesce_u64(&json!(42)), 42);
        assert_eq!(coalesce_u64(&json!("17")), 17);
        assert_eq!(coalesce_u64(&json!(3.0)), 3);
        assert_eq!(coalesce_u64(&json!("abc")), 0);
        assert_eq!(coalesce_u64(&json!(-5)), 0);
        assert_eq!(coalesce_u64(&json!(null)), 0);
    }

    #[test]
    fn test_decode_anchor() {
        let sample = Sample { a: 9, b: true };
        let mut bytes = anchor_bytes("Sample", &sample);
        bytes.extend([0u8; 16]);

        let decoded: Sample = decode_anchor("Sample", &bytes).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn test_decode_anchor_rejects_wrong_type() {
        let bytes = anchor_bytes("Other", &Sample { a: 1, b: false });
        let err = decode_anchor::<Sample>("Sample", &bytes).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
        assert!(decode_anchor::<Sample>("Sample", &[0u8; 4]).is_err());
    }

    #[test]
    fn test_discriminator_is_stable() {
        assert_eq!(discriminator("global", "x"), discriminator("global", "x"));
        assert_ne!(discriminator("global", "x"), discriminator("account", "x"));
    }
}
