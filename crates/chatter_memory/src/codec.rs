//! Key and value encoding for persisted collections.
//!
//! Keys are stored as `"<tag>:<body>"` so a string key `"1"` and a numeric key
//! `1` can never land on the same row. The body is canonical JSON, except for
//! integers, which use fixed-width decimal so that key order is numeric order.
//! Values are wrapped in a
//! tagged envelope, `{"kind":"value","payload":...}` or `{"kind":"absent"}`,
//! which keeps "stored with no value" distinct from "not stored at all".

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// A key type that can address rows in an [`IndexedStore`](crate::IndexedStore).
///
/// `TAG` must be unique per structural key shape. Rows are ordered by the
/// encoded body, so types with a meaningful order override the body codec.
pub trait StoreKey: Clone + Eq + Hash + Serialize + DeserializeOwned + Send + Sync {
    const TAG: &'static str;

    /// Canonical JSON; maps inside structured keys come out sorted.
    fn encode_body(&self) -> StoreResult<String> {
        let canonical = serde_json::to_value(self)?;
        Ok(serde_json::to_string(&canonical)?)
    }

    fn decode_body(body: &str) -> Result<Self, String> {
        serde_json::from_str(body).map_err(|e| e.to_string())
    }
}

impl StoreKey for String {
    const TAG: &'static str = "string";
}

/// Zero-padded to the width of `u64::MAX`.
const INT_WIDTH: usize = 20;
const SIGN_BIT: u64 = 1 << 63;

fn parse_fixed_width(body: &str) -> Result<u64, String> {
    if body.len() != INT_WIDTH || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected {} decimal digits, got '{}'", INT_WIDTH, body));
    }
    body.parse().map_err(|e: std::num::ParseIntError| e.to_string())
}

impl StoreKey for u64 {
    const TAG: &'static str = "u64";

    fn encode_body(&self) -> StoreResult<String> {
        Ok(format!("{:0width$}", self, width = INT_WIDTH))
    }

    fn decode_body(body: &str) -> Result<Self, String> {
        parse_fixed_width(body)
    }
}

impl StoreKey for i64 {
    const TAG: &'static str = "i64";

    // Flipping the sign bit maps i64::MIN..=i64::MAX onto 0..=u64::MAX in order.
    fn encode_body(&self) -> StoreResult<String> {
        let shifted = (*self as u64) ^ SIGN_BIT;
        Ok(format!("{:0width$}", shifted, width = INT_WIDTH))
    }

    fn decode_body(body: &str) -> Result<Self, String> {
        parse_fixed_width(body).map(|shifted| (shifted ^ SIGN_BIT) as i64)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Envelope {
    Value { payload: serde_json::Value },
    Absent,
}

/// Encode a key with its type tag. Equal keys always encode identically.
pub fn encode_key<K: StoreKey>(key: &K) -> StoreResult<String> {
    Ok(format!("{}:{}", K::TAG, key.encode_body()?))
}

pub fn decode_key<K: StoreKey>(table: &str, encoded: &str) -> StoreResult<K> {
    let corrupt = |reason: String| StoreError::Corrupt {
        table: table.to_string(),
        key: encoded.to_string(),
        reason,
    };

    let body = encoded
        .strip_prefix(K::TAG)
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(|| corrupt(format!("expected key tag '{}'", K::TAG)))?;
    K::decode_body(body).map_err(corrupt)
}

/// Encode a value. Anything that serializes to JSON `null` (e.g. `None`) is
/// written as the explicit absent marker.
pub fn encode_value<V: Serialize>(value: &V) -> StoreResult<String> {
    let payload = serde_json::to_value(value)?;
    let envelope = if payload.is_null() {
        Envelope::Absent
    } else {
        Envelope::Value { payload }
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a stored value. The absent marker decodes as JSON `null`, so it only
/// succeeds for value types that admit "no value" (`Option<T>`, `()`); a
/// malformed envelope or mismatched payload is reported as corruption.
pub fn decode_value<V: DeserializeOwned>(table: &str, key: &str, raw: &str) -> StoreResult<V> {
    let corrupt = |reason: String| StoreError::Corrupt {
        table: table.to_string(),
        key: key.to_string(),
        reason,
    };

    let envelope: Envelope = serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))?;
    let payload = match envelope {
        Envelope::Value { payload } => payload,
        Envelope::Absent => serde_json::Value::Null,
    };
    serde_json::from_value(payload).map_err(|e| corrupt(e.to_string()))
}

/// Encode a value and check that it decodes back to itself. JSON has no
/// spelling for non-finite floats or for `Some(None)`, so those are refused
/// here instead of surfacing later as corrupt or silently different reads.
pub fn encode_value_exact<V>(table: &str, key: &str, value: &V) -> StoreResult<String>
where
    V: Serialize + DeserializeOwned + PartialEq,
{
    let raw = encode_value(value)?;
    match decode_value::<V>(table, key, &raw) {
        Ok(echo) if echo == *value => Ok(raw),
        _ => Err(StoreError::Unrepresentable {
            table: table.to_string(),
            key: key.to_string(),
        }),
    }
}
