//! Tagged canonical encoding of the JSON data model.
//!
//! Layout per value:
//!
//! | value    | encoding                          |
//! |----------|-----------------------------------|
//! | null     | `N`                               |
//! | bool     | `T` / `F`                         |
//! | i64      | `I<decimal>;`                     |
//! | u64      | `U<decimal>;` (only above i64)    |
//! | float    | `D<shortest exponent form>;`      |
//! | string   | `S<byte len>:<utf8>`              |
//! | array    | `A<len>[<items>]`                 |
//! | object   | `O<len>{<key><value>...}`         |
//!
//! Object keys are emitted in byte order, so insertion order never affects
//! the output. Integers and floats carry distinct tags.

use serde::Serialize;
use serde_json::Value;

use crate::error::HashError;

/// Domain-separation value appended to every canonical encoding before digesting.
pub const DOMAIN_TAG: &[u8] = b"csr-ledger/canonical/v1";

/// Deepest nesting accepted by the encoder.
pub const MAX_DEPTH: usize = 128;

/// Encode `value` canonically.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, HashError> {
    let mut out = Vec::with_capacity(128);
    encode(value, 0, "", &mut out)?;
    Ok(out)
}

/// Map a typed value into the JSON data model.
///
/// Fails with [`HashError::NonCanonicalizableValue`] when the value has no
/// JSON representation (for example a map with non-string keys).
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, HashError> {
    serde_json::to_value(value).map_err(|e| HashError::NonCanonicalizableValue {
        path: String::new(),
        reason: e.to_string(),
    })
}

fn encode(value: &Value, depth: usize, path: &str, out: &mut Vec<u8>) -> Result<(), HashError> {
    if depth > MAX_DEPTH {
        return Err(HashError::NonCanonicalizableValue {
            path: path.to_string(),
            reason: format!("nesting exceeds {} levels", MAX_DEPTH),
        });
    }

    match value {
        Value::Null => out.push(b'N'),
        Value::Bool(true) => out.push(b'T'),
        Value::Bool(false) => out.push(b'F'),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                out.extend_from_slice(format!("I{};", i).as_bytes());
            } else if let Some(u) = n.as_u64() {
                out.extend_from_slice(format!("U{};", u).as_bytes());
            } else {
                let f = n.as_f64().ok_or_else(|| HashError::NonCanonicalizableValue {
                    path: path.to_string(),
                    reason: "number is not representable as f64".into(),
                })?;
                if !f.is_finite() {
                    return Err(HashError::NonCanonicalizableValue {
                        path: path.to_string(),
                        reason: "non-finite float".into(),
                    });
                }
                out.extend_from_slice(format!("D{:e};", f).as_bytes());
            }
        }
        Value::String(s) => encode_str(s, out),
        Value::Array(items) => {
            out.extend_from_slice(format!("A{}[", items.len()).as_bytes());
            for (index, item) in items.iter().enumerate() {
                let child = format!("{}/{}", path, index);
                encode(item, depth + 1, &child, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

            out.extend_from_slice(format!("O{}{{", keys.len()).as_bytes());
            for key in keys {
                encode_str(key, out);
                let child = format!("{}/{}", path, key);
                encode(&map[key], depth + 1, &child, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("S{}:", s.len()).as_bytes());
    out.extend_from_slice(s.as_bytes());
}
