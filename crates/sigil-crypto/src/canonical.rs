//! # Canonical Encoder
//!
//! Deterministic byte serialization feeding every hash in the ledger.
//!
//! ## Rules
//!
//! - Object keys are emitted in lexicographic (byte) order.
//! - Arrays keep their order.
//! - Object members whose value is `null` are omitted: `None` is the Rust
//!   spelling of an absent field, so adding an optional field to one record
//!   type never changes the hash of records that leave it unset.
//! - Output is compact JSON (no whitespace); strings use JSON escaping.
//!
//! The output does not depend on how the source map was built, so the
//! encoder is safe to use whether or not `serde_json/preserve_order` is
//! enabled anywhere in the dependency graph.

use crate::errors::CanonicalError;
use serde::Serialize;
use serde_json::Value;

/// Maximum nesting depth accepted before the input is treated as cyclic.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Encode a JSON value canonically.
pub fn encode(value: &Value) -> Result<Vec<u8>, CanonicalError> {
    let mut out = Vec::with_capacity(128);
    write_value(value, 0, &mut out)?;
    Ok(out)
}

/// Serialize any `Serialize` value through the canonical encoder.
pub fn encode_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    let value =
        serde_json::to_value(value).map_err(|e| CanonicalError::Unencodable(e.to_string()))?;
    encode(&value)
}

fn write_value(value: &Value, depth: usize, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(CanonicalError::CyclicStructure { depth });
    }

    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, depth + 1, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out)?;
                out.push(b':');
                write_value(item, depth + 1, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    let escaped =
        serde_json::to_string(s).map_err(|e| CanonicalError::Unencodable(e.to_string()))?;
    out.extend_from_slice(escaped.as_bytes());
    Ok(())
}
