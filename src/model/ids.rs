//! Identifier normalization and client-side id generation.
//!
//! The remote store may hand back numeric identifiers while the in-memory
//! model treats identity as an opaque string. Every record entering the
//! model passes through [`normalize_record`], and every identifier field of
//! the typed entities deserializes through [`string_or_number`], so a `12`
//! and a `"12"` can never name two different rows.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_TIMESTAMP_ID: AtomicI64 = AtomicI64::new(0);

/// True for `id` and for fields naming a reference to another row
/// (`classId`, `tpId`, `criteriaId`, `class_id`, ...).
pub fn is_identifier_field(name: &str) -> bool {
    name == "id"
        || (name.len() > 2 && name.ends_with("Id"))
        || (name.len() > 3 && name.ends_with("_id"))
}

/// Canonical string form of an identifier value.
///
/// Null becomes the empty string (an unset reference), integral floats drop
/// their fractional part the way a JS `String(12.0)` would.
pub fn identifier_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_string(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn number_string(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Returns an equivalent record where `id` and every foreign-key field is a
/// string, recursing through nested objects and arrays. Other fields are
/// left untouched. Idempotent.
pub fn normalize_record(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_record).collect()),
        Value::Object(map) => Value::Object(normalize_object(map)),
        other => other,
    }
}

fn normalize_object(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Object(_) | Value::Array(_) => normalize_record(value),
                scalar if is_identifier_field(&key) => Value::String(identifier_string(&scalar)),
                scalar => scalar,
            };
            (key, value)
        })
        .collect()
}

/// `deserialize_with` helper for identifier fields of the typed entities.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(identifier_string(&value))
}

/// `deserialize_with` helper for text columns the store may type as
/// numbers (`nisn`, `phone`, `semester`, ...). Null reads as empty.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    string_or_number(deserializer)
}

/// `deserialize_with` helper for numeric columns that may arrive as text.
/// Null and blank strings read as zero.
pub fn lenient_number<'de, D, N>(deserializer: D) -> Result<N, D::Error>
where
    D: Deserializer<'de>,
    N: FromStr + Default + DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(N::default()),
        Value::String(s) if s.trim().is_empty() => Ok(N::default()),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid number {:?}", s))),
        other => serde_json::from_value(other).map_err(D::Error::custom),
    }
}

/// Millisecond timestamp identifier used for simple adds. Strictly
/// increasing within the process, so two adds in the same millisecond
/// never share an id.
pub fn timestamp_id() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let previous = LAST_TIMESTAMP_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
        .unwrap_or_else(|last| last);
    now.max(previous + 1).to_string()
}

/// Composite identifier built from parent identifiers, e.g. `S1-T1`.
pub fn composite_id(parts: &[&str]) -> String {
    parts.join("-")
}
