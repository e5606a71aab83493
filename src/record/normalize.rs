//! Record shape normalization.
//!
//! A wallet-returned record may be a raw plaintext string, a quoted/escaped
//! string, or an object exposing the plaintext under one of several legacy
//! key names; some wallets return the decrypted fields as a JSON object
//! instead of a struct string. All shapes collapse to one canonical
//! plaintext struct string here. Ciphertext is always rejected: transition
//! construction needs structured fields, not an opaque blob.

use serde_json::Value;

use crate::config::{CIPHERTEXT_PREFIX, PLAINTEXT_KEY_ALIASES};
use crate::error::{Error, Result};

/// Normalize a record of unknown shape to its canonical plaintext string.
pub fn normalize_record(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => clean_plaintext(s),
        Value::Object(map) => {
            for alias in PLAINTEXT_KEY_ALIASES {
                if let Some(inner) = map.get(alias) {
                    return normalize_record(inner);
                }
            }
            if map.contains_key("ciphertext") {
                return Err(Error::NotDecrypted(
                    "record exposes only ciphertext".into(),
                ));
            }
            // Decrypted fields returned as a structured object.
            Ok(render_struct(value))
        }
        other => Err(Error::NotDecrypted(format!(
            "unsupported record shape: {}",
            type_name(other)
        ))),
    }
}

/// Clean a plaintext string: strip wrapping quotes, unescape literal `\n`
/// sequences, trim, and reject ciphertext or emptiness.
fn clean_plaintext(raw: &str) -> Result<String> {
    let mut s = raw.trim().to_string();
    loop {
        let stripped = strip_quotes(&s);
        if stripped == s {
            break;
        }
        s = stripped;
    }
    let s = s.replace("\\n", "\n");
    let s = s.trim().to_string();

    if s.is_empty() {
        return Err(Error::NotDecrypted("record plaintext is empty".into()));
    }
    if s.starts_with(CIPHERTEXT_PREFIX) && !s.contains('{') {
        return Err(Error::NotDecrypted(
            "record is ciphertext; only the owning wallet can decrypt it".into(),
        ));
    }
    Ok(s)
}

fn strip_quotes(s: &str) -> String {
    let t = s.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        t[1..t.len() - 1].to_string()
    } else {
        t.to_string()
    }
}

/// Render a JSON object as plaintext struct syntax: `{ key: value, ... }`.
///
/// Nested objects recurse; arrays render element-wise. String values are
/// emitted verbatim since they already carry their own type suffixes.
fn render_struct(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_struct(v)))
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_struct).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
