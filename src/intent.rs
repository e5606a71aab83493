//! Transition intent assembly.
//!
//! The SDK never signs or proves; it assembles a [`TransactionIntent`] and
//! hands it to the wallet. Two construction modes cover the two wallet
//! capability models: **explicit** (the caller supplies pre-selected,
//! normalized plaintext records) and **intent** (record slots carry a
//! placeholder the wallet substitutes at signing time). Both place record
//! inputs at the fixed slot indices the on-chain function signature
//! dictates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{RECORD_PLACEHOLDER, TX_ID_PREFIX, TXID_ALIASES, TXID_SCAN_DEPTH};
use crate::error::{Error, Result};
use crate::scalar::{self, NumericType};

/// A fully assembled transition-invocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub program_id: String,
    pub function: String,
    /// Ordered typed inputs, one literal string per slot.
    pub inputs: Vec<String>,
    pub fee_microcredits: u64,
    pub fee_private: bool,
    /// Record plaintext for the fee slot, when the caller pre-selected one.
    /// Wallets that pick their own fee record ignore this.
    pub fee_record: Option<String>,
    /// Indices of record-typed input slots.
    pub record_slots: Vec<usize>,
}

/// One input slot value handed to the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    /// Pre-selected, normalized record plaintext (explicit mode).
    Record(String),
    /// Record slot the wallet fills at signing time (intent mode).
    RecordPlaceholder,
    /// A typed primitive.
    Literal(Literal),
    /// A loose string normalized to `ty` unless it already carries a suffix.
    Loose(String, NumericType),
}

/// Typed primitive literals for non-record slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    U8(u8),
    U64(u64),
    U128(u128),
    /// Bare field-element digits.
    Field(String),
    /// Pre-rendered value (addresses, already-suffixed scalars).
    Raw(String),
}

impl Literal {
    pub fn render(&self) -> String {
        match self {
            Literal::Bool(b) => scalar::render_bool(*b),
            Literal::U8(v) => scalar::render_u8(*v),
            Literal::U64(v) => scalar::render_u64(*v),
            Literal::U128(v) => scalar::render_u128(*v),
            Literal::Field(digits) => scalar::render_field(digits),
            Literal::Raw(s) => s.clone(),
        }
    }
}

/// Normalize a loose string input into a typed literal.
///
/// Booleans stay `true`/`false`; bare digit strings gain the requested type
/// suffix (u64 unless the call site asks otherwise); strings already
/// carrying a recognized type or visibility suffix pass through unchanged,
/// as do non-numeric strings such as addresses.
pub fn normalize_loose_input(raw: &str, ty: NumericType) -> String {
    let s = raw.trim();
    if scalar::has_recognized_suffix(s) {
        return s.to_string();
    }
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        return format!("{s}{}", ty.suffix());
    }
    s.to_string()
}

/// Assemble a [`TransactionIntent`] from ordered slot values.
///
/// Record slot indices are derived from the positions of
/// [`InputValue::Record`] / [`InputValue::RecordPlaceholder`] values, which
/// must mirror the on-chain signature. A record slot whose plaintext
/// normalizes to empty is rejected.
pub fn build_intent(
    program_id: &str,
    function: &str,
    values: Vec<InputValue>,
    fee_microcredits: u64,
    fee_private: bool,
    fee_record: Option<String>,
) -> Result<TransactionIntent> {
    let mut inputs = Vec::with_capacity(values.len());
    let mut record_slots = Vec::new();

    for (slot, value) in values.into_iter().enumerate() {
        match value {
            InputValue::Record(plaintext) => {
                let trimmed = plaintext.trim();
                if trimmed.is_empty() {
                    return Err(Error::Validation(format!(
                        "record slot {slot} of {function} normalized to empty"
                    )));
                }
                record_slots.push(slot);
                inputs.push(trimmed.to_string());
            }
            InputValue::RecordPlaceholder => {
                record_slots.push(slot);
                inputs.push(RECORD_PLACEHOLDER.to_string());
            }
            InputValue::Literal(lit) => inputs.push(lit.render()),
            InputValue::Loose(raw, ty) => inputs.push(normalize_loose_input(&raw, ty)),
        }
    }

    Ok(TransactionIntent {
        program_id: program_id.to_string(),
        function: function.to_string(),
        inputs,
        fee_microcredits,
        fee_private,
        fee_record,
        record_slots,
    })
}

/// Extract a transaction id from an opaque wallet execution result.
///
/// Probes the known result-shape aliases first, then falls back to a
/// bounded-depth structural scan for a string carrying the transaction-id
/// prefix.
pub fn extract_transaction_id(result: &Value) -> Result<String> {
    if let Value::String(s) = result
        && looks_like_txid(s)
    {
        return Ok(s.clone());
    }

    if let Value::Object(map) = result {
        for alias in TXID_ALIASES {
            if let Some(Value::String(s)) = map.get(alias)
                && !s.trim().is_empty()
            {
                return Ok(s.trim().to_string());
            }
        }
    }

    scan_for_txid(result, TXID_SCAN_DEPTH).ok_or(Error::MissingTransactionId)
}

fn looks_like_txid(s: &str) -> bool {
    let s = s.trim();
    s.starts_with(TX_ID_PREFIX) && s.len() > TX_ID_PREFIX.len() + 8
}

fn scan_for_txid(value: &Value, depth: usize) -> Option<String> {
    match value {
        Value::String(s) if looks_like_txid(s) => Some(s.trim().to_string()),
        Value::Object(map) if depth > 0 => {
            map.values().find_map(|v| scan_for_txid(v, depth - 1))
        }
        Value::Array(items) if depth > 0 => {
            items.iter().find_map(|v| scan_for_txid(v, depth - 1))
        }
        _ => None,
    }
}
