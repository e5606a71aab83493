//! Typed-literal helpers for on-chain scalars.
//!
//! Mapping reads return scalars as display strings (`42u64`, `5field`,
//! `true`, sometimes with a `.public` visibility suffix); transition inputs
//! go the other way. Both directions live here so every call site agrees on
//! the format.

use crate::error::{Error, Result};

/// Integer types a transition input slot can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumericType {
    U8,
    #[default]
    U64,
    U128,
    Field,
}

impl NumericType {
    pub fn suffix(self) -> &'static str {
        match self {
            NumericType::U8 => "u8",
            NumericType::U64 => "u64",
            NumericType::U128 => "u128",
            NumericType::Field => "field",
        }
    }
}

const TYPE_SUFFIXES: [&str; 11] = [
    "u128", "u64", "u32", "u16", "u8", "i64", "i32", "i8", "field", "group", "scalar",
];

/// Drop a trailing `.private` / `.public` visibility marker.
pub fn strip_visibility(s: &str) -> &str {
    s.strip_suffix(".private")
        .or_else(|| s.strip_suffix(".public"))
        .unwrap_or(s)
}

/// Drop a recognized type suffix (`u64`, `field`, ...), if any.
///
/// Longer suffixes are tried first so `u128` is not mis-stripped as `u8`.
pub fn strip_type_suffix(s: &str) -> &str {
    for suffix in TYPE_SUFFIXES {
        if let Some(head) = s.strip_suffix(suffix) {
            // Only strip when what remains is a bare number; "field" alone
            // or an address ending in "u8" must survive untouched.
            let head = head.strip_suffix('.').unwrap_or(head);
            if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
                return head;
            }
        }
    }
    s
}

/// True when the string already carries a recognized type or visibility
/// suffix and must pass through transition-input normalization unchanged.
pub fn has_recognized_suffix(s: &str) -> bool {
    if s.ends_with(".private") || s.ends_with(".public") {
        return true;
    }
    s != strip_type_suffix(s) || s == "true" || s == "false"
}

fn bare_digits(s: &str) -> Result<&str> {
    let bare = strip_type_suffix(strip_visibility(s.trim()));
    if bare.is_empty() || !bare.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Query(format!("not a numeric scalar: {s:?}")));
    }
    Ok(bare)
}

pub fn parse_u8(s: &str) -> Result<u8> {
    bare_digits(s)?
        .parse()
        .map_err(|e| Error::Query(format!("bad u8 scalar {s:?}: {e}")))
}

pub fn parse_u64(s: &str) -> Result<u64> {
    bare_digits(s)?
        .parse()
        .map_err(|e| Error::Query(format!("bad u64 scalar {s:?}: {e}")))
}

pub fn parse_u128(s: &str) -> Result<u128> {
    bare_digits(s)?
        .parse()
        .map_err(|e| Error::Query(format!("bad u128 scalar {s:?}: {e}")))
}

pub fn parse_bool(s: &str) -> Result<bool> {
    match strip_visibility(s.trim()) {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::Query(format!("bad boolean scalar: {other:?}"))),
    }
}

pub fn render_bool(v: bool) -> String {
    if v { "true".into() } else { "false".into() }
}

pub fn render_u64(v: u64) -> String {
    format!("{v}u64")
}

pub fn render_u128(v: u128) -> String {
    format!("{v}u128")
}

pub fn render_u8(v: u8) -> String {
    format!("{v}u8")
}

pub fn render_field(digits: &str) -> String {
    format!("{digits}field")
}
