//! Market identifiers and their wire-form drift.
//!
//! The canonical form of a market id is the bare digit string of its field
//! element. Wallets and gateways variously append `field`, a visibility
//! suffix, or wrap the whole thing in quotes; everything funnels through
//! [`MarketId::normalize`]. When two sources still disagree after
//! normalization, the leading digit run (the "numeric core") is the fallback
//! equality key.

use serde::{Deserialize, Serialize};

use crate::scalar;

/// Canonical market identifier: the bare digit string of a field element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Normalize any textual variant to the canonical bare form.
    ///
    /// Idempotent: normalizing an already-canonical id is a no-op.
    pub fn normalize(raw: &str) -> MarketId {
        let mut s = raw.trim();
        // Wire forms are sometimes double-wrapped (JSON string of a quoted
        // string), so strip quotes until none remain.
        loop {
            let stripped = strip_wrapping_quotes(s);
            if stripped == s {
                break;
            }
            s = stripped.trim();
        }
        let s = scalar::strip_type_suffix(scalar::strip_visibility(s));
        MarketId(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading digit run, used as the fallback equality key.
    pub fn numeric_core(&self) -> &str {
        numeric_core(&self.0)
    }

    /// The id as a typed field literal for a transition input or mapping key.
    pub fn to_field_literal(&self) -> String {
        scalar::render_field(&self.0)
    }

    /// Short display form for log lines and placeholder titles.
    pub fn short(&self) -> String {
        self.0.chars().take(10).collect()
    }
}

impl std::fmt::Display for MarketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn strip_wrapping_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn numeric_core(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

/// Two-tier market-id equality.
///
/// Tier 1: canonical normalized forms match exactly. Tier 2: both have a
/// non-empty numeric core and the cores match. The second tier papers over
/// representation drift normalization cannot resolve.
pub fn ids_match(a: &str, b: &str) -> bool {
    let na = MarketId::normalize(a);
    let nb = MarketId::normalize(b);
    if na == nb {
        return true;
    }
    let ca = na.numeric_core();
    let cb = nb.numeric_core();
    !ca.is_empty() && ca == cb
}
