//! Position records: matching, aggregation, and candidate selection.
//!
//! A position record scopes confidential share balances to one market. The
//! same record can surface under several historic program ids, so fetches
//! are de-duplicated by content fingerprint before anything else looks at
//! them. Market matching uses the two-tier id equality from
//! [`crate::market`].

use serde_json::Value;

use crate::error::{Error, Result};
use crate::market::{MarketId, ids_match};
use crate::record::{fingerprint, normalize::normalize_record, plaintext_field};
use crate::scalar;

/// A confidential position in one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    pub market_id: MarketId,
    pub yes_shares: u128,
    pub no_shares: u128,
    pub collateral_available: u128,
    pub collateral_committed: u128,
    pub payout_claimed: bool,
    pub spent: bool,
    pub fingerprint: String,
    pub plaintext: String,
}

impl PositionRecord {
    /// Parse a wallet-returned value into a position record.
    ///
    /// Requires a decrypted record carrying a `market_id` field; share and
    /// collateral fields default to zero when absent.
    pub fn from_wallet_value(value: &Value) -> Result<PositionRecord> {
        let plaintext = normalize_record(value)?;
        let market_raw = plaintext_field(&plaintext, "market_id").ok_or_else(|| {
            Error::Validation("position record has no market_id field".into())
        })?;

        let u128_field = |key: &str| -> u128 {
            plaintext_field(&plaintext, key)
                .and_then(|raw| scalar::parse_u128(&raw).ok())
                .unwrap_or(0)
        };
        let payout_claimed = plaintext_field(&plaintext, "payout_claimed")
            .and_then(|raw| scalar::parse_bool(&raw).ok())
            .unwrap_or(false);
        let spent = value
            .get("spent")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(PositionRecord {
            market_id: MarketId::normalize(&market_raw),
            yes_shares: u128_field("yes_shares"),
            no_shares: u128_field("no_shares"),
            collateral_available: u128_field("collateral_available"),
            collateral_committed: u128_field("collateral_committed"),
            payout_claimed,
            spent,
            fingerprint: fingerprint(&plaintext),
            plaintext,
        })
    }

    /// Shares on the winning side of a resolved market.
    pub fn winning_shares(&self, outcome_yes: bool) -> u128 {
        if outcome_yes {
            self.yes_shares
        } else {
            self.no_shares
        }
    }

    fn matches(&self, market: &MarketId) -> bool {
        ids_match(self.market_id.as_str(), market.as_str())
    }
}

/// Parse and de-duplicate records fetched under multiple program-id aliases.
///
/// Unparseable entries are skipped with a warn; the first occurrence of each
/// fingerprint wins, preserving fetch order.
pub fn collect_positions(values: &[Value]) -> Vec<PositionRecord> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        match PositionRecord::from_wallet_value(value) {
            Ok(record) => {
                if seen.insert(record.fingerprint.clone()) {
                    out.push(record);
                }
            }
            Err(e) => {
                log::warn!("skipping unusable position record: {e}");
            }
        }
    }
    out
}

/// Unspent records matching a market, in supplied order.
pub fn positions_for_market<'a>(
    records: &'a [PositionRecord],
    market: &MarketId,
) -> Vec<&'a PositionRecord> {
    records
        .iter()
        .filter(|r| !r.spent && r.matches(market))
        .collect()
}

/// Sum of a holder's matched position records for one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedPosition {
    pub market_id: MarketId,
    pub yes_shares: u128,
    pub no_shares: u128,
    pub collateral_available: u128,
    pub collateral_committed: u128,
    /// True only when every underlying record has claimed its payout.
    pub payout_claimed: bool,
    pub record_count: usize,
}

/// Aggregate all matched, unspent records for `market`.
///
/// Returns `None` when no record matches.
pub fn aggregate_position(
    records: &[PositionRecord],
    market: &MarketId,
) -> Option<AggregatedPosition> {
    let matched = positions_for_market(records, market);
    if matched.is_empty() {
        return None;
    }
    let mut agg = AggregatedPosition {
        market_id: market.clone(),
        yes_shares: 0,
        no_shares: 0,
        collateral_available: 0,
        collateral_committed: 0,
        payout_claimed: true,
        record_count: matched.len(),
    };
    for r in &matched {
        agg.yes_shares = agg.yes_shares.saturating_add(r.yes_shares);
        agg.no_shares = agg.no_shares.saturating_add(r.no_shares);
        agg.collateral_available = agg.collateral_available.saturating_add(r.collateral_available);
        agg.collateral_committed = agg.collateral_committed.saturating_add(r.collateral_committed);
        agg.payout_claimed &= r.payout_claimed;
    }
    Some(agg)
}

/// Pick the record to redeem on a resolved market.
///
/// Among unspent, unclaimed matches the maximal winning-side share count
/// wins; ties go to the earlier record. Zero winning shares disqualifies a
/// record outright.
pub fn select_redemption_record<'a>(
    records: &'a [PositionRecord],
    market: &MarketId,
    outcome_yes: bool,
) -> Result<&'a PositionRecord> {
    let mut best: Option<&PositionRecord> = None;
    for r in positions_for_market(records, market) {
        if r.payout_claimed || r.winning_shares(outcome_yes) == 0 {
            continue;
        }
        match best {
            Some(b) if r.winning_shares(outcome_yes) <= b.winning_shares(outcome_yes) => {}
            _ => best = Some(r),
        }
    }
    best.ok_or_else(|| {
        Error::NoMatchingRecord(format!(
            "no unclaimed position with winning shares for market {market}"
        ))
    })
}

/// Pick the record backing a collateral deposit or swap.
///
/// Prefers the largest `collateral_available` that covers `needed`; when
/// nothing covers it, falls back to the overall largest. Ties go to the
/// earlier record.
pub fn select_deposit_record<'a>(
    records: &'a [PositionRecord],
    market: &MarketId,
    needed: u128,
) -> Result<&'a PositionRecord> {
    let matched = positions_for_market(records, market);
    if matched.is_empty() {
        return Err(Error::NoMatchingRecord(format!(
            "no position record for market {market}"
        )));
    }

    let pick_largest = |candidates: &[&'a PositionRecord]| -> Option<&'a PositionRecord> {
        let mut best: Option<&'a PositionRecord> = None;
        for &r in candidates {
            match best {
                Some(b) if r.collateral_available <= b.collateral_available => {}
                _ => best = Some(r),
            }
        }
        best
    };

    let sufficient: Vec<&PositionRecord> = matched
        .iter()
        .copied()
        .filter(|r| r.collateral_available >= needed)
        .collect();

    let picked = if sufficient.is_empty() {
        pick_largest(&matched)
    } else {
        pick_largest(&sufficient)
    };
    // matched is non-empty, so a pick always exists.
    picked.ok_or_else(|| {
        Error::NoMatchingRecord(format!("no position record for market {market}"))
    })
}
