//! Credit records and coin selection.
//!
//! A credit record is a confidential value record denominated in
//! microcredits. Selection is deterministic over the wallet-supplied order:
//! the first record large enough wins. Spend and fee slots must be filled by
//! records that differ by identity (fingerprint), never merely by value.

use serde_json::Value;

use crate::config::OPAQUE_RECORD_VALUE;
use crate::error::{Error, Result};
use crate::record::{fingerprint, normalize::normalize_record, plaintext_field, short_fingerprint};
use crate::scalar;

/// A spendable value record as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditRecord {
    /// Canonical plaintext, absent when the wallet kept the record opaque.
    pub plaintext: Option<String>,
    /// Known value, or [`OPAQUE_RECORD_VALUE`] when only the wallet knows.
    pub microcredits: u64,
    pub spent: bool,
    /// The client could not decrypt this record; its value is a sentinel.
    pub opaque: bool,
    /// Content identity; see [`crate::record::fingerprint`].
    pub fingerprint: String,
}

impl CreditRecord {
    /// Build from whatever shape the wallet returned.
    ///
    /// Ciphertext-held records are kept as opaque candidates rather than
    /// dropped: an intent-only wallet can still spend them.
    pub fn from_wallet_value(value: &Value) -> CreditRecord {
        let spent = value
            .get("spent")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match normalize_record(value) {
            Ok(plaintext) => {
                let microcredits = plaintext_field(&plaintext, "microcredits")
                    .and_then(|raw| scalar::parse_u64(&raw).ok());
                let fp = fingerprint(&plaintext);
                match microcredits {
                    Some(microcredits) => CreditRecord {
                        plaintext: Some(plaintext),
                        microcredits,
                        spent,
                        opaque: false,
                        fingerprint: fp,
                    },
                    // Decrypted but not a credits record shape; treat the
                    // value as unknown.
                    None => CreditRecord {
                        plaintext: Some(plaintext),
                        microcredits: OPAQUE_RECORD_VALUE,
                        spent,
                        opaque: true,
                        fingerprint: fp,
                    },
                }
            }
            Err(_) => CreditRecord {
                plaintext: None,
                microcredits: OPAQUE_RECORD_VALUE,
                spent,
                opaque: true,
                fingerprint: fingerprint(&value.to_string()),
            },
        }
    }

    pub fn is_spendable(&self) -> bool {
        !self.spent
    }
}

/// Total value the client can actually see (unspent, decrypted records).
pub fn known_balance(records: &[CreditRecord]) -> u64 {
    records
        .iter()
        .filter(|r| r.is_spendable() && !r.opaque)
        .map(|r| r.microcredits)
        .fold(0u64, u64::saturating_add)
}

/// Select the record funding a spend of `required` microcredits.
///
/// Deterministic: the first unspent record, in supplied order, whose value
/// covers `required`. When every candidate is opaque the choice degrades to
/// best-effort (first candidate) and validation is deferred to wallet
/// signing.
pub fn select_spend_record(records: &[CreditRecord], required: u64) -> Result<&CreditRecord> {
    let Some(first) = records.iter().find(|r| r.is_spendable()) else {
        return Err(Error::InsufficientBalance {
            required,
            available: 0,
        });
    };

    let all_opaque = records
        .iter()
        .filter(|r| r.is_spendable())
        .all(|r| r.opaque);
    if all_opaque {
        log::debug!(
            "all credit records are opaque; best-effort pick {}",
            short_fingerprint(&first.fingerprint)
        );
        return Ok(first);
    }

    records
        .iter()
        .find(|r| r.is_spendable() && r.microcredits >= required)
        .ok_or_else(|| Error::InsufficientBalance {
            required,
            available: known_balance(records),
        })
}

/// Select distinct records for the spend slot and the fee slot.
///
/// The two records must differ by fingerprint. If the only record that could
/// cover the fee is the spend record itself, that is a double-spend risk and
/// the error names the colliding record.
pub fn select_spend_and_fee(
    records: &[CreditRecord],
    amount: u64,
    fee: u64,
) -> Result<(&CreditRecord, &CreditRecord)> {
    let spend = select_spend_record(records, amount)?;

    let all_opaque = records
        .iter()
        .filter(|r| r.is_spendable())
        .all(|r| r.opaque);

    let fee_record = records.iter().find(|r| {
        r.is_spendable()
            && r.fingerprint != spend.fingerprint
            && (r.microcredits >= fee || (all_opaque && r.opaque))
    });

    match fee_record {
        Some(fee_record) => Ok((spend, fee_record)),
        None => {
            // Nothing distinct qualifies. Double-spend risk only when the
            // spend record alone could have funded both slots; otherwise the
            // wallet is simply short.
            if spend.microcredits >= amount.saturating_add(fee) || spend.opaque {
                Err(Error::DoubleSpendRisk {
                    record_fingerprint: short_fingerprint(&spend.fingerprint).to_string(),
                })
            } else {
                Err(Error::InsufficientBalance {
                    required: amount.saturating_add(fee),
                    available: known_balance(records),
                })
            }
        }
    }
}
