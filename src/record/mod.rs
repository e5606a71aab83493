//! Confidential record handling.
//!
//! Wallets return records in several incompatible shapes and vintages.
//! Everything entering the SDK funnels through [`normalize::normalize_record`]
//! first; the typed views ([`credit::CreditRecord`],
//! [`position::PositionRecord`]) are built on top of the canonical plaintext.

pub mod credit;
pub mod normalize;
pub mod position;

use sha2::{Digest, Sha256};

/// Content fingerprint of a record.
///
/// This is the identity used for de-duplication across program-id aliases
/// and for keeping one record out of two input slots. Two records with equal
/// plaintext are the same record: plaintexts embed the record nonce, so
/// distinct on-chain records never collide.
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

/// Abbreviated fingerprint for error messages and logs.
pub fn short_fingerprint(fp: &str) -> &str {
    &fp[..fp.len().min(16)]
}

/// Extract the raw value of a named field from a record plaintext.
///
/// Scans for `<key>:` at a word boundary and returns the token up to the
/// next delimiter. Plaintext struct syntax is flat enough that a scan beats
/// a grammar here; nested structs are handled by the caller recursing on the
/// braced substring.
pub fn plaintext_field(plaintext: &str, key: &str) -> Option<String> {
    let mut search_from = 0;
    while let Some(rel) = plaintext[search_from..].find(key) {
        let start = search_from + rel;
        let before_ok = start == 0
            || !plaintext[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let after = &plaintext[start + key.len()..];
        let after_trimmed = after.trim_start();
        if before_ok && after_trimmed.starts_with(':') {
            let value = after_trimmed[1..]
                .trim_start()
                .split(|c| c == ',' || c == '}' || c == '\n')
                .next()
                .unwrap_or("")
                .trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
        search_from = start + key.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAINTEXT: &str = "{\n  owner: aleo1xyz.private,\n  microcredits: 1500u64.private,\n  yes_shares: 12u128.private,\n  no_shares: 0u128.private\n}";

    #[test]
    fn field_extraction() {
        assert_eq!(
            plaintext_field(PLAINTEXT, "microcredits").as_deref(),
            Some("1500u64.private")
        );
        assert_eq!(
            plaintext_field(PLAINTEXT, "owner").as_deref(),
            Some("aleo1xyz.private")
        );
        assert_eq!(plaintext_field(PLAINTEXT, "missing"), None);
    }

    #[test]
    fn field_extraction_respects_word_boundaries() {
        // "no_shares" must not match inside "yes_shares" (or vice versa).
        assert_eq!(
            plaintext_field(PLAINTEXT, "no_shares").as_deref(),
            Some("0u128.private")
        );
        assert_eq!(
            plaintext_field(PLAINTEXT, "yes_shares").as_deref(),
            Some("12u128.private")
        );
        assert_eq!(plaintext_field(PLAINTEXT, "shares"), None);
    }

    #[test]
    fn fingerprint_is_stable_and_distinct() {
        let a = fingerprint("{ owner: a }");
        let b = fingerprint("{ owner: b }");
        assert_eq!(a, fingerprint("{ owner: a }"));
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(short_fingerprint(&a).len(), 16);
    }
}
