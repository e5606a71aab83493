//! Wallet capability surface.
//!
//! The SDK consumes a narrow interface: execute a transaction, and
//! optionally list decrypted records. Browser-style wallet adapters expose
//! that interface at drifting nesting levels (the object itself, a `.wallet`
//! field, an `.adapter` field); [`WalletConnection::resolve_provider`] is
//! the single place the probe order lives.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::intent::TransactionIntent;

/// How record-typed input slots get filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordAccess {
    /// The client fetches, selects, and supplies plaintext records.
    Explicit,
    /// The wallet substitutes records into flagged placeholder slots.
    IntentOnly,
}

/// The capability surface a connected wallet must offer.
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Submit a transition invocation. The opaque result eventually contains
    /// a transaction id; see [`crate::intent::extract_transaction_id`].
    async fn execute(&self, intent: &TransactionIntent) -> Result<Value>;

    /// List records owned under `program`, decrypted when `decrypt` is set.
    ///
    /// Optional capability; the default refuses, which forces intent mode.
    async fn request_records(&self, program: &str, decrypt: bool) -> Result<Vec<Value>> {
        let _ = (program, decrypt);
        Err(Error::Wallet("wallet does not support record queries".into()))
    }

    /// Whether [`request_records`](Self::request_records) is usable.
    fn supports_record_queries(&self) -> bool {
        false
    }
}

/// Names of the probe slots, in probe order. Kept next to
/// [`WalletConnection::resolve_provider`] so the order is defined once.
pub const PROVIDER_PROBE_ORDER: [&str; 3] = ["direct", "wallet", "adapter"];

/// A connected wallet with its possible provider nesting levels.
///
/// Adapters hand the app one of several shapes; rather than shape-sniffing
/// at call sites, the connection holds every candidate slot and resolves the
/// first populated one.
#[derive(Clone, Default)]
pub struct WalletConnection {
    /// The object itself implements the surface.
    pub direct: Option<Arc<dyn WalletApi>>,
    /// Surface nested under a `wallet` field.
    pub wallet: Option<Arc<dyn WalletApi>>,
    /// Surface nested under an `adapter` field.
    pub adapter: Option<Arc<dyn WalletApi>>,
    /// Wallet flag forcing intent mode even when record queries exist.
    pub intent_only: bool,
}

impl WalletConnection {
    /// A connection whose provider sits at the top level.
    pub fn direct(provider: Arc<dyn WalletApi>) -> Self {
        Self {
            direct: Some(provider),
            ..Self::default()
        }
    }

    /// Resolve the active provider: the first populated slot in
    /// [`PROVIDER_PROBE_ORDER`].
    pub fn resolve_provider(&self) -> Option<Arc<dyn WalletApi>> {
        for slot in PROVIDER_PROBE_ORDER {
            let candidate = match slot {
                "direct" => &self.direct,
                "wallet" => &self.wallet,
                "adapter" => &self.adapter,
                _ => unreachable!("unknown probe slot"),
            };
            if let Some(provider) = candidate {
                return Some(provider.clone());
            }
        }
        None
    }

    /// Record-slot strategy for this wallet.
    pub fn record_mode(&self) -> RecordAccess {
        match self.resolve_provider() {
            Some(provider) if provider.supports_record_queries() && !self.intent_only => {
                RecordAccess::Explicit
            }
            _ => RecordAccess::IntentOnly,
        }
    }
}
