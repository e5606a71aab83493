//! Off-chain market metadata collaborator.
//!
//! The chain stores only a metadata hash; titles and descriptions live in an
//! external store keyed by market id. Metadata must never block market
//! display: absence or failure falls back to a generated placeholder.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::market::MarketId;

/// Human-readable market metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketMetadata {
    pub title: String,
    pub description: String,
    pub category: String,
}

/// Keyed metadata lookup. `Ok(None)` means the store has no entry.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn fetch(&self, market_id: &MarketId) -> Result<Option<MarketMetadata>>;
}

/// Store used when no metadata backend is configured.
pub struct NoopMetadataStore;

#[async_trait]
impl MetadataStore for NoopMetadataStore {
    async fn fetch(&self, _market_id: &MarketId) -> Result<Option<MarketMetadata>> {
        Ok(None)
    }
}

/// Deterministic stand-in metadata for a market with no stored entry.
pub fn placeholder_metadata(market_id: &MarketId) -> MarketMetadata {
    MarketMetadata {
        title: format!("Market {}", market_id.short()),
        description: "No description available yet.".to_string(),
        category: "uncategorized".to_string(),
    }
}
