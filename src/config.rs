use std::time::Duration;

/// On-chain mapping names of the market program.
pub mod mappings {
    /// Scalar count of created markets (key [`super::COUNT_KEY`]).
    pub const MARKET_COUNT: &str = "market_count";
    /// Index (`<i>u64`) to market-id mapping backing enumeration.
    pub const MARKET_REGISTRY: &str = "market_registry";
    /// Market id to status scalar. Written by the creation finalize block,
    /// which makes it the recovery key for transaction-log discovery.
    pub const MARKET_STATUS: &str = "market_status";
    pub const YES_RESERVES: &str = "yes_reserves";
    pub const NO_RESERVES: &str = "no_reserves";
    pub const COLLATERAL_POOLS: &str = "collateral_pools";
    pub const MARKET_FEE_BPS: &str = "market_fee_bps";
    /// Last traded YES price in basis points, updated on every swap.
    pub const LAST_PRICES: &str = "last_prices";
    pub const PRICE_UPDATED_HEIGHTS: &str = "price_updated_heights";
    pub const METADATA_HASHES: &str = "metadata_hashes";
    pub const MARKET_CREATORS: &str = "market_creators";
    /// Resolved outcome (`true` = YES). Absent while the market is open.
    pub const MARKET_OUTCOMES: &str = "market_outcomes";
}

/// Key under which singleton scalars (e.g. the market count) are stored.
pub const COUNT_KEY: &str = "0u8";

/// Native program holding spendable credit records.
pub const CREDITS_PROGRAM_ID: &str = "credits.aleo";

/// Prefix carried by every transaction id on the wire.
pub const TX_ID_PREFIX: &str = "at1";

/// Prefix of an undecrypted record ciphertext.
pub const CIPHERTEXT_PREFIX: &str = "record1";

/// Sentinel placed in record-typed input slots in intent mode; the wallet
/// substitutes a concrete record at signing time.
pub const RECORD_PLACEHOLDER: &str = "{}";

/// Value assumed for an opaque (ciphertext-held) credit record whose real
/// amount the client cannot see.
pub const OPAQUE_RECORD_VALUE: u64 = 1;

/// Plaintext key aliases probed, in order, on wallet-returned record objects.
pub const PLAINTEXT_KEY_ALIASES: [&str; 5] = [
    "plaintext",
    "recordPlaintext",
    "record_plaintext",
    "data",
    "record",
];

/// Transaction-id key aliases probed, in order, on wallet execution results.
pub const TXID_ALIASES: [&str; 4] = ["transactionId", "txId", "transaction_id", "id"];

/// Maximum nesting depth of the structural fallback scan for a transaction id.
pub const TXID_SCAN_DEPTH: usize = 4;

/// Transition function that creates a market; its finalize block writes the
/// status mapping, which the discovery fallback scans for.
pub const CREATE_MARKET_FUNCTION: &str = "create_market";

/// Client configuration.
///
/// The rate-limit fields model the public node gateway's ceiling: at most
/// `max_concurrent_reads` mapping reads in flight, dispatched no closer
/// together than `min_dispatch_interval`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the chain REST gateway.
    pub endpoint: String,
    /// Program id the market contract is deployed under.
    pub program_id: String,
    /// Historic program ids the same records may have been fetched under.
    /// Position queries span all of these and de-duplicate by fingerprint.
    pub program_aliases: Vec<String>,
    pub max_concurrent_reads: usize,
    pub min_dispatch_interval: Duration,
    /// Per-read timeout; expiry degrades the read to a soft not-found.
    pub read_timeout: Duration,
    /// TTL of the cached market registry listing.
    pub registry_ttl: Duration,
    /// TTL of cached per-market state; shorter than the registry TTL because
    /// reserves move on every trade.
    pub market_state_ttl: Duration,
    /// Attempts for discovery/extraction paths that race indexing lag.
    pub discovery_max_attempts: u32,
    /// Linear backoff step between discovery attempts (attempt n sleeps n steps).
    pub discovery_backoff_step: Duration,
    /// Page size for the transaction-log discovery fallback.
    pub scan_page_size: u32,
    /// Pages scanned per fallback attempt before giving up on the attempt.
    pub scan_max_pages: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.explorer.aleo.org/v1/testnet".to_string(),
            program_id: "umbra_markets_v1.aleo".to_string(),
            program_aliases: vec!["umbra_markets.aleo".to_string()],
            max_concurrent_reads: 4,
            min_dispatch_interval: Duration::from_millis(120),
            read_timeout: Duration::from_secs(10),
            registry_ttl: Duration::from_secs(60),
            market_state_ttl: Duration::from_secs(15),
            discovery_max_attempts: 5,
            discovery_backoff_step: Duration::from_millis(500),
            scan_page_size: 50,
            scan_max_pages: 4,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: &str, program_id: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            program_id: program_id.to_string(),
            ..Self::default()
        }
    }

    /// All program ids position records may live under: the current id first,
    /// then the historic aliases.
    pub fn all_program_ids(&self) -> Vec<String> {
        let mut ids = vec![self.program_id.clone()];
        for alias in &self.program_aliases {
            if !ids.contains(alias) {
                ids.push(alias.clone());
            }
        }
        ids
    }
}
