//! Market registry, discovery, and the caches that front them.
//!
//! Primary discovery walks the on-chain index: a count mapping plus a
//! per-index id mapping. When the index yields nothing (fresh deployments,
//! lagging indexers) discovery falls back to scanning the creation
//! transition log for finalize operations that touched the status mapping,
//! retrying with linear backoff.
//!
//! Both caches live here, owned by the registry instance rather than module
//! state, so tests can run independent registries deterministically.
//! Callers must invalidate after any state-mutating transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::chain::ChainTransaction;
use crate::config::{COUNT_KEY, CREATE_MARKET_FUNCTION, ClientConfig, mappings};
use crate::error::Result;
use crate::mapping::MappingClient;
use crate::market::MarketId;
use crate::scalar;
use crate::state::{MarketState, MarketStatus};

/// One enumerable market, as read from the chain index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRegistryEntry {
    pub market_id: MarketId,
    pub status: MarketStatus,
    pub metadata_hash: Option<String>,
    pub creator: Option<String>,
    pub last_price_update: Option<u64>,
}

struct TtlCell<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> TtlCell<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Registry and market-state reader with TTL caches.
pub struct MarketRegistry {
    mapping: MappingClient,
    program_id: String,
    registry_ttl: Duration,
    state_ttl: Duration,
    max_attempts: u32,
    backoff_step: Duration,
    scan_page_size: u32,
    scan_max_pages: u32,
    registry_cache: Mutex<Option<TtlCell<Vec<MarketRegistryEntry>>>>,
    state_cache: Mutex<HashMap<MarketId, TtlCell<MarketState>>>,
}

impl MarketRegistry {
    pub fn new(mapping: MappingClient, config: &ClientConfig) -> Self {
        Self {
            mapping,
            program_id: config.program_id.clone(),
            registry_ttl: config.registry_ttl,
            state_ttl: config.market_state_ttl,
            max_attempts: config.discovery_max_attempts.max(1),
            backoff_step: config.discovery_backoff_step,
            scan_page_size: config.scan_page_size,
            scan_max_pages: config.scan_max_pages.max(1),
            registry_cache: Mutex::new(None),
            state_cache: Mutex::new(HashMap::new()),
        }
    }

    // ── Cache control ───────────────────────────────────────────────────

    /// Drop the cached registry listing. Call after any transaction that
    /// may create or retire markets.
    pub fn invalidate(&self) {
        let mut cache = lock_recovering(&self.registry_cache);
        *cache = None;
    }

    /// Drop the cached state of one market. Call after any transaction that
    /// traded against it.
    pub fn invalidate_market(&self, id: &MarketId) {
        let mut cache = lock_recovering(&self.state_cache);
        cache.remove(id);
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.invalidate();
        let mut cache = lock_recovering(&self.state_cache);
        cache.clear();
    }

    // ── Registry enumeration ────────────────────────────────────────────

    /// All known markets, served from cache within the TTL window.
    pub async fn entries(&self) -> Result<Vec<MarketRegistryEntry>> {
        {
            let cache = lock_recovering(&self.registry_cache);
            if let Some(cell) = cache.as_ref()
                && cell.fresh(self.registry_ttl)
            {
                return Ok(cell.value.clone());
            }
        }

        let ids = self.discover_ids().await;

        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            handles.push(tokio::spawn(fetch_entry(
                self.mapping.clone(),
                self.program_id.clone(),
                id,
            )));
        }
        let mut entries = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => log::warn!("registry detail task failed: {e}"),
            }
        }

        let mut cache = lock_recovering(&self.registry_cache);
        *cache = Some(TtlCell::new(entries.clone()));
        Ok(entries)
    }

    /// One market's registry entry, bypassing the listing cache.
    pub async fn entry(&self, id: &MarketId) -> Result<Option<MarketRegistryEntry>> {
        Ok(fetch_entry(self.mapping.clone(), self.program_id.clone(), id.clone()).await)
    }

    /// Enumerate market ids: index mappings first, creation-log fallback
    /// only when the index yields zero.
    async fn discover_ids(&self) -> Vec<MarketId> {
        let count = self
            .mapping
            .value(&self.program_id, mappings::MARKET_COUNT, COUNT_KEY)
            .await
            .and_then(|s| scalar::parse_u64(&s).ok())
            .unwrap_or(0);

        if count > 0 {
            let mut handles = Vec::with_capacity(count as usize);
            for index in 0..count {
                let mapping = self.mapping.clone();
                let program = self.program_id.clone();
                handles.push(tokio::spawn(async move {
                    mapping
                        .value(&program, mappings::MARKET_REGISTRY, &scalar::render_u64(index))
                        .await
                }));
            }
            let mut ids = Vec::new();
            for (index, handle) in handles.into_iter().enumerate() {
                match handle.await {
                    Ok(Some(raw)) => ids.push(MarketId::normalize(&raw)),
                    // Individual holes are tolerated; the market list is
                    // best-effort while the index catches up.
                    Ok(None) => log::warn!("registry index {index} is a hole; skipping"),
                    Err(e) => log::warn!("registry index {index} task failed: {e}"),
                }
            }
            if !ids.is_empty() {
                return ids;
            }
        }

        log::debug!("registry index empty; scanning creation log");
        for attempt in 1..=self.max_attempts {
            let ids = self.scan_creation_log().await;
            if !ids.is_empty() {
                return ids;
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff_step * attempt).await;
            }
        }
        Vec::new()
    }

    /// One pass over the paginated creation-transition log.
    async fn scan_creation_log(&self) -> Vec<MarketId> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for page in 0..self.scan_max_pages {
            let txs = match self
                .mapping
                .transitions_page(
                    &self.program_id,
                    CREATE_MARKET_FUNCTION,
                    page,
                    self.scan_page_size,
                )
                .await
            {
                Ok(txs) => txs,
                Err(e) => {
                    log::warn!("creation-log page {page} failed: {e}");
                    break;
                }
            };
            if txs.is_empty() {
                break;
            }
            for tx in &txs {
                if let Some(id) = market_id_from_transaction(tx)
                    && seen.insert(id.clone())
                {
                    ids.push(id);
                }
            }
            if (txs.len() as u32) < self.scan_page_size {
                break;
            }
        }
        ids
    }

    /// Resolve a known transaction id to the market it created or touched.
    ///
    /// Retries with linear backoff: a just-submitted transaction may not be
    /// indexed yet.
    pub async fn market_from_transaction(&self, tx_id: &str) -> Result<Option<MarketId>> {
        for attempt in 1..=self.max_attempts {
            match self.mapping.transaction(tx_id).await {
                Ok(Some(tx)) => {
                    if let Some(id) = market_id_from_transaction(&tx) {
                        return Ok(Some(id));
                    }
                    // Indexed but carries no status write: re-reads will not
                    // change that.
                    return Ok(None);
                }
                Ok(None) => {
                    log::debug!("transaction {tx_id} not indexed yet (attempt {attempt})");
                }
                Err(e) => {
                    log::warn!("transaction {tx_id} lookup failed (attempt {attempt}): {e}");
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff_step * attempt).await;
            }
        }
        Ok(None)
    }

    // ── Market state ────────────────────────────────────────────────────

    /// Trading state of one market, served from cache within its TTL.
    ///
    /// `Ok(None)` means the market does not exist (no status mapping entry).
    pub async fn market_state(&self, id: &MarketId) -> Result<Option<MarketState>> {
        {
            let cache = lock_recovering(&self.state_cache);
            if let Some(cell) = cache.get(id)
                && cell.fresh(self.state_ttl)
            {
                return Ok(Some(cell.value.clone()));
            }
        }

        let key = id.to_field_literal();
        let program = self.program_id.as_str();
        let (status, yes, no, pool, fee, price, outcome) = tokio::join!(
            self.mapping.value(program, mappings::MARKET_STATUS, &key),
            self.mapping.value(program, mappings::YES_RESERVES, &key),
            self.mapping.value(program, mappings::NO_RESERVES, &key),
            self.mapping.value(program, mappings::COLLATERAL_POOLS, &key),
            self.mapping.value(program, mappings::MARKET_FEE_BPS, &key),
            self.mapping.value(program, mappings::LAST_PRICES, &key),
            self.mapping.value(program, mappings::MARKET_OUTCOMES, &key),
        );

        let Some(status) = status.as_deref().and_then(MarketStatus::from_scalar) else {
            return Ok(None);
        };

        let state = MarketState {
            market_id: id.clone(),
            status,
            yes_reserve: parse_or_zero(yes.as_deref(), "yes_reserves", id),
            no_reserve: parse_or_zero(no.as_deref(), "no_reserves", id),
            collateral_pool: parse_or_zero(pool.as_deref(), "collateral_pools", id),
            fee_bps: fee
                .as_deref()
                .and_then(|s| scalar::parse_u64(s).ok())
                .unwrap_or(0),
            stored_price_bps: price.as_deref().and_then(|s| scalar::parse_u64(s).ok()),
            outcome: outcome.as_deref().and_then(|s| scalar::parse_bool(s).ok()),
        };

        let mut cache = lock_recovering(&self.state_cache);
        cache.insert(id.clone(), TtlCell::new(state.clone()));
        Ok(Some(state))
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_or_zero(raw: Option<&str>, what: &str, id: &MarketId) -> u128 {
    match raw {
        None => 0,
        Some(s) => scalar::parse_u128(s).unwrap_or_else(|e| {
            log::warn!("market {id}: bad {what} scalar ({e}); treating as 0");
            0
        }),
    }
}

/// Pull a market id out of a creation transaction's finalize operations.
///
/// The creation finalize block writes the status mapping keyed by the new
/// market's id; that key is the only public copy of an otherwise-private
/// value.
pub fn market_id_from_transaction(tx: &ChainTransaction) -> Option<MarketId> {
    tx.finalize
        .iter()
        .find(|op| op.mapping_name == mappings::MARKET_STATUS)
        .map(|op| MarketId::normalize(&op.key))
}

/// Fetch one registry entry; field reads run concurrently and fail
/// independently. Absent status means the market does not exist.
async fn fetch_entry(
    mapping: MappingClient,
    program: String,
    id: MarketId,
) -> Option<MarketRegistryEntry> {
    let key = id.to_field_literal();
    let (status, metadata_hash, creator, last_update) = tokio::join!(
        mapping.value(&program, mappings::MARKET_STATUS, &key),
        mapping.value(&program, mappings::METADATA_HASHES, &key),
        mapping.value(&program, mappings::MARKET_CREATORS, &key),
        mapping.value(&program, mappings::PRICE_UPDATED_HEIGHTS, &key),
    );

    let Some(status) = status.as_deref().and_then(MarketStatus::from_scalar) else {
        log::debug!("market {id} has no status entry; treating as nonexistent");
        return None;
    };

    Some(MarketRegistryEntry {
        market_id: id,
        status,
        metadata_hash,
        creator,
        last_price_update: last_update
            .as_deref()
            .and_then(|s| scalar::parse_u64(s).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::chain::{ChainReader, FinalizeOperation};

    /// Scripted chain backend for registry tests.
    #[derive(Default)]
    struct ScriptedChain {
        mappings: Mutex<StdHashMap<(String, String), String>>,
        pages: Mutex<Vec<Vec<ChainTransaction>>>,
        transactions: Mutex<StdHashMap<String, ChainTransaction>>,
        /// Serve `None` for transaction lookups this many times first.
        tx_lag: AtomicUsize,
        mapping_calls: AtomicUsize,
        page_calls: AtomicUsize,
    }

    impl ScriptedChain {
        fn set(&self, mapping: &str, key: &str, value: &str) {
            self.mappings
                .lock()
                .unwrap()
                .insert((mapping.to_string(), key.to_string()), value.to_string());
        }

        fn seed_market(&self, id: &str, status: u8) {
            let key = format!("{id}field");
            self.set(mappings::MARKET_STATUS, &key, &format!("{status}u8"));
            self.set(mappings::METADATA_HASHES, &key, "1234field");
            self.set(mappings::MARKET_CREATORS, &key, "aleo1creator");
            self.set(mappings::PRICE_UPDATED_HEIGHTS, &key, "990u64");
            self.set(mappings::YES_RESERVES, &key, "100u128");
            self.set(mappings::NO_RESERVES, &key, "300u128");
            self.set(mappings::COLLATERAL_POOLS, &key, "400u128");
            self.set(mappings::MARKET_FEE_BPS, &key, "30u64");
        }

        fn seed_index(&self, ids: &[&str]) {
            self.set(mappings::MARKET_COUNT, COUNT_KEY, &format!("{}u64", ids.len()));
            for (i, id) in ids.iter().enumerate() {
                self.set(
                    mappings::MARKET_REGISTRY,
                    &format!("{i}u64"),
                    &format!("{id}field"),
                );
            }
        }
    }

    fn creation_tx(txid: &str, market: &str) -> ChainTransaction {
        ChainTransaction {
            id: txid.to_string(),
            finalize: vec![FinalizeOperation {
                mapping_name: mappings::MARKET_STATUS.to_string(),
                key: format!("{market}field"),
                value: Some("0u8".to_string()),
            }],
        }
    }

    #[async_trait]
    impl ChainReader for ScriptedChain {
        async fn mapping_value(
            &self,
            _program: &str,
            mapping: &str,
            key: &str,
        ) -> Result<Option<String>> {
            self.mapping_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .mappings
                .lock()
                .unwrap()
                .get(&(mapping.to_string(), key.to_string()))
                .cloned())
        }

        async fn program_transitions(
            &self,
            _program: &str,
            _function: &str,
            page: u32,
            _page_size: u32,
        ) -> Result<Vec<ChainTransaction>> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            let pages = self.pages.lock().unwrap();
            Ok(pages.get(page as usize).cloned().unwrap_or_default())
        }

        async fn transaction(&self, id: &str) -> Result<Option<ChainTransaction>> {
            if self.tx_lag.load(Ordering::SeqCst) > 0 {
                self.tx_lag.fetch_sub(1, Ordering::SeqCst);
                return Ok(None);
            }
            Ok(self.transactions.lock().unwrap().get(id).cloned())
        }
    }

    fn test_config() -> ClientConfig {
        let mut cfg = ClientConfig::new("http://localhost:3030", "umbra_markets_v1.aleo");
        cfg.min_dispatch_interval = Duration::ZERO;
        cfg.discovery_backoff_step = Duration::from_millis(10);
        cfg.discovery_max_attempts = 3;
        cfg
    }

    fn registry(chain: Arc<ScriptedChain>, cfg: &ClientConfig) -> MarketRegistry {
        let mapping = MappingClient::from_config(chain, cfg);
        MarketRegistry::new(mapping, cfg)
    }

    #[tokio::test]
    async fn enumerates_via_index_mappings() {
        let chain = Arc::new(ScriptedChain::default());
        chain.seed_index(&["5", "9"]);
        chain.seed_market("5", 0);
        chain.seed_market("9", 1);

        let reg = registry(chain, &test_config());
        let mut entries = reg.entries().await.unwrap();
        entries.sort_by(|a, b| a.market_id.as_str().cmp(b.market_id.as_str()));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].market_id.as_str(), "5");
        assert_eq!(entries[0].status, MarketStatus::Open);
        assert_eq!(entries[1].status, MarketStatus::Resolved);
        assert_eq!(entries[0].metadata_hash.as_deref(), Some("1234field"));
        assert_eq!(entries[0].last_price_update, Some(990));
    }

    #[tokio::test]
    async fn index_holes_are_tolerated() {
        let chain = Arc::new(ScriptedChain::default());
        chain.seed_index(&["5", "9"]);
        // Poke a hole at index 1.
        chain
            .mappings
            .lock()
            .unwrap()
            .remove(&(mappings::MARKET_REGISTRY.to_string(), "1u64".to_string()));
        chain.seed_market("5", 0);

        let reg = registry(chain, &test_config());
        let entries = reg.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].market_id.as_str(), "5");
    }

    #[tokio::test]
    async fn registry_ttl_avoids_second_fetch_until_invalidated() {
        let chain = Arc::new(ScriptedChain::default());
        chain.seed_index(&["5"]);
        chain.seed_market("5", 0);

        let reg = registry(chain.clone(), &test_config());
        reg.entries().await.unwrap();
        let calls_after_first = chain.mapping_calls.load(Ordering::SeqCst);
        reg.entries().await.unwrap();
        assert_eq!(
            chain.mapping_calls.load(Ordering::SeqCst),
            calls_after_first,
            "second read within TTL must not hit the chain"
        );

        reg.invalidate();
        reg.entries().await.unwrap();
        assert!(
            chain.mapping_calls.load(Ordering::SeqCst) > calls_after_first,
            "read after invalidation must hit the chain"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_scans_creation_log_when_index_is_empty() {
        let chain = Arc::new(ScriptedChain::default());
        // No count mapping at all; two creations in the log, one duplicated.
        *chain.pages.lock().unwrap() = vec![vec![
            creation_tx("at1aaa0000000000", "5"),
            creation_tx("at1bbb0000000000", "9"),
            creation_tx("at1ccc0000000000", "5"),
        ]];
        chain.seed_market("5", 0);
        chain.seed_market("9", 0);

        let reg = registry(chain, &test_config());
        let mut entries = reg.entries().await.unwrap();
        entries.sort_by(|a, b| a.market_id.as_str().cmp(b.market_id.as_str()));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].market_id.as_str(), "5");
        assert_eq!(entries[1].market_id.as_str(), "9");
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_retries_with_backoff_until_log_appears() {
        let chain = Arc::new(ScriptedChain::default());
        chain.seed_market("5", 0);
        let reg = registry(chain.clone(), &test_config());

        // First attempt sees an empty log; seed it from a side task while
        // discovery is backing off.
        let chain2 = chain.clone();
        let seed = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            *chain2.pages.lock().unwrap() = vec![vec![creation_tx("at1aaa0000000000", "5")]];
        });

        let entries = reg.entries().await.unwrap();
        seed.await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(chain.page_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn market_state_reads_and_caches() {
        let chain = Arc::new(ScriptedChain::default());
        chain.seed_market("5", 0);
        chain.set(mappings::LAST_PRICES, "5field", "7100u64");

        let cfg = test_config();
        let reg = registry(chain.clone(), &cfg);
        let id = MarketId::normalize("5");

        let state = reg.market_state(&id).await.unwrap().unwrap();
        assert_eq!(state.yes_reserve, 100);
        assert_eq!(state.no_reserve, 300);
        assert_eq!(state.fee_bps, 30);
        assert_eq!(state.stored_price_bps, Some(7_100));
        assert_eq!(state.price_yes_bps(), 7_100);
        assert_eq!(state.outcome, None);

        let calls = chain.mapping_calls.load(Ordering::SeqCst);
        reg.market_state(&id).await.unwrap().unwrap();
        assert_eq!(chain.mapping_calls.load(Ordering::SeqCst), calls);

        reg.invalidate_market(&id);
        reg.market_state(&id).await.unwrap().unwrap();
        assert!(chain.mapping_calls.load(Ordering::SeqCst) > calls);
    }

    #[tokio::test]
    async fn absent_status_means_no_market() {
        let chain = Arc::new(ScriptedChain::default());
        let reg = registry(chain, &test_config());
        let id = MarketId::normalize("404");
        assert!(reg.market_state(&id).await.unwrap().is_none());
        assert!(reg.entry(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolved_market_state_carries_outcome() {
        let chain = Arc::new(ScriptedChain::default());
        chain.seed_market("5", 1);
        chain.set(mappings::MARKET_OUTCOMES, "5field", "true");

        let reg = registry(chain, &test_config());
        let state = reg
            .market_state(&MarketId::normalize("5"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.status, MarketStatus::Resolved);
        assert_eq!(state.outcome, Some(true));
        assert_eq!(state.winning_side(), Some(crate::amm::Side::Yes));
    }

    #[tokio::test(start_paused = true)]
    async fn market_from_transaction_rides_out_indexing_lag() {
        let chain = Arc::new(ScriptedChain::default());
        chain
            .transactions
            .lock()
            .unwrap()
            .insert("at1lagged0000000".into(), creation_tx("at1lagged0000000", "5"));
        chain.tx_lag.store(2, Ordering::SeqCst);

        let reg = registry(chain, &test_config());
        let id = reg
            .market_from_transaction("at1lagged0000000")
            .await
            .unwrap();
        assert_eq!(id, Some(MarketId::normalize("5")));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_transaction_resolves_to_none_after_retries() {
        let chain = Arc::new(ScriptedChain::default());
        let reg = registry(chain, &test_config());
        assert_eq!(
            reg.market_from_transaction("at1missing000000").await.unwrap(),
            None
        );
    }

    #[test]
    fn extracts_market_id_from_status_write() {
        let tx = creation_tx("at1aaa0000000000", "77");
        assert_eq!(
            market_id_from_transaction(&tx),
            Some(MarketId::normalize("77"))
        );

        let other = ChainTransaction {
            id: "at1bbb0000000000".into(),
            finalize: vec![FinalizeOperation {
                mapping_name: "unrelated".into(),
                key: "5field".into(),
                value: None,
            }],
        };
        assert_eq!(market_id_from_transaction(&other), None);
    }
}
