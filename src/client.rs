//! High-level market client.
//!
//! `MarketClient` wires the mapping client, registry, wallet connection, and
//! metadata store into the operations an application actually calls: list
//! and price markets, buy shares, redeem payouts, deposit collateral. Every
//! state-mutating submission invalidates the affected caches before the
//! transaction id is returned.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::amm::{self, Side, SwapQuote};
use crate::chain::{ChainReader, HttpChainBackend};
use crate::config::{CREDITS_PROGRAM_ID, ClientConfig};
use crate::error::{Error, Result};
use crate::intent::{InputValue, Literal, TransactionIntent, build_intent, extract_transaction_id};
use crate::mapping::MappingClient;
use crate::market::MarketId;
use crate::metadata::{MarketMetadata, MetadataStore, NoopMetadataStore, placeholder_metadata};
use crate::record::credit::{CreditRecord, select_spend_and_fee};
use crate::record::position::{
    AggregatedPosition, PositionRecord, aggregate_position, collect_positions,
    select_deposit_record, select_redemption_record,
};
use crate::registry::{MarketRegistry, MarketRegistryEntry};
use crate::state::MarketState;
use crate::wallet::{RecordAccess, WalletApi, WalletConnection};

/// Transition functions of the market program.
pub mod functions {
    pub const BUY_SHARES: &str = "buy_shares";
    pub const REDEEM_PAYOUT: &str = "redeem_payout";
    pub const DEPOSIT_COLLATERAL: &str = "deposit_collateral";
}

/// A registry entry joined with its (possibly placeholder) metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub entry: MarketRegistryEntry,
    pub metadata: MarketMetadata,
}

/// Result of a successful share purchase submission.
#[derive(Debug, Clone)]
pub struct BuyResult {
    pub transaction_id: String,
    pub market_id: MarketId,
    pub side: Side,
    pub collateral_in: u64,
    /// The quote this purchase was built against. The chain settles the
    /// same integer math, but state may have moved since the read.
    pub quote: SwapQuote,
}

/// Result of a successful payout redemption submission.
#[derive(Debug, Clone)]
pub struct RedeemResult {
    pub transaction_id: String,
    pub market_id: MarketId,
    /// Winning-side shares of the redeemed record; unknown in intent mode.
    pub winning_shares: Option<u128>,
}

/// Result of a successful collateral deposit submission.
#[derive(Debug, Clone)]
pub struct DepositResult {
    pub transaction_id: String,
    pub market_id: MarketId,
    pub amount: u64,
}

/// Client for one market program on one chain endpoint.
pub struct MarketClient {
    config: ClientConfig,
    registry: MarketRegistry,
    wallet: WalletConnection,
    metadata: Arc<dyn MetadataStore>,
}

impl MarketClient {
    /// Construct against the configured REST gateway.
    pub fn new(config: ClientConfig, wallet: WalletConnection) -> Self {
        let backend = Arc::new(HttpChainBackend::new(&config.endpoint));
        Self::with_backend(config, backend, wallet, Arc::new(NoopMetadataStore))
    }

    /// Construct with explicit collaborators (custom backend, metadata store).
    pub fn with_backend(
        config: ClientConfig,
        reader: Arc<dyn ChainReader>,
        wallet: WalletConnection,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let mapping = MappingClient::from_config(reader, &config);
        let registry = MarketRegistry::new(mapping, &config);
        Self {
            config,
            registry,
            wallet,
            metadata,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &MarketRegistry {
        &self.registry
    }

    // ── Discovery & pricing ─────────────────────────────────────────────

    /// All known markets with metadata merged in.
    ///
    /// Metadata is best-effort: a missing or failing store entry yields the
    /// generated placeholder and never blocks the listing.
    pub async fn markets(&self) -> Result<Vec<MarketSummary>> {
        let entries = self.registry.entries().await?;
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let metadata = self.metadata_or_placeholder(&entry.market_id).await;
            summaries.push(MarketSummary { entry, metadata });
        }
        Ok(summaries)
    }

    /// One market, or `None` when the chain has no status entry for it.
    pub async fn market(&self, id: &MarketId) -> Result<Option<MarketSummary>> {
        let Some(entry) = self.registry.entry(id).await? else {
            return Ok(None);
        };
        let metadata = self.metadata_or_placeholder(id).await;
        Ok(Some(MarketSummary { entry, metadata }))
    }

    pub async fn market_state(&self, id: &MarketId) -> Result<Option<MarketState>> {
        self.registry.market_state(id).await
    }

    /// Current YES price in basis points (stored price preferred, reserves
    /// otherwise).
    pub async fn price_yes_bps(&self, id: &MarketId) -> Result<Option<u64>> {
        Ok(self
            .registry
            .market_state(id)
            .await?
            .map(|s| s.price_yes_bps()))
    }

    /// Quote a purchase without submitting anything.
    pub async fn quote_buy(
        &self,
        id: &MarketId,
        side: Side,
        collateral_microcredits: u64,
    ) -> Result<SwapQuote> {
        let state = self.require_market(id).await?;
        amm::swap_shares_out(
            side,
            state.yes_reserve,
            state.no_reserve,
            state.fee_bps,
            u128::from(collateral_microcredits),
        )
    }

    /// Resolve a transaction id to the market it touched, riding out
    /// indexing lag with backoff.
    pub async fn market_from_transaction(&self, tx_id: &str) -> Result<Option<MarketId>> {
        self.registry.market_from_transaction(tx_id).await
    }

    /// The caller's aggregated position in one market.
    ///
    /// Requires a wallet with record queries; `None` when no record matches.
    pub async fn position(&self, id: &MarketId) -> Result<Option<AggregatedPosition>> {
        let records = self.fetch_position_records().await?;
        Ok(aggregate_position(&records, id))
    }

    // ── Trading operations ──────────────────────────────────────────────

    /// Buy `side` shares with `collateral_microcredits` of collateral.
    pub async fn buy_shares(
        &self,
        id: &MarketId,
        side: Side,
        collateral_microcredits: u64,
        fee_microcredits: u64,
    ) -> Result<BuyResult> {
        if collateral_microcredits == 0 {
            return Err(Error::Validation("collateral must be non-zero".into()));
        }
        let state = self.require_market(id).await?;
        if state.is_paused() {
            return Err(Error::Validation(format!("market {id} is paused")));
        }
        if state.status.is_resolved() {
            return Err(Error::Validation(format!(
                "market {id} is resolved; trading is closed"
            )));
        }

        let quote = amm::swap_shares_out(
            side,
            state.yes_reserve,
            state.no_reserve,
            state.fee_bps,
            u128::from(collateral_microcredits),
        )?;

        let (spend_input, fee_record) = match self.wallet.record_mode() {
            RecordAccess::Explicit => {
                let records = self.fetch_credit_records().await?;
                let (spend, fee) =
                    select_spend_and_fee(&records, collateral_microcredits, fee_microcredits)?;
                (record_input(spend), fee.plaintext.clone())
            }
            RecordAccess::IntentOnly => (InputValue::RecordPlaceholder, None),
        };

        let intent = build_intent(
            &self.config.program_id,
            functions::BUY_SHARES,
            vec![
                spend_input,
                InputValue::Literal(Literal::Field(id.as_str().to_string())),
                InputValue::Literal(Literal::Bool(matches!(side, Side::Yes))),
                InputValue::Literal(Literal::U64(collateral_microcredits)),
            ],
            fee_microcredits,
            true,
            fee_record,
        )?;

        let transaction_id = self.execute_intent(intent, id).await?;
        Ok(BuyResult {
            transaction_id,
            market_id: id.clone(),
            side,
            collateral_in: collateral_microcredits,
            quote,
        })
    }

    /// Redeem the payout of a resolved market.
    pub async fn redeem_payout(
        &self,
        id: &MarketId,
        fee_microcredits: u64,
    ) -> Result<RedeemResult> {
        let state = self.require_market(id).await?;
        if !state.status.is_resolved() {
            return Err(Error::Validation(format!("market {id} is not resolved")));
        }
        let outcome_yes = state.outcome.ok_or_else(|| {
            Error::Validation(format!("market {id} is resolved but has no outcome"))
        })?;

        let (position_input, winning_shares) = match self.wallet.record_mode() {
            RecordAccess::Explicit => {
                let records = self.fetch_position_records().await?;
                let picked = select_redemption_record(&records, id, outcome_yes)?;
                (
                    InputValue::Record(picked.plaintext.clone()),
                    Some(picked.winning_shares(outcome_yes)),
                )
            }
            RecordAccess::IntentOnly => (InputValue::RecordPlaceholder, None),
        };

        let intent = build_intent(
            &self.config.program_id,
            functions::REDEEM_PAYOUT,
            vec![
                position_input,
                InputValue::Literal(Literal::Field(id.as_str().to_string())),
            ],
            fee_microcredits,
            true,
            None,
        )?;

        let transaction_id = self.execute_intent(intent, id).await?;
        Ok(RedeemResult {
            transaction_id,
            market_id: id.clone(),
            winning_shares,
        })
    }

    /// Move collateral into a position record for later trading.
    pub async fn deposit_collateral(
        &self,
        id: &MarketId,
        amount_microcredits: u64,
        fee_microcredits: u64,
    ) -> Result<DepositResult> {
        if amount_microcredits == 0 {
            return Err(Error::Validation("deposit amount must be non-zero".into()));
        }
        let state = self.require_market(id).await?;
        if state.is_paused() {
            return Err(Error::Validation(format!("market {id} is paused")));
        }

        let (position_input, credit_input, fee_record) = match self.wallet.record_mode() {
            RecordAccess::Explicit => {
                let positions = self.fetch_position_records().await?;
                let position =
                    select_deposit_record(&positions, id, u128::from(amount_microcredits))?;
                let credits = self.fetch_credit_records().await?;
                let (spend, fee) =
                    select_spend_and_fee(&credits, amount_microcredits, fee_microcredits)?;
                guard_distinct(position, spend)?;
                (
                    InputValue::Record(position.plaintext.clone()),
                    record_input(spend),
                    fee.plaintext.clone(),
                )
            }
            RecordAccess::IntentOnly => (
                InputValue::RecordPlaceholder,
                InputValue::RecordPlaceholder,
                None,
            ),
        };

        let intent = build_intent(
            &self.config.program_id,
            functions::DEPOSIT_COLLATERAL,
            vec![
                position_input,
                credit_input,
                InputValue::Literal(Literal::Field(id.as_str().to_string())),
                InputValue::Literal(Literal::U64(amount_microcredits)),
            ],
            fee_microcredits,
            true,
            fee_record,
        )?;

        let transaction_id = self.execute_intent(intent, id).await?;
        Ok(DepositResult {
            transaction_id,
            market_id: id.clone(),
            amount: amount_microcredits,
        })
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn provider(&self) -> Result<Arc<dyn WalletApi>> {
        self.wallet
            .resolve_provider()
            .ok_or_else(|| Error::Wallet("no wallet provider connected".into()))
    }

    async fn require_market(&self, id: &MarketId) -> Result<MarketState> {
        self.registry
            .market_state(id)
            .await?
            .ok_or_else(|| Error::NoMatchingRecord(format!("unknown market {id}")))
    }

    async fn metadata_or_placeholder(&self, id: &MarketId) -> MarketMetadata {
        match self.metadata.fetch(id).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => placeholder_metadata(id),
            Err(e) => {
                log::warn!("metadata fetch for market {id} failed ({e}); using placeholder");
                placeholder_metadata(id)
            }
        }
    }

    /// Fetch the caller's credit records from the wallet.
    async fn fetch_credit_records(&self) -> Result<Vec<CreditRecord>> {
        let provider = self.provider()?;
        let values = provider
            .request_records(CREDITS_PROGRAM_ID, true)
            .await
            .map_err(|e| Error::Wallet(format!("credit record fetch failed: {e}")))?;
        Ok(values.iter().map(CreditRecord::from_wallet_value).collect())
    }

    /// Fetch position records across every known program-id alias,
    /// de-duplicated by fingerprint. Individual alias failures are holes.
    async fn fetch_position_records(&self) -> Result<Vec<PositionRecord>> {
        let provider = self.provider()?;
        let mut values: Vec<Value> = Vec::new();
        for program in self.config.all_program_ids() {
            match provider.request_records(&program, true).await {
                Ok(mut batch) => values.append(&mut batch),
                Err(e) => {
                    log::warn!("record fetch under {program} failed ({e}); skipping alias");
                }
            }
        }
        Ok(collect_positions(&values))
    }

    /// Submit an intent, classify failures, extract the transaction id, and
    /// invalidate the caches the transaction may have outdated.
    async fn execute_intent(
        &self,
        intent: TransactionIntent,
        market: &MarketId,
    ) -> Result<String> {
        let provider = self.provider()?;
        let function = intent.function.clone();
        let result = provider
            .execute(&intent)
            .await
            .map_err(Error::classify_write)?;
        let transaction_id = extract_transaction_id(&result)?;

        self.registry.invalidate();
        self.registry.invalidate_market(market);
        log::info!("submitted {function} for market {market}: {transaction_id}");
        Ok(transaction_id)
    }
}

/// A credit record as an input slot: plaintext when decrypted, placeholder
/// when the wallet kept it opaque (validation defers to signing).
fn record_input(record: &CreditRecord) -> InputValue {
    match &record.plaintext {
        Some(plaintext) => InputValue::Record(plaintext.clone()),
        None => InputValue::RecordPlaceholder,
    }
}

/// A position record and a credit record must also differ by identity when
/// both fill record slots of one transition.
fn guard_distinct(position: &PositionRecord, credit: &CreditRecord) -> Result<()> {
    if position.fingerprint == credit.fingerprint {
        return Err(Error::DoubleSpendRisk {
            record_fingerprint: crate::record::short_fingerprint(&position.fingerprint)
                .to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::chain::ChainTransaction;
    use crate::config::{COUNT_KEY, mappings};

    // ── Test doubles ────────────────────────────────────────────────────

    #[derive(Default)]
    struct MapChain {
        mappings: Mutex<HashMap<(String, String), String>>,
    }

    impl MapChain {
        fn set(&self, mapping: &str, key: &str, value: &str) {
            self.mappings
                .lock()
                .unwrap()
                .insert((mapping.to_string(), key.to_string()), value.to_string());
        }

        fn seed_open_market(&self, id: &str) {
            let key = format!("{id}field");
            self.set(mappings::MARKET_STATUS, &key, "0u8");
            self.set(mappings::YES_RESERVES, &key, "1000000u128");
            self.set(mappings::NO_RESERVES, &key, "1000000u128");
            self.set(mappings::COLLATERAL_POOLS, &key, "2000000u128");
            self.set(mappings::MARKET_FEE_BPS, &key, "30u64");
        }

        fn seed_resolved_market(&self, id: &str, outcome_yes: bool) {
            self.seed_open_market(id);
            let key = format!("{id}field");
            self.set(mappings::MARKET_STATUS, &key, "1u8");
            self.set(
                mappings::MARKET_OUTCOMES,
                &key,
                if outcome_yes { "true" } else { "false" },
            );
        }
    }

    #[async_trait]
    impl ChainReader for MapChain {
        async fn mapping_value(
            &self,
            _program: &str,
            mapping: &str,
            key: &str,
        ) -> Result<Option<String>> {
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
            _page: u32,
            _page_size: u32,
        ) -> Result<Vec<ChainTransaction>> {
            Ok(Vec::new())
        }

        async fn transaction(&self, _id: &str) -> Result<Option<ChainTransaction>> {
            Ok(None)
        }
    }

    struct MockWallet {
        records: HashMap<String, Vec<Value>>,
        records_supported: bool,
        executed: Mutex<Vec<TransactionIntent>>,
        fail_with: Option<String>,
        result: Value,
    }

    impl MockWallet {
        fn new() -> Self {
            Self {
                records: HashMap::new(),
                records_supported: true,
                executed: Mutex::new(Vec::new()),
                fail_with: None,
                result: json!({ "transactionId": "at1mock00000000000" }),
            }
        }

        fn with_credits(mut self, plaintexts: &[&str]) -> Self {
            self.records.insert(
                CREDITS_PROGRAM_ID.to_string(),
                plaintexts.iter().map(|p| json!(p)).collect(),
            );
            self
        }

        fn with_positions(mut self, program: &str, plaintexts: &[&str]) -> Self {
            self.records.insert(
                program.to_string(),
                plaintexts.iter().map(|p| json!(p)).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl WalletApi for Arc<MockWallet> {
        async fn execute(&self, intent: &TransactionIntent) -> Result<Value> {
            if let Some(msg) = &self.fail_with {
                return Err(Error::Wallet(msg.clone()));
            }
            self.executed.lock().unwrap().push(intent.clone());
            Ok(self.result.clone())
        }

        async fn request_records(&self, program: &str, _decrypt: bool) -> Result<Vec<Value>> {
            Ok(self.records.get(program).cloned().unwrap_or_default())
        }

        fn supports_record_queries(&self) -> bool {
            self.records_supported
        }
    }

    fn credit_plaintext(tag: &str, microcredits: u64) -> String {
        format!(
            "{{ owner: aleo1{tag}.private, microcredits: {microcredits}u64.private, _nonce: {tag}group.public }}"
        )
    }

    fn position_plaintext(market: &str, yes: u128, no: u128, avail: u128, nonce: &str) -> String {
        format!(
            "{{ owner: aleo1holder.private, market_id: {market}field.private, \
             yes_shares: {yes}u128.private, no_shares: {no}u128.private, \
             collateral_available: {avail}u128.private, collateral_committed: 0u128.private, \
             payout_claimed: false.private, _nonce: {nonce}group.public }}"
        )
    }

    fn test_config() -> ClientConfig {
        let mut cfg = ClientConfig::new("http://localhost:3030", "umbra_markets_v1.aleo");
        cfg.program_aliases = vec![];
        cfg.min_dispatch_interval = Duration::ZERO;
        cfg.discovery_backoff_step = Duration::from_millis(1);
        cfg.discovery_max_attempts = 1;
        cfg
    }

    fn client_with(
        chain: Arc<MapChain>,
        wallet: Arc<MockWallet>,
        intent_only: bool,
    ) -> MarketClient {
        let connection = WalletConnection {
            direct: Some(Arc::new(wallet) as Arc<dyn WalletApi>),
            intent_only,
            ..WalletConnection::default()
        };
        MarketClient::with_backend(
            test_config(),
            chain,
            connection,
            Arc::new(NoopMetadataStore),
        )
    }

    // ── Tests ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn buy_shares_explicit_mode_builds_full_intent() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let wallet = Arc::new(MockWallet::new().with_credits(&[
            &credit_plaintext("small", 5_000),
            &credit_plaintext("big", 50_000),
        ]));
        let client = client_with(chain, wallet.clone(), false);
        let id = MarketId::normalize("5");

        let result = client.buy_shares(&id, Side::Yes, 10_000, 1_000).await.unwrap();
        assert_eq!(result.transaction_id, "at1mock00000000000");
        assert_eq!(result.quote.shares_out, 19_871);

        let executed = wallet.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        let intent = &executed[0];
        assert_eq!(intent.function, functions::BUY_SHARES);
        assert_eq!(intent.record_slots, vec![0]);
        // The 50k record funds the spend; the 5k record pays the fee.
        assert!(intent.inputs[0].contains("50000u64"));
        assert_eq!(intent.inputs[1], "5field");
        assert_eq!(intent.inputs[2], "true");
        assert_eq!(intent.inputs[3], "10000u64");
        assert!(intent.fee_private);
        assert_eq!(intent.fee_microcredits, 1_000);
        assert!(intent.fee_record.as_deref().unwrap().contains("5000u64"));
    }

    #[tokio::test]
    async fn buy_shares_intent_mode_uses_placeholder() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let wallet = Arc::new(MockWallet::new());
        let client = client_with(chain, wallet.clone(), true);
        let id = MarketId::normalize("5");

        client.buy_shares(&id, Side::No, 2_500, 500).await.unwrap();

        let executed = wallet.executed.lock().unwrap();
        let intent = &executed[0];
        assert_eq!(intent.inputs[0], crate::config::RECORD_PLACEHOLDER);
        assert_eq!(intent.record_slots, vec![0]);
        assert_eq!(intent.inputs[2], "false");
        assert!(intent.fee_record.is_none());
    }

    #[tokio::test]
    async fn buy_on_paused_market_is_rejected() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        chain.set(mappings::MARKET_STATUS, "5field", "2u8");
        let client = client_with(chain, Arc::new(MockWallet::new()), false);

        let err = client
            .buy_shares(&MarketId::normalize("5"), Side::Yes, 100, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("paused"));
    }

    #[tokio::test]
    async fn buy_on_unknown_market_is_no_matching_record() {
        let chain = Arc::new(MapChain::default());
        let client = client_with(chain, Arc::new(MockWallet::new()), false);
        let err = client
            .buy_shares(&MarketId::normalize("404"), Side::Yes, 100, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingRecord(_)));
    }

    #[tokio::test]
    async fn buy_invalidates_market_state_cache() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let wallet = Arc::new(
            MockWallet::new().with_credits(&[&credit_plaintext("a", 100_000),
                &credit_plaintext("b", 100_000)]),
        );
        let client = client_with(chain.clone(), wallet, false);
        let id = MarketId::normalize("5");

        client.buy_shares(&id, Side::Yes, 10_000, 100).await.unwrap();

        // Mutate chain state; a fresh read must see it despite the TTL.
        chain.set(mappings::YES_RESERVES, "5field", "777u128");
        let state = client.market_state(&id).await.unwrap().unwrap();
        assert_eq!(state.yes_reserve, 777);
    }

    #[tokio::test]
    async fn wallet_failure_is_classified() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let mut wallet = MockWallet::new().with_credits(&[
            &credit_plaintext("a", 100_000),
            &credit_plaintext("b", 100_000),
        ]);
        wallet.fail_with = Some("proof synthesis failed".into());
        let client = client_with(chain, Arc::new(wallet), false);

        let err = client
            .buy_shares(&MarketId::normalize("5"), Side::Yes, 10_000, 100)
            .await
            .unwrap_err();
        match err {
            Error::Execution { category, .. } => {
                assert_eq!(category, crate::error::ExecutionFailure::ProofGeneration)
            }
            other => panic!("expected classified execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redeem_picks_max_winning_record() {
        let chain = Arc::new(MapChain::default());
        chain.seed_resolved_market("5", true);
        let wallet = Arc::new(MockWallet::new().with_positions(
            "umbra_markets_v1.aleo",
            &[
                &position_plaintext("5", 3, 0, 0, "n1"),
                &position_plaintext("5", 9, 0, 0, "n2"),
            ],
        ));
        let client = client_with(chain, wallet.clone(), false);

        let result = client
            .redeem_payout(&MarketId::normalize("5"), 500)
            .await
            .unwrap();
        assert_eq!(result.winning_shares, Some(9));

        let executed = wallet.executed.lock().unwrap();
        let intent = &executed[0];
        assert_eq!(intent.function, functions::REDEEM_PAYOUT);
        assert!(intent.inputs[0].contains("yes_shares: 9u128"));
        assert_eq!(intent.record_slots, vec![0]);
    }

    #[tokio::test]
    async fn redeem_unresolved_market_is_rejected() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let client = client_with(chain, Arc::new(MockWallet::new()), false);
        let err = client
            .redeem_payout(&MarketId::normalize("5"), 500)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not resolved"));
    }

    #[tokio::test]
    async fn deposit_flags_both_record_slots() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let wallet = Arc::new(
            MockWallet::new()
                .with_positions(
                    "umbra_markets_v1.aleo",
                    &[&position_plaintext("5", 0, 0, 200, "n1")],
                )
                .with_credits(&[
                    &credit_plaintext("a", 30_000),
                    &credit_plaintext("b", 30_000),
                ]),
        );
        let client = client_with(chain, wallet.clone(), false);

        let result = client
            .deposit_collateral(&MarketId::normalize("5"), 20_000, 800)
            .await
            .unwrap();
        assert_eq!(result.amount, 20_000);

        let executed = wallet.executed.lock().unwrap();
        let intent = &executed[0];
        assert_eq!(intent.function, functions::DEPOSIT_COLLATERAL);
        assert_eq!(intent.record_slots, vec![0, 1]);
        assert!(intent.inputs[0].contains("market_id"));
        assert!(intent.inputs[1].contains("microcredits"));
        assert_eq!(intent.inputs[3], "20000u64");
    }

    #[tokio::test]
    async fn position_aggregates_across_aliases() {
        let chain = Arc::new(MapChain::default());
        chain.seed_open_market("5");
        let mut cfg = test_config();
        cfg.program_aliases = vec!["umbra_markets.aleo".into()];
        let wallet = MockWallet::new()
            .with_positions(
                "umbra_markets_v1.aleo",
                &[&position_plaintext("5", 5, 0, 100, "n1")],
            )
            .with_positions(
                "umbra_markets.aleo",
                &[
                    // Same record surfacing under the legacy alias…
                    &position_plaintext("5", 5, 0, 100, "n1"),
                    // …and one only the alias knows about.
                    &position_plaintext("5", 7, 2, 200, "n2"),
                ],
            );
        let connection = WalletConnection {
            direct: Some(Arc::new(Arc::new(wallet)) as Arc<dyn WalletApi>),
            ..WalletConnection::default()
        };
        let client = MarketClient::with_backend(
            cfg,
            chain,
            connection,
            Arc::new(NoopMetadataStore),
        );

        let agg = client
            .position(&MarketId::normalize("5"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(agg.record_count, 2);
        assert_eq!(agg.yes_shares, 12);
        assert_eq!(agg.collateral_available, 300);
    }

    #[tokio::test]
    async fn markets_merges_placeholder_metadata() {
        let chain = Arc::new(MapChain::default());
        chain.set(mappings::MARKET_COUNT, COUNT_KEY, "1u64");
        chain.set(mappings::MARKET_REGISTRY, "0u64", "5field");
        chain.seed_open_market("5");
        let client = client_with(chain, Arc::new(MockWallet::new()), false);

        let markets = client.markets().await.unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].metadata.title, "Market 5");
        assert_eq!(markets[0].metadata.category, "uncategorized");
    }
}
