//! Umbra SDK — client for private prediction markets on a record-based chain.
//!
//! The SDK discovers markets through on-chain index mappings (with a
//! transaction-log fallback), reproduces the on-chain constant-product math
//! integer-exactly, normalizes the record shapes different wallets return,
//! and assembles transition-invocation requests for both wallet capability
//! models. All chain reads pass through a rate-limited, coalescing mapping
//! client; registry and market-state reads are cached with TTLs and must be
//! invalidated after any state-mutating transaction (the high-level
//! [`MarketClient`] does this itself).

pub mod amm;
pub mod chain;
pub mod client;
pub mod config;
pub mod error;
pub mod intent;
pub mod mapping;
pub mod market;
pub mod metadata;
pub mod record;
pub mod registry;
pub mod scalar;
pub mod state;
pub mod wallet;

// Core types
pub use amm::{Side, SwapQuote, price_yes_bps, swap_shares_out};
pub use chain::{ChainReader, ChainTransaction, FinalizeOperation, HttpChainBackend};
pub use client::{
    BuyResult, DepositResult, MarketClient, MarketSummary, RedeemResult, functions,
};
pub use config::ClientConfig;
pub use error::{Error, ExecutionFailure, Result, classify_execution_failure};
pub use intent::{
    InputValue, Literal, TransactionIntent, build_intent, extract_transaction_id,
    normalize_loose_input,
};
pub use mapping::MappingClient;
pub use market::{MarketId, ids_match};
pub use metadata::{MarketMetadata, MetadataStore, NoopMetadataStore, placeholder_metadata};
pub use registry::{MarketRegistry, MarketRegistryEntry, market_id_from_transaction};
pub use scalar::NumericType;
pub use state::{MarketState, MarketStatus};
pub use wallet::{PROVIDER_PROBE_ORDER, RecordAccess, WalletApi, WalletConnection};

// Record handling
pub use record::credit::{
    CreditRecord, known_balance, select_spend_and_fee, select_spend_record,
};
pub use record::normalize::normalize_record;
pub use record::position::{
    AggregatedPosition, PositionRecord, aggregate_position, collect_positions,
    select_deposit_record, select_redemption_record,
};
