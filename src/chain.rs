//! Backend seam for chain reads.
//!
//! [`ChainReader`] is the narrow interface the rest of the SDK consumes;
//! [`HttpChainBackend`] is the bundled REST-gateway implementation. An
//! absent mapping key is ordinary control flow, so HTTP 404 surfaces as
//! `Ok(None)` rather than an error.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Error, Result};

/// A finalize operation attached to a confirmed transaction: one mapping
/// update. Creation transactions are recovered from these when index
/// mappings lag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOperation {
    pub mapping_name: String,
    pub key: String,
    pub value: Option<String>,
}

/// A confirmed transaction with its finalize operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub id: String,
    pub finalize: Vec<FinalizeOperation>,
}

/// Read access to chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Read one mapping value. `None` means the key is absent.
    async fn mapping_value(
        &self,
        program: &str,
        mapping: &str,
        key: &str,
    ) -> Result<Option<String>>;

    /// Page through confirmed transactions that invoked `function` on
    /// `program`, newest first. An out-of-range page is an empty vec.
    async fn program_transitions(
        &self,
        program: &str,
        function: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChainTransaction>>;

    /// Fetch one confirmed transaction. `None` when the id is unknown
    /// (possibly not yet indexed).
    async fn transaction(&self, id: &str) -> Result<Option<ChainTransaction>>;
}

const TX_ID_KEYS: [&str; 3] = ["id", "transaction_id", "transactionId"];
const FINALIZE_KEYS: [&str; 3] = ["finalize", "finalize_operations", "finalizeOperations"];
const MAPPING_NAME_KEYS: [&str; 3] = ["mapping_name", "mappingName", "mapping"];
const OP_KEY_KEYS: [&str; 3] = ["key", "key_id", "keyId"];

fn string_under<'a>(map: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| map.get(k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Convert one loosely-shaped gateway transaction object.
///
/// Gateways disagree on field names; unknown shapes yield `None` and the
/// caller skips them.
pub fn parse_transaction(value: &Value) -> Option<ChainTransaction> {
    // Some gateways nest the transaction under a "transaction" wrapper.
    let body = value.get("transaction").unwrap_or(value);
    let id = string_under(body, &TX_ID_KEYS)
        .or_else(|| string_under(value, &TX_ID_KEYS))?
        .to_string();

    let ops = FINALIZE_KEYS
        .iter()
        .find_map(|k| body.get(*k).or_else(|| value.get(*k)))
        .and_then(Value::as_array);

    let finalize = ops
        .map(|items| {
            items
                .iter()
                .filter_map(|op| {
                    let mapping_name = string_under(op, &MAPPING_NAME_KEYS)?.to_string();
                    let key = string_under(op, &OP_KEY_KEYS)?.to_string();
                    let value = op
                        .get("value")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string());
                    Some(FinalizeOperation {
                        mapping_name,
                        key,
                        value,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ChainTransaction { id, finalize })
}

/// REST-gateway chain backend.
pub struct HttpChainBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpChainBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a path, mapping 404 to `Ok(None)`.
    async fn get_json(&self, path: &str) -> Result<Option<Value>> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(format!("GET {url}: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| Error::Http(format!("GET {url}: {e}")))?;
        let value = resp
            .json::<Value>()
            .await
            .map_err(|e| Error::Http(format!("GET {url}: bad body: {e}")))?;
        Ok(Some(value))
    }
}

#[async_trait]
impl ChainReader for HttpChainBackend {
    async fn mapping_value(
        &self,
        program: &str,
        mapping: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let path = format!("program/{program}/mapping/{mapping}/{key}");
        match self.get_json(&path).await? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            // Defensive: some gateways return the scalar unquoted.
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    async fn program_transitions(
        &self,
        program: &str,
        function: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<ChainTransaction>> {
        let path = format!(
            "program/{program}/transitions/{function}?page={page}&limit={page_size}"
        );
        let Some(body) = self.get_json(&path).await? else {
            return Ok(Vec::new());
        };
        let Some(items) = body.as_array() else {
            return Err(Error::Http(format!(
                "transitions of {program}/{function}: expected array response"
            )));
        };
        let mut txs = Vec::with_capacity(items.len());
        for item in items {
            match parse_transaction(item) {
                Some(tx) => txs.push(tx),
                None => log::warn!("skipping unparseable transaction in {function} log"),
            }
        }
        Ok(txs)
    }

    async fn transaction(&self, id: &str) -> Result<Option<ChainTransaction>> {
        let path = format!("transaction/{id}");
        Ok(self.get_json(&path).await?.as_ref().and_then(parse_transaction))
    }
}
