use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("record is not decrypted: {0}")]
    NotDecrypted(String),

    #[error(
        "insufficient balance: {required} microcredits required, {available} known spendable"
    )]
    InsufficientBalance { required: u64, available: u64 },

    #[error("no matching record: {0}")]
    NoMatchingRecord(String),

    #[error("double-spend risk: record {record_fingerprint} would fill two input slots")]
    DoubleSpendRisk { record_fingerprint: String },

    #[error("no transaction id found in wallet result")]
    MissingTransactionId,

    #[error("mapping {mapping}[{key}] not found in {program}")]
    MappingNotFound {
        program: String,
        mapping: String,
        key: String,
    },

    #[error("network timeout after {0:?}")]
    NetworkTimeout(Duration),

    #[error("AMM reserve is zero")]
    ZeroReserves,

    #[error("query error: {0}")]
    Query(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("{category} failure: {message}")]
    Execution {
        category: ExecutionFailure,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Actionable category for a failed transition submission.
///
/// Wallets and nodes report execution failures as free-form text; the raw
/// message is kept alongside the category so nothing is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionFailure {
    /// Zero-knowledge proof synthesis failed client-side.
    ProofGeneration,
    /// The node rejected or never received the broadcast.
    Broadcast,
    /// An input record was already consumed by an earlier transition.
    RecordSpent,
    /// An input literal or record plaintext failed to parse on-chain.
    InputParsing,
    /// The user declined the request in the wallet.
    Rejected,
    Unknown,
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionFailure::ProofGeneration => "proof generation",
            ExecutionFailure::Broadcast => "broadcast",
            ExecutionFailure::RecordSpent => "record spent",
            ExecutionFailure::InputParsing => "input parsing",
            ExecutionFailure::Rejected => "user rejected",
            ExecutionFailure::Unknown => "execution",
        };
        write!(f, "{s}")
    }
}

/// Classify a raw execution failure message into an actionable category.
///
/// Matching is case-insensitive substring search over the known failure
/// vocabularies of wallets and nodes. Order matters: the spent-record check
/// runs before the generic input check because spent-record messages often
/// mention the record plaintext too.
pub fn classify_execution_failure(message: &str) -> ExecutionFailure {
    let m = message.to_lowercase();
    if m.contains("proof") || m.contains("synthesis") || m.contains("prover") {
        ExecutionFailure::ProofGeneration
    } else if m.contains("already spent")
        || m.contains("serial number")
        || (m.contains("record") && m.contains("spent"))
    {
        ExecutionFailure::RecordSpent
    } else if m.contains("broadcast") || m.contains("rpc") || m.contains("gateway") {
        ExecutionFailure::Broadcast
    } else if m.contains("parse") || m.contains("invalid input") || m.contains("literal") {
        ExecutionFailure::InputParsing
    } else if m.contains("reject") || m.contains("denied") || m.contains("cancel") {
        ExecutionFailure::Rejected
    } else {
        ExecutionFailure::Unknown
    }
}

impl Error {
    /// Wrap a raw write-path failure message in a classified [`Error::Execution`].
    pub fn execution(message: impl Into<String>) -> Self {
        let message = message.into();
        Error::Execution {
            category: classify_execution_failure(&message),
            message,
        }
    }

    /// Re-raise a write-path error with a classification attached.
    ///
    /// Errors that already carry a specific kind (balance, double-spend,
    /// missing txid) pass through untouched.
    pub fn classify_write(self) -> Self {
        match self {
            Error::Query(m) | Error::Http(m) | Error::Wallet(m) => Error::execution(m),
            Error::NetworkTimeout(d) => Error::Execution {
                category: ExecutionFailure::Broadcast,
                message: format!("submission timed out after {d:?}"),
            },
            other => other,
        }
    }
}
