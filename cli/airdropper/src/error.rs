use thiserror::Error;

use crate::common::{hex_encode, Hash};

/// Validation failures of the distribution engine.
///
/// All of these are detected locally, are fatal to the operation that raised
/// them and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AirdropError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
    #[error("Empty input provided")]
    EmptyDataset,
    #[error("Index {index} out of range for {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Address not found: {0}")]
    AddressNotFound(String),
    #[error("Duplicate address: {0}")]
    DuplicateAddress(String),
    #[error("Invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },
    #[error("Arithmetic Error (balance overflow)")]
    BalanceOverflow,
}

/// Failures reported by a ledger node or the transport to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The node gave up waiting for inclusion. The transaction may still be
    /// mined later and must be tracked, not re-sent.
    #[error("transaction not mined within {blocks} blocks")]
    NotMined { blocks: u64 },
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Terminal failures of a transaction submission.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("network error: {0}")]
    Network(#[from] LedgerError),
    #[error("transaction {} has been reverted", hex_encode(.tx_hash))]
    TransactionReverted { tx_hash: Hash },
    /// The receipt wait was cancelled or hit its deadline. The transaction
    /// may still be mined; resume tracking with its identifier.
    #[error("transaction {} wasn't mined before the wait was stopped", hex_encode(.tx_hash))]
    TransactionNotMined { tx_hash: Hash },
    #[error("distribution error: {0}")]
    Distribution(#[from] AirdropError),
}

/// Failures loading the process configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serde Error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("credential error: {0}")]
    Credential(String),
}
