//! The ledger node boundary.
//!
//! [`Ledger`] is everything the submitter and the contract wrapper need from a
//! node. [`JsonRpcLedger`] talks to a node over HTTP JSON-RPC.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::{hex_encode, parse_hash, Address, Hash};
use crate::error::LedgerError;

/// Ledger-confirmed outcome of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: Hash,
    pub block_number: Option<u64>,
    /// `1` for success, `0` for a reverted transaction.
    pub status: Option<u64>,
    pub gas_used: Option<u128>,
}

impl Receipt {
    pub fn is_mined(&self) -> bool {
        self.block_number.is_some_and(|block| block > 0)
    }

    pub fn succeeded(&self) -> bool {
        self.status.is_some_and(|status| status != 0)
    }
}

pub trait Ledger: Send + Sync {
    /// Next nonce of `address`, counting pending transactions.
    fn transaction_count(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Broadcasts a signed transaction and returns its identifier.
    fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash, LedgerError>;

    /// Returns `None` while the transaction is unknown or not yet mined.
    fn transaction_receipt(&self, tx_hash: &Hash) -> Result<Option<Receipt>, LedgerError>;

    /// Executes a read-only call against the latest block.
    fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, LedgerError>;
}

/// JSON-RPC client for an Ethereum-compatible node.
pub struct JsonRpcLedger {
    url: String,
    http_client: reqwest::blocking::Client,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
    gas_used: Option<String>,
}

impl JsonRpcLedger {
    /// # Errors
    /// Returns [`LedgerError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        let http_client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::trace!(method, id, "json-rpc request");

        let response: RpcResponse = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| LedgerError::Transport(e.to_string()))?
            .json()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;

        decode_response(method, response)
    }
}

fn decode_response<T: DeserializeOwned>(
    method: &str,
    response: RpcResponse,
) -> Result<T, LedgerError> {
    if let Some(error) = response.error {
        return Err(map_rpc_error(method, error.code, error.message));
    }
    let result = response.result.unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|e| LedgerError::Decode(format!("{}: {}", method, e)))
}

/// Classifies a node error. Timeout-style "not mined within N blocks" errors
/// are transient; a rejected raw submission is terminal.
fn map_rpc_error(method: &str, code: i64, message: String) -> LedgerError {
    if let Some(blocks) = not_mined_blocks(&message) {
        return LedgerError::NotMined { blocks };
    }
    if method == "eth_sendRawTransaction" {
        return LedgerError::Rejected(message);
    }
    LedgerError::Rpc { code, message }
}

fn not_mined_blocks(message: &str) -> Option<u64> {
    let rest = &message[message.find("not mined within")? + "not mined within".len()..];
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    Some(digits.parse().unwrap_or(0))
}

/// Parses a `0x`-prefixed hex quantity.
fn parse_quantity(quantity: &str) -> Result<u128, LedgerError> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::Decode(format!("quantity without 0x prefix: {}", quantity)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| LedgerError::Decode(format!("invalid quantity {}: {}", quantity, e)))
}

fn parse_quantity_u64(quantity: &str) -> Result<u64, LedgerError> {
    u64::try_from(parse_quantity(quantity)?)
        .map_err(|_| LedgerError::Decode(format!("quantity {} exceeds 64 bits", quantity)))
}

fn parse_data(data: &str) -> Result<Vec<u8>, LedgerError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits).map_err(|e| LedgerError::Decode(format!("invalid data: {}", e)))
}

impl TryFrom<RpcReceipt> for Receipt {
    type Error = LedgerError;

    fn try_from(receipt: RpcReceipt) -> Result<Self, Self::Error> {
        Ok(Self {
            transaction_hash: parse_hash(&receipt.transaction_hash)
                .map_err(|e| LedgerError::Decode(e.to_string()))?,
            block_number: receipt
                .block_number
                .as_deref()
                .map(parse_quantity_u64)
                .transpose()?,
            status: receipt.status.as_deref().map(parse_quantity_u64).transpose()?,
            gas_used: receipt.gas_used.as_deref().map(parse_quantity).transpose()?,
        })
    }
}

impl Ledger for JsonRpcLedger {
    fn transaction_count(&self, address: &Address) -> Result<u64, LedgerError> {
        let count: String = self.request(
            "eth_getTransactionCount",
            json!([hex_encode(address), "pending"]),
        )?;
        parse_quantity_u64(&count)
    }

    fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash, LedgerError> {
        let tx_hash: String = self.request("eth_sendRawTransaction", json!([hex_encode(raw)]))?;
        parse_hash(&tx_hash).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    fn transaction_receipt(&self, tx_hash: &Hash) -> Result<Option<Receipt>, LedgerError> {
        let receipt: Option<RpcReceipt> =
            self.request("eth_getTransactionReceipt", json!([hex_encode(tx_hash)]))?;
        receipt.map(Receipt::try_from).transpose()
    }

    fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, LedgerError> {
        let output: String = self.request(
            "eth_call",
            json!([{ "to": hex_encode(to), "data": hex_encode(data) }, "latest"]),
        )?;
        parse_data(&output)
    }
}
