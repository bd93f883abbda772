#![forbid(unsafe_code)]

pub mod abi;
pub mod common;
pub mod config;
pub mod contract;
pub mod distribution;
pub mod error;
pub mod leaf;
pub mod ledger;
pub mod proof;
pub mod submitter;
pub mod table;
pub mod token;
pub mod tree;
pub mod tx;

pub use common::{
    hex_encode, keccak256, keccak256_hash, parse_address, parse_hash, write_file_atomic, Address,
    Hash,
};
pub use config::Config;
pub use contract::AirdropContract;
pub use distribution::{Distribution, DistributionOutput, EntryRecord, Rewards, SourceSnapshot};
pub use error::{AirdropError, ConfigError, LedgerError, SubmitError};
pub use leaf::encode_leaf;
pub use ledger::{JsonRpcLedger, Ledger, Receipt};
pub use proof::{generate_proof, verify_proof};
pub use submitter::{CancelToken, TransactionSubmitter, TxState};
pub use table::{AirdropTable, Entry, SharedTable};
pub use token::{Erc20Token, Funding};
pub use tree::{build_root, MerkleTree};
pub use tx::Credential;
