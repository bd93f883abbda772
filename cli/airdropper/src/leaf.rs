//! Canonical leaf encoding.
//!
//! A leaf is `keccak256(uint256(index) ++ address ++ uint256(balance))`, the
//! tightly packed encoding the on-chain verifier hashes. The argument order is
//! part of the contract and must not change.

use sha3::{Digest, Keccak256};

use crate::common::{parse_address, u256_word, Address, Hash};
use crate::error::AirdropError;

/// Hashes one distribution entry.
pub fn encode_leaf(index: u64, address: &Address, balance: u128) -> Hash {
    Keccak256::new()
        .chain_update(u256_word(u128::from(index)))
        .chain_update(address)
        .chain_update(u256_word(balance))
        .finalize()
        .into()
}

/// Hashes one distribution entry given a textual address.
///
/// # Errors
/// Returns [`AirdropError::InvalidAddress`] if `address` does not parse.
pub fn encode_leaf_str(index: u64, address: &str, balance: u128) -> Result<Hash, AirdropError> {
    let address = parse_address(address)?;
    Ok(encode_leaf(index, &address, balance))
}
