use std::fs::File;
use std::io::Write;
use std::path::Path;

use sha3::{Digest, Keccak256};

use crate::error::AirdropError;

/// A 20-byte ledger account address.
pub type Address = [u8; 20];

/// A 32-byte Keccak256 digest.
pub type Hash = [u8; 32];

/// Parses an Ethereum address from a hex string.
///
/// The input is case-normalized to lowercase before decoding, so checksummed
/// and lowercase spellings of the same account parse to the same bytes.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix
///
/// # Returns
/// A 20-byte array representing the address
///
/// # Errors
/// Returns [`AirdropError::InvalidAddress`] if the address is not 40 hex
/// characters or contains invalid hex
pub fn parse_address(addr_str: &str) -> Result<Address, AirdropError> {
    let normalized = addr_str.trim().to_lowercase();
    let cleaned = normalized.strip_prefix("0x").unwrap_or(&normalized);
    if cleaned.len() != 40 {
        return Err(AirdropError::InvalidAddress(format!(
            "expected 40 hex chars, got {} in '{}'",
            cleaned.len(),
            addr_str.trim()
        )));
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address).map_err(|e| {
        AirdropError::InvalidAddress(format!("invalid hex in '{}': {}", addr_str.trim(), e))
    })?;
    Ok(address)
}

/// Parses a 32-byte hash (Merkle root or proof node) from a hex string.
///
/// # Errors
/// Returns [`AirdropError::InvalidHash`] if the input is not 64 hex characters
pub fn parse_hash(hash_str: &str) -> Result<Hash, AirdropError> {
    let trimmed = hash_str.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if cleaned.len() != 64 {
        return Err(AirdropError::InvalidHash(format!(
            "expected 64 hex chars, got {}",
            cleaned.len()
        )));
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut hash)
        .map_err(|e| AirdropError::InvalidHash(format!("invalid hex: {}", e)))?;
    Ok(hash)
}

/// Renders bytes as a `0x`-prefixed lowercase hex string.
pub fn hex_encode<T: AsRef<[u8]>>(bytes: T) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Computes Keccak256 over an arbitrary byte string.
pub fn keccak256<T: AsRef<[u8]>>(data: T) -> Hash {
    Keccak256::digest(data.as_ref()).into()
}

/// Computes a Keccak256 hash of two 32-byte values concatenated.
///
/// This is the pair combinator of the tree; operand order matters.
pub fn keccak256_hash(left: Hash, right: Hash) -> Hash {
    let hash = Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize();
    hash.into()
}

/// Left-pads an unsigned integer into a 32-byte big-endian word.
pub fn u256_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Writes `contents` to `path` through a sibling temp file and a rename, so a
/// reader never sees a half-written file.
pub fn write_file_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    std::fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_prefix() {
        let addr = "0x1234567890abcdef1234567890abcdef12345678";
        let result = parse_address(addr).unwrap();
        assert_eq!(result.len(), 20);
        assert_eq!(result[0], 0x12);
    }

    #[test]
    fn test_parse_address_without_prefix() {
        let addr = "1234567890abcdef1234567890abcdef12345678";
        let result = parse_address(addr).unwrap();
        assert_eq!(result[19], 0x78);
    }

    #[test]
    fn test_parse_address_is_case_insensitive() {
        let lower = parse_address("0xcc8a0fb39284c4704d14c0a18f566a1ed53dd84a").unwrap();
        let mixed = parse_address("0xCC8A0fB39284C4704d14c0a18F566a1ED53dD84A").unwrap();
        let upper_prefix = parse_address("0XCC8A0FB39284C4704D14C0A18F566A1ED53DD84A").unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(lower, upper_prefix);
    }

    #[test]
    fn test_parse_address_invalid_length() {
        let result = parse_address("0x1234");
        assert!(matches!(result, Err(AirdropError::InvalidAddress(_))));
    }

    #[test]
    fn test_parse_address_invalid_hex() {
        let result = parse_address("0xghijklmnopqrstuvwxyz1234567890abcdefabcd");
        assert!(matches!(result, Err(AirdropError::InvalidAddress(_))));
    }

    #[test]
    fn test_parse_address_accepts_zero() {
        let address = parse_address("0x0000000000000000000000000000000000000000").unwrap();
        assert_eq!(address, [0u8; 20]);
    }

    #[test]
    fn test_parse_hash() {
        let hash = parse_hash(&hex_encode([7u8; 32])).unwrap();
        assert_eq!(hash, [7u8; 32]);
        assert!(parse_hash("0x1234").is_err());
        assert!(parse_hash(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_keccak256_hash_is_order_sensitive() {
        let left: Hash = [1u8; 32];
        let right: Hash = [2u8; 32];
        assert_ne!(keccak256_hash(left, right), keccak256_hash(right, left));
    }

    #[test]
    fn test_keccak256_empty_input() {
        assert_eq!(
            hex::encode(keccak256([])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_u256_word() {
        let word = u256_word(0x0102);
        assert_eq!(word[..30], [0u8; 30]);
        assert_eq!(word[30..], [0x01, 0x02]);
    }

    #[test]
    fn test_write_file_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_file_atomic(&path, "{\"a\":1}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":1}");
        assert!(!path.with_extension("tmp").exists());
    }
}
