//! Minimal contract-call encoding for the airdrop contract and the ERC20
//! token it pays out.
//!
//! Only the argument kinds the contract takes are supported: `uint256`,
//! `address`, `bytes32` and `bytes32[]`.

use crate::common::{keccak256, u256_word, Address, Hash};
use crate::error::LedgerError;

pub const PAUSE: &str = "pause()";
pub const UNPAUSE: &str = "unpause()";
pub const SET_INCENTIVES: &str = "setIncentives(bytes32)";
pub const CLAIM: &str = "claim(uint256,uint256,bytes32[])";
pub const IS_CLAIMED: &str = "isClaimed(uint256)";
pub const PAUSED: &str = "paused()";
pub const VERSION: &str = "version()";
pub const INCENTIVE_ROOTHASH: &str = "incentiveRoothash()";
pub const IS_ADMIN: &str = "isAdmin(address)";

pub const BALANCE_OF: &str = "balanceOf(address)";
pub const TOTAL_SUPPLY: &str = "totalSupply()";
pub const DECIMALS: &str = "decimals()";
pub const TRANSFER: &str = "transfer(address,uint256)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u128),
    Address(Address),
    Bytes32(Hash),
    Bytes32Array(Vec<Hash>),
}

/// First four bytes of the Keccak256 of the function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encodes `signature(args..)` as call data.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(32 * args.len());
    let mut tail = Vec::new();

    for arg in args {
        match arg {
            Token::Uint(value) => head.extend_from_slice(&u256_word(*value)),
            Token::Address(address) => {
                head.extend_from_slice(&[0u8; 12]);
                head.extend_from_slice(address);
            }
            Token::Bytes32(hash) => head.extend_from_slice(hash),
            Token::Bytes32Array(items) => {
                let offset = 32 * args.len() + tail.len();
                head.extend_from_slice(&u256_word(offset as u128));
                tail.extend_from_slice(&u256_word(items.len() as u128));
                for item in items {
                    tail.extend_from_slice(item);
                }
            }
        }
    }

    let mut data = Vec::with_capacity(4 + head.len() + tail.len());
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&head);
    data.extend_from_slice(&tail);
    data
}

fn first_word(output: &[u8]) -> Result<&[u8], LedgerError> {
    output
        .get(..32)
        .ok_or_else(|| LedgerError::Decode(format!("expected 32 bytes, got {}", output.len())))
}

pub fn decode_bool(output: &[u8]) -> Result<bool, LedgerError> {
    let word = first_word(output)?;
    match (word[..31].iter().all(|b| *b == 0), word[31]) {
        (true, 0) => Ok(false),
        (true, 1) => Ok(true),
        _ => Err(LedgerError::Decode("invalid bool word".to_string())),
    }
}

pub fn decode_bytes32(output: &[u8]) -> Result<Hash, LedgerError> {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(first_word(output)?);
    Ok(hash)
}

/// Decodes a `uint256` that must fit in 128 bits.
pub fn decode_uint(output: &[u8]) -> Result<u128, LedgerError> {
    let word = first_word(output)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Err(LedgerError::Decode("uint256 exceeds 128 bits".to_string()));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector(PAUSE)), "8456cb59");
        assert_eq!(hex::encode(selector(UNPAUSE)), "3f4ba83a");
        assert_eq!(hex::encode(selector(PAUSED)), "5c975abb");
        assert_eq!(hex::encode(selector(TRANSFER)), "a9059cbb");
        assert_eq!(hex::encode(selector(BALANCE_OF)), "70a08231");
        assert_eq!(hex::encode(selector(TOTAL_SUPPLY)), "18160ddd");
        assert_eq!(hex::encode(selector(DECIMALS)), "313ce567");
    }

    #[test]
    fn test_encode_no_args() {
        assert_eq!(encode_call(PAUSE, &[]), selector(PAUSE).to_vec());
    }

    #[test]
    fn test_encode_static_args() {
        let data = encode_call(
            TRANSFER,
            &[Token::Address([0x11u8; 20]), Token::Uint(1000)],
        );
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(data[4..16], [0u8; 12]);
        assert_eq!(data[16..36], [0x11u8; 20]);
        assert_eq!(decode_uint(&data[36..]).unwrap(), 1000);
    }

    #[test]
    fn test_encode_claim_with_dynamic_proof() {
        let proof = vec![[0xaau8; 32], [0xbbu8; 32]];
        let data = encode_call(
            CLAIM,
            &[Token::Uint(3), Token::Uint(50), Token::Bytes32Array(proof)],
        );
        let body = &data[4..];
        assert_eq!(body.len(), 32 * 3 + 32 + 64);
        assert_eq!(decode_uint(&body[0..32]).unwrap(), 3);
        assert_eq!(decode_uint(&body[32..64]).unwrap(), 50);
        assert_eq!(decode_uint(&body[64..96]).unwrap(), 96);
        assert_eq!(decode_uint(&body[96..128]).unwrap(), 2);
        assert_eq!(body[128..160], [0xaau8; 32]);
        assert_eq!(body[160..192], [0xbbu8; 32]);
    }

    #[test]
    fn test_decoders() {
        assert!(decode_bool(&u256_word(1)).unwrap());
        assert!(!decode_bool(&u256_word(0)).unwrap());
        assert!(decode_bool(&u256_word(2)).is_err());
        assert!(decode_bool(&[0u8; 4]).is_err());
        assert_eq!(decode_bytes32(&[9u8; 32]).unwrap(), [9u8; 32]);
        assert!(decode_uint(&[0xffu8; 32]).is_err());
    }
}
