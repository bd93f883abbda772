//! Legacy (EIP-155) transaction construction and signing.

use std::fmt;

use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use crate::common::{hex_encode, keccak256, Address, Hash};
use crate::error::SubmitError;

/// Default gas limit of contract calls.
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;

/// Default gas price, 21 gwei.
pub const DEFAULT_GAS_PRICE: u128 = 21_000_000_000;

/// Default chain id (Rinkeby).
pub const DEFAULT_CHAIN_ID: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasOptions {
    pub price: u128,
    pub limit: u64,
}

impl Default for GasOptions {
    fn default() -> Self {
        Self {
            price: DEFAULT_GAS_PRICE,
            limit: DEFAULT_GAS_LIMIT,
        }
    }
}

/// Cost of `gas_used` units at `gas_price`, in wei.
pub fn tx_cost_wei(gas_price: u128, gas_used: u128) -> Option<u128> {
    gas_price.checked_mul(gas_used)
}

/// A sender's signing key and the address derived from it.
pub struct Credential {
    signing_key: SigningKey,
    address: Address,
}

impl Credential {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = private_key_to_address(&signing_key);
        Self {
            signing_key,
            address,
        }
    }

    /// Parses a hex private key, with or without "0x" prefix.
    ///
    /// # Errors
    /// Returns [`SubmitError::Signing`] if the key is not 32 bytes of hex or
    /// is not a valid secp256k1 scalar.
    pub fn from_hex(key_str: &str) -> Result<Self, SubmitError> {
        let trimmed = key_str.trim();
        let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if cleaned.is_empty() {
            return Err(SubmitError::Signing("private key is empty".to_string()));
        }
        let mut key_bytes = hex::decode(cleaned)
            .map_err(|e| SubmitError::Signing(format!("invalid private key format: {}", e)))?;
        if key_bytes.len() != 32 {
            let len = key_bytes.len();
            key_bytes.zeroize();
            return Err(SubmitError::Signing(format!(
                "invalid private key length: expected 32 bytes, got {}",
                len
            )));
        }
        let signing_key = SigningKey::from_slice(&key_bytes);
        key_bytes.zeroize();
        let signing_key =
            signing_key.map_err(|e| SubmitError::Signing(format!("invalid private key: {}", e)))?;
        Ok(Self::from_signing_key(signing_key))
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &hex_encode(self.address))
            .finish_non_exhaustive()
    }
}

/// Derives the account address: the last 20 bytes of the Keccak256 of the
/// uncompressed public key without its prefix byte.
pub fn private_key_to_address(signing_key: &SigningKey) -> Address {
    let public_key = signing_key.verifying_key();
    let encoded = public_key.to_encoded_point(false);
    let pub_bytes = encoded.as_bytes();
    let hash = Keccak256::digest(&pub_bytes[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    address
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

/// A signed, RLP-encoded transaction and its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: Hash,
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to.to_vec());
        stream.append(&self.value);
        stream.append(&self.data);
    }

    /// The EIP-155 pre-image hash: `rlp([.., chain_id, 0, 0])`.
    pub fn signing_hash(&self, chain_id: u64) -> Hash {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        keccak256(stream.out())
    }

    /// # Errors
    /// Returns [`SubmitError::Signing`] if the signer rejects the digest.
    pub fn sign(
        &self,
        credential: &Credential,
        chain_id: u64,
    ) -> Result<SignedTransaction, SubmitError> {
        let digest = self.signing_hash(chain_id);
        let (signature, recovery_id) = credential
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SubmitError::Signing(e.to_string()))?;

        let v = chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + u64::from(recovery_id.to_byte())))
            .ok_or_else(|| SubmitError::Signing(format!("chain id {} too large", chain_id)))?;
        let signature_bytes = signature.to_bytes();
        let (r, s) = signature_bytes.split_at(32);

        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(r).to_vec());
        stream.append(&trim_leading_zeros(s).to_vec());
        let raw = stream.out().to_vec();
        let hash = keccak256(&raw);

        Ok(SignedTransaction { raw, hash })
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
