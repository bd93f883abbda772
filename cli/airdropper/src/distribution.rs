//! Reward computation and the per-version documents handed to the store.
//!
//! Every batch here is all-or-nothing: the first invalid record aborts the
//! whole operation, because a committed root with an incomplete proof set is
//! unusable.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::common::{hex_encode, parse_address, parse_hash, Address, Hash};
use crate::error::AirdropError;
use crate::proof::verify_proof;
use crate::table::AirdropTable;

/// Default reward for a verified identity, in base token units.
pub const DEFAULT_BASE_REWARD: u128 = 20;

/// Default bonus per qualifying referral, in base token units.
pub const DEFAULT_REFERRAL_REWARD: u128 = 5;

/// One verified identity and the wallet its reward goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub identity: String,
    pub wallet_address: String,
}

/// Source data for a distribution: identities in canonical order plus the
/// number of qualifying referrals per identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub records: Vec<SourceRecord>,
    #[serde(default)]
    pub referrals: HashMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rewards {
    pub base_reward: u128,
    pub referral_reward: u128,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            base_reward: DEFAULT_BASE_REWARD,
            referral_reward: DEFAULT_REFERRAL_REWARD,
        }
    }
}

impl Rewards {
    /// `base_reward + referral_reward * referral_count`, checked.
    pub fn balance_for(&self, referral_count: u64) -> Result<u128, AirdropError> {
        self.referral_reward
            .checked_mul(u128::from(referral_count))
            .and_then(|bonus| self.base_reward.checked_add(bonus))
            .ok_or(AirdropError::BalanceOverflow)
    }
}

/// Turns source records into ordered `(address, balance)` pairs.
///
/// # Errors
/// Returns [`AirdropError::InvalidRecord`] for the first record with an empty
/// identity or an unparsable wallet address. Nothing is returned for the
/// records that did validate.
pub fn compute_balances(
    snapshot: &SourceSnapshot,
    rewards: &Rewards,
) -> Result<Vec<(Address, u128)>, AirdropError> {
    snapshot
        .records
        .iter()
        .enumerate()
        .map(|(position, record)| {
            if record.identity.trim().is_empty() {
                return Err(AirdropError::InvalidRecord {
                    position,
                    reason: "missing identity".to_string(),
                });
            }
            let address = parse_address(&record.wallet_address).map_err(|e| {
                AirdropError::InvalidRecord {
                    position,
                    reason: e.to_string(),
                }
            })?;
            let referrals = snapshot
                .referrals
                .get(&record.identity)
                .copied()
                .unwrap_or(0);
            Ok((address, rewards.balance_for(referrals)?))
        })
        .collect()
}

/// The `{version, rootHash}` document of one distribution version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionVersion {
    pub version: String,
    pub root_hash: String,
}

/// The stored form of one entry, including its proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRecord {
    pub index: u64,
    pub balance: u128,
    pub merkle_proof: Vec<String>,
    pub claimed: bool,
    pub address: String,
}

impl EntryRecord {
    pub fn proof_hashes(&self) -> Result<Vec<Hash>, AirdropError> {
        self.merkle_proof.iter().map(|h| parse_hash(h)).collect()
    }
}

/// Everything persisted for one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOutput {
    pub version: String,
    pub root_hash: String,
    pub entries: Vec<EntryRecord>,
}

impl DistributionOutput {
    pub fn version_document(&self) -> DistributionVersion {
        DistributionVersion {
            version: self.version.clone(),
            root_hash: self.root_hash.clone(),
        }
    }
}

/// An immutable distribution version: its label and its table.
#[derive(Debug, Clone)]
pub struct Distribution {
    version: String,
    table: AirdropTable,
}

impl Distribution {
    pub fn build(
        version: impl Into<String>,
        balances: Vec<(Address, u128)>,
    ) -> Result<Self, AirdropError> {
        Ok(Self {
            version: version.into(),
            table: AirdropTable::new(balances)?,
        })
    }

    pub fn from_snapshot(
        version: impl Into<String>,
        snapshot: &SourceSnapshot,
        rewards: &Rewards,
    ) -> Result<Self, AirdropError> {
        Self::build(version, compute_balances(snapshot, rewards)?)
    }

    /// Restores a version from its stored output and checks that the stored
    /// root matches the one recomputed from the entries.
    ///
    /// # Errors
    /// Returns [`AirdropError::InvalidRecord`] if the entries are not indexed
    /// `0..n` in order or the recomputed root differs.
    pub fn from_output(output: &DistributionOutput) -> Result<Self, AirdropError> {
        let mut balances = Vec::with_capacity(output.entries.len());
        for (position, record) in output.entries.iter().enumerate() {
            if record.index != position as u64 {
                return Err(AirdropError::InvalidRecord {
                    position,
                    reason: format!("index {} out of order", record.index),
                });
            }
            balances.push((parse_address(&record.address)?, record.balance));
        }

        let distribution = Self::build(output.version.clone(), balances)?;
        let stored_root = parse_hash(&output.root_hash)?;
        if distribution.root() != stored_root {
            return Err(AirdropError::InvalidRecord {
                position: 0,
                reason: format!(
                    "stored root {} does not match recomputed {}",
                    output.root_hash,
                    hex_encode(distribution.root())
                ),
            });
        }
        Ok(distribution)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn root(&self) -> Hash {
        self.table.root()
    }

    pub fn table(&self) -> &AirdropTable {
        &self.table
    }

    pub fn version_document(&self) -> DistributionVersion {
        DistributionVersion {
            version: self.version.clone(),
            root_hash: hex_encode(self.root()),
        }
    }

    /// Produces the stored record of every entry, in index order.
    ///
    /// # Errors
    /// Fails on the first entry whose proof cannot be produced; no partial
    /// record set is returned.
    pub fn entry_records(&self) -> Result<Vec<EntryRecord>, AirdropError> {
        self.table
            .entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let proof = self.table.proof(position)?;
                Ok(EntryRecord {
                    index: entry.index,
                    balance: entry.balance,
                    merkle_proof: proof.iter().map(hex_encode).collect(),
                    claimed: false,
                    address: hex_encode(entry.address),
                })
            })
            .collect()
    }

    pub fn output(&self) -> Result<DistributionOutput, AirdropError> {
        Ok(DistributionOutput {
            version: self.version.clone(),
            root_hash: hex_encode(self.root()),
            entries: self.entry_records()?,
        })
    }

    /// Re-verifies a stored record set against this version's root. The set
    /// must hold exactly one record per entry, in index order.
    ///
    /// # Errors
    /// Returns [`AirdropError::InvalidRecord`] if the set is incomplete, or
    /// naming the first record that is out of place, does not parse or whose
    /// proof does not verify.
    pub fn verify_records(&self, records: &[EntryRecord]) -> Result<(), AirdropError> {
        let expected = self.table.entry_count();
        if records.len() != expected {
            return Err(AirdropError::InvalidRecord {
                position: records.len().min(expected),
                reason: format!("expected {} records, got {}", expected, records.len()),
            });
        }

        let root = self.root();
        for (position, record) in records.iter().enumerate() {
            let invalid = |reason: String| AirdropError::InvalidRecord { position, reason };
            if record.index != position as u64 {
                return Err(invalid(format!("index {} out of order", record.index)));
            }
            let address = parse_address(&record.address).map_err(|e| invalid(e.to_string()))?;
            let proof = record
                .proof_hashes()
                .map_err(|e| invalid(e.to_string()))?;
            if !verify_proof(&root, record.index, &address, record.balance, &proof) {
                return Err(invalid(format!(
                    "proof for index {} does not verify",
                    record.index
                )));
            }
        }
        Ok(())
    }
}
