use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::common::{hex_encode, parse_address, Address, Hash};
use crate::error::AirdropError;
use crate::leaf::encode_leaf;
use crate::proof::{generate_proof, verify_proof};
use crate::tree::MerkleTree;

/// One distribution record. `index` is the entry's position in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub index: u64,
    pub address: Address,
    pub balance: u128,
}

impl Entry {
    pub fn leaf(&self) -> Hash {
        encode_leaf(self.index, &self.address, self.balance)
    }
}

/// An ordered `address -> balance` table and the Merkle tree derived from it.
///
/// Indices are assigned by insertion order and never re-sorted. The tree is
/// built once per table; a new distribution requires [`AirdropTable::rebuild`]
/// or a new table.
#[derive(Debug, Clone)]
pub struct AirdropTable {
    entries: Vec<Entry>,
    index_map: HashMap<Address, usize>,
    tree: MerkleTree,
}

impl AirdropTable {
    /// # Errors
    /// Returns [`AirdropError::EmptyDataset`] for an empty input and
    /// [`AirdropError::DuplicateAddress`] if an address appears twice.
    pub fn new(balances: Vec<(Address, u128)>) -> Result<Self, AirdropError> {
        if balances.is_empty() {
            return Err(AirdropError::EmptyDataset);
        }

        let mut entries = Vec::with_capacity(balances.len());
        let mut index_map = HashMap::with_capacity(balances.len());
        for (position, (address, balance)) in balances.into_iter().enumerate() {
            if index_map.insert(address, position).is_some() {
                return Err(AirdropError::DuplicateAddress(hex_encode(address)));
            }
            entries.push(Entry {
                index: position as u64,
                address,
                balance,
            });
        }

        let tree = MerkleTree::new(entries.iter().map(Entry::leaf).collect())?;
        tracing::debug!(
            entries = entries.len(),
            root = %hex_encode(tree.root()),
            "built airdrop table"
        );

        Ok(Self {
            entries,
            index_map,
            tree,
        })
    }

    /// Sum of every entry's balance: what the contract must hold for all
    /// claims to succeed.
    pub fn total_balance(&self) -> Result<u128, AirdropError> {
        self.entries.iter().try_fold(0u128, |total, entry| {
            total
                .checked_add(entry.balance)
                .ok_or(AirdropError::BalanceOverflow)
        })
    }

    /// Builds a table from textual addresses.
    ///
    /// # Errors
    /// Fails on the first address that does not parse, in addition to the
    /// errors of [`AirdropTable::new`].
    pub fn from_hex<S: AsRef<str>>(balances: &[(S, u128)]) -> Result<Self, AirdropError> {
        let parsed = balances
            .iter()
            .map(|(address, balance)| Ok((parse_address(address.as_ref())?, *balance)))
            .collect::<Result<Vec<_>, AirdropError>>()?;
        Self::new(parsed)
    }

    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// # Errors
    /// Returns [`AirdropError::AddressNotFound`] if `address` is not in the table.
    pub fn find_index(&self, address: &Address) -> Result<usize, AirdropError> {
        self.index_map
            .get(address)
            .copied()
            .ok_or_else(|| AirdropError::AddressNotFound(hex_encode(address)))
    }

    /// # Errors
    /// Returns [`AirdropError::IndexOutOfRange`] if `index` is past the end.
    pub fn entry(&self, index: usize) -> Result<&Entry, AirdropError> {
        self.entries.get(index).ok_or(AirdropError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// # Errors
    /// Returns [`AirdropError::IndexOutOfRange`] if `index` is past the end.
    pub fn find_address(&self, index: usize) -> Result<Address, AirdropError> {
        self.entry(index).map(|entry| entry.address)
    }

    /// # Errors
    /// Returns [`AirdropError::IndexOutOfRange`] if `index` is past the end.
    pub fn find_balance(&self, index: usize) -> Result<u128, AirdropError> {
        self.entry(index).map(|entry| entry.balance)
    }

    /// # Errors
    /// Returns [`AirdropError::IndexOutOfRange`] if `index` is past the end.
    pub fn proof(&self, index: usize) -> Result<Vec<Hash>, AirdropError> {
        generate_proof(&self.tree, index)
    }

    /// Looks up `address` and returns its entry together with its proof.
    ///
    /// # Errors
    /// Returns [`AirdropError::AddressNotFound`] if `address` is not in the table.
    pub fn proof_for(&self, address: &Address) -> Result<(Entry, Vec<Hash>), AirdropError> {
        let index = self.find_index(address)?;
        let entry = *self.entry(index)?;
        Ok((entry, self.proof(index)?))
    }

    /// Verifies a proof against this table's root.
    pub fn verify(&self, index: u64, address: &Address, balance: u128, proof: &[Hash]) -> bool {
        verify_proof(&self.root(), index, address, balance, proof)
    }

    /// Replaces the entries and the root. On error the table is unchanged.
    ///
    /// # Errors
    /// Same as [`AirdropTable::new`].
    pub fn rebuild(&mut self, balances: Vec<(Address, u128)>) -> Result<(), AirdropError> {
        *self = Self::new(balances)?;
        Ok(())
    }
}

/// A table shared between readers and a rebuilding writer.
///
/// Readers take an [`Arc`] snapshot and always see one complete table with
/// its matching root, never a mix of an old and a new version.
#[derive(Debug)]
pub struct SharedTable {
    current: RwLock<Arc<AirdropTable>>,
}

impl SharedTable {
    pub fn new(table: AirdropTable) -> Self {
        Self {
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<AirdropTable> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Builds the new table outside the lock, then swaps it in.
    ///
    /// # Errors
    /// Same as [`AirdropTable::new`]; the current table is kept on error.
    pub fn rebuild(&self, balances: Vec<(Address, u128)>) -> Result<Hash, AirdropError> {
        let table = Arc::new(AirdropTable::new(balances)?);
        let root = table.root();
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = table;
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::keccak256_hash;
    use proptest::prelude::*;

    const ACCOUNTS: [&str; 4] = [
        "0xcc8a0fb39284c4704d14c0a18f566a1ed53dd84a",
        "0xf17f52151ebef6c7334fad080c5704d77216b732",
        "0xc5fdf4076b8f3a5357c5e395ab970b5b54098fef",
        "0x821aea9a577a9b44299b9c15c88cf3087f3b5544",
    ];

    fn sample_table() -> AirdropTable {
        let balances: Vec<(&str, u128)> = ACCOUNTS
            .iter()
            .enumerate()
            .map(|(i, addr)| (*addr, i as u128 * 100 + 50))
            .collect();
        AirdropTable::from_hex(&balances).unwrap()
    }

    #[test]
    fn test_empty_table() {
        assert!(matches!(
            AirdropTable::new(vec![]),
            Err(AirdropError::EmptyDataset)
        ));
    }

    #[test]
    fn test_zero_address_accepted_by_both_constructors() {
        let zero = "0x0000000000000000000000000000000000000000";
        let parsed = AirdropTable::from_hex(&[(zero, 5), (ACCOUNTS[1], 6)]).unwrap();
        let raw = AirdropTable::new(vec![([0u8; 20], 5), (parse_address(ACCOUNTS[1]).unwrap(), 6)])
            .unwrap();
        assert_eq!(parsed.root(), raw.root());
        assert_eq!(parsed.find_index(&[0u8; 20]).unwrap(), 0);
    }

    #[test]
    fn test_total_balance() {
        let table = AirdropTable::from_hex(&[(ACCOUNTS[0], 20), (ACCOUNTS[1], 35)]).unwrap();
        assert_eq!(table.total_balance().unwrap(), 55);

        let table =
            AirdropTable::from_hex(&[(ACCOUNTS[0], u128::MAX), (ACCOUNTS[1], 1)]).unwrap();
        assert_eq!(table.total_balance(), Err(AirdropError::BalanceOverflow));
    }

    #[test]
    fn test_duplicate_address() {
        let result = AirdropTable::from_hex(&[(ACCOUNTS[0], 1), (ACCOUNTS[1], 2), (ACCOUNTS[0], 3)]);
        assert!(matches!(result, Err(AirdropError::DuplicateAddress(_))));
    }

    #[test]
    fn test_duplicate_address_differing_case() {
        let upper = ACCOUNTS[1].to_uppercase().replacen("0X", "0x", 1);
        let result = AirdropTable::from_hex(&[(ACCOUNTS[1].to_string(), 1), (upper, 2)]);
        assert!(matches!(result, Err(AirdropError::DuplicateAddress(_))));
    }

    #[test]
    fn test_lookups() {
        let table = sample_table();
        assert_eq!(table.entry_count(), 4);
        let addr = parse_address(ACCOUNTS[2]).unwrap();
        assert_eq!(table.find_index(&addr).unwrap(), 2);
        assert_eq!(table.find_address(2).unwrap(), addr);
        assert_eq!(table.find_balance(2).unwrap(), 250);
        assert!(matches!(
            table.find_index(&[0x42u8; 20]),
            Err(AirdropError::AddressNotFound(_))
        ));
        assert_eq!(
            table.find_balance(4),
            Err(AirdropError::IndexOutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    fn test_indices_follow_insertion_order() {
        let table = sample_table();
        for (position, entry) in table.entries().iter().enumerate() {
            assert_eq!(entry.index, position as u64);
        }
    }

    #[test]
    fn test_proof_for_verifies() {
        let table = sample_table();
        for account in ACCOUNTS {
            let addr = parse_address(account).unwrap();
            let (entry, proof) = table.proof_for(&addr).unwrap();
            assert_eq!(proof.len(), 2);
            assert!(table.verify(entry.index, &entry.address, entry.balance, &proof));
        }
    }

    #[test]
    fn test_root_of_two_entries() {
        let a = parse_address(ACCOUNTS[0]).unwrap();
        let b = parse_address(ACCOUNTS[1]).unwrap();
        let table = AirdropTable::new(vec![(a, 20), (b, 25)]).unwrap();
        let expected = keccak256_hash(encode_leaf(0, &a, 20), encode_leaf(1, &b, 25));
        assert_eq!(table.root(), expected);
    }

    #[test]
    fn test_rebuild_replaces_root() {
        let mut table = sample_table();
        let old_root = table.root();
        let a = parse_address(ACCOUNTS[0]).unwrap();
        table.rebuild(vec![(a, 1)]).unwrap();
        assert_ne!(table.root(), old_root);
        assert_eq!(table.entry_count(), 1);
        assert_eq!(table.root(), encode_leaf(0, &a, 1));
    }

    #[test]
    fn test_failed_rebuild_keeps_table() {
        let mut table = sample_table();
        let old_root = table.root();
        let a = parse_address(ACCOUNTS[0]).unwrap();
        assert!(table.rebuild(vec![(a, 1), (a, 2)]).is_err());
        assert_eq!(table.root(), old_root);
        assert_eq!(table.entry_count(), 4);
    }

    #[test]
    fn test_shared_table_snapshot_is_consistent() {
        let shared = SharedTable::new(sample_table());
        let before = shared.snapshot();
        let a = parse_address(ACCOUNTS[3]).unwrap();
        let new_root = shared.rebuild(vec![(a, 9)]).unwrap();

        // The old snapshot still pairs the old entries with the old root.
        assert_eq!(before.entry_count(), 4);
        let (entry, proof) = before.proof_for(&a).unwrap();
        assert!(before.verify(entry.index, &entry.address, entry.balance, &proof));

        let after = shared.snapshot();
        assert_eq!(after.root(), new_root);
        assert_eq!(after.find_index(&a).unwrap(), 0);
    }

    #[test]
    fn test_shared_table_rejects_bad_rebuild() {
        let shared = SharedTable::new(sample_table());
        let root = shared.snapshot().root();
        assert!(shared.rebuild(vec![]).is_err());
        assert_eq!(shared.snapshot().root(), root);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Changing one entry's balance or address moves the root; rebuilding
        /// the same input does not.
        #[test]
        fn prop_root_tracks_every_entry(
            balances in prop::collection::vec(0u128..1_000_000, 1..24),
            pick in any::<prop::sample::Index>(),
        ) {
            let addr = |i: usize| {
                let mut a = [0u8; 20];
                a[..8].copy_from_slice(&(i as u64 + 1).to_be_bytes());
                a
            };
            let input: Vec<(Address, u128)> =
                balances.iter().enumerate().map(|(i, b)| (addr(i), *b)).collect();
            let root = AirdropTable::new(input.clone()).unwrap().root();
            prop_assert_eq!(AirdropTable::new(input.clone()).unwrap().root(), root);

            let target = pick.index(input.len());
            let mut bumped = input.clone();
            bumped[target].1 += 1;
            prop_assert_ne!(AirdropTable::new(bumped).unwrap().root(), root);

            let mut moved = input;
            moved[target].0 = [0xffu8; 20];
            prop_assert_ne!(AirdropTable::new(moved).unwrap().root(), root);
        }
    }
}
