use std::sync::Arc;

use tracing::info;

use crate::abi::{self, Token};
use crate::common::{hex_encode, Address, Hash};
use crate::error::{LedgerError, SubmitError};
use crate::ledger::{Ledger, Receipt};
use crate::submitter::{CancelToken, PreparedCall, TransactionSubmitter};
use crate::table::AirdropTable;

/// Typed access to the deployed airdrop contract.
///
/// Writes go through a caller-supplied [`TransactionSubmitter`], so admin and
/// claimer calls can use different senders against the same contract.
pub struct AirdropContract<L: Ledger> {
    address: Address,
    ledger: Arc<L>,
}

impl<L: Ledger> AirdropContract<L> {
    pub fn new(address: Address, ledger: Arc<L>) -> Self {
        Self { address, ledger }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn prepare(&self, signature: &str, args: &[Token]) -> PreparedCall {
        PreparedCall {
            to: self.address,
            value: 0,
            data: abi::encode_call(signature, args),
        }
    }

    fn read(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, LedgerError> {
        self.ledger
            .call(&self.address, &abi::encode_call(signature, args))
    }

    pub fn pause(
        &self,
        submitter: &TransactionSubmitter<L>,
        cancel: &CancelToken,
    ) -> Result<Receipt, SubmitError> {
        submitter.submit(&self.prepare(abi::PAUSE, &[]), cancel)
    }

    pub fn unpause(
        &self,
        submitter: &TransactionSubmitter<L>,
        cancel: &CancelToken,
    ) -> Result<Receipt, SubmitError> {
        submitter.submit(&self.prepare(abi::UNPAUSE, &[]), cancel)
    }

    /// Sets the incentive root. The contract must be paused.
    pub fn set_incentives(
        &self,
        submitter: &TransactionSubmitter<L>,
        root: Hash,
        cancel: &CancelToken,
    ) -> Result<Receipt, SubmitError> {
        submitter.submit(
            &self.prepare(abi::SET_INCENTIVES, &[Token::Bytes32(root)]),
            cancel,
        )
    }

    pub fn claim(
        &self,
        submitter: &TransactionSubmitter<L>,
        index: u64,
        balance: u128,
        proof: &[Hash],
        cancel: &CancelToken,
    ) -> Result<Receipt, SubmitError> {
        submitter.submit(
            &self.prepare(
                abi::CLAIM,
                &[
                    Token::Uint(u128::from(index)),
                    Token::Uint(balance),
                    Token::Bytes32Array(proof.to_vec()),
                ],
            ),
            cancel,
        )
    }

    /// Claims the entry of the submitter's own address in `table`.
    ///
    /// # Errors
    /// Returns [`SubmitError::Distribution`] if the sender has no entry in the table.
    pub fn claim_for_sender(
        &self,
        submitter: &TransactionSubmitter<L>,
        table: &AirdropTable,
        cancel: &CancelToken,
    ) -> Result<Receipt, SubmitError> {
        let (entry, proof) = table.proof_for(&submitter.sender())?;
        self.claim(submitter, entry.index, entry.balance, &proof, cancel)
    }

    /// Commits a new root: pauses (unless already paused), sets the root and
    /// unpauses. Returns the receipts in submission order.
    ///
    /// If the contract already holds `root` only a pending unpause is sent,
    /// so an interrupted commit can be completed by running it again.
    pub fn commit_root(
        &self,
        submitter: &TransactionSubmitter<L>,
        root: Hash,
        cancel: &CancelToken,
    ) -> Result<Vec<Receipt>, SubmitError> {
        let mut receipts = Vec::with_capacity(3);
        let paused = self.is_paused()?;
        if self.incentive_root()? == root {
            if paused {
                info!(root = %hex_encode(root), "root already set; unpausing");
                receipts.push(self.unpause(submitter, cancel)?);
            } else {
                info!(root = %hex_encode(root), "root already committed");
            }
            return Ok(receipts);
        }

        if paused {
            info!("contract already paused");
        } else {
            receipts.push(self.pause(submitter, cancel)?);
        }
        receipts.push(self.set_incentives(submitter, root, cancel)?);
        receipts.push(self.unpause(submitter, cancel)?);
        info!(root = %hex_encode(root), "incentive root committed");
        Ok(receipts)
    }

    pub fn is_claimed(&self, index: u64) -> Result<bool, LedgerError> {
        abi::decode_bool(&self.read(abi::IS_CLAIMED, &[Token::Uint(u128::from(index))])?)
    }

    pub fn is_paused(&self) -> Result<bool, LedgerError> {
        abi::decode_bool(&self.read(abi::PAUSED, &[])?)
    }

    pub fn version(&self) -> Result<u128, LedgerError> {
        abi::decode_uint(&self.read(abi::VERSION, &[])?)
    }

    pub fn incentive_root(&self) -> Result<Hash, LedgerError> {
        abi::decode_bytes32(&self.read(abi::INCENTIVE_ROOTHASH, &[])?)
    }

    pub fn is_admin(&self, address: &Address) -> Result<bool, LedgerError> {
        abi::decode_bool(&self.read(abi::IS_ADMIN, &[Token::Address(*address)])?)
    }
}
