//! The ERC20 token the airdrop contract pays claims from.

use std::sync::Arc;

use tracing::info;

use crate::abi::{self, Token};
use crate::common::{hex_encode, Address};
use crate::error::{LedgerError, SubmitError};
use crate::ledger::{Ledger, Receipt};
use crate::submitter::{CancelToken, PreparedCall, TransactionSubmitter};

/// Token balance of a holder against what it has to pay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Funding {
    pub balance: u128,
    pub required: u128,
}

impl Funding {
    pub fn is_sufficient(&self) -> bool {
        self.balance >= self.required
    }

    pub fn shortfall(&self) -> u128 {
        self.required.saturating_sub(self.balance)
    }
}

/// Amounts are in the token's base units, the same units as table balances.
pub struct Erc20Token<L: Ledger> {
    address: Address,
    ledger: Arc<L>,
}

impl<L: Ledger> Erc20Token<L> {
    pub fn new(address: Address, ledger: Arc<L>) -> Self {
        Self { address, ledger }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn read(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, LedgerError> {
        self.ledger
            .call(&self.address, &abi::encode_call(signature, args))
    }

    pub fn balance_of(&self, holder: &Address) -> Result<u128, LedgerError> {
        abi::decode_uint(&self.read(abi::BALANCE_OF, &[Token::Address(*holder)])?)
    }

    pub fn total_supply(&self) -> Result<u128, LedgerError> {
        abi::decode_uint(&self.read(abi::TOTAL_SUPPLY, &[])?)
    }

    pub fn decimals(&self) -> Result<u8, LedgerError> {
        let decimals = abi::decode_uint(&self.read(abi::DECIMALS, &[])?)?;
        u8::try_from(decimals)
            .map_err(|_| LedgerError::Decode(format!("decimals out of range: {}", decimals)))
    }

    /// Compares `holder`'s balance with `required`.
    pub fn funding(&self, holder: &Address, required: u128) -> Result<Funding, LedgerError> {
        Ok(Funding {
            balance: self.balance_of(holder)?,
            required,
        })
    }

    pub fn transfer(
        &self,
        submitter: &TransactionSubmitter<L>,
        to: &Address,
        amount: u128,
        cancel: &CancelToken,
    ) -> Result<Receipt, SubmitError> {
        let call = PreparedCall {
            to: self.address,
            value: 0,
            data: abi::encode_call(abi::TRANSFER, &[Token::Address(*to), Token::Uint(amount)]),
        };
        let receipt = submitter.submit(&call, cancel)?;
        info!(to = %hex_encode(to), amount, "tokens transferred");
        Ok(receipt)
    }
}
