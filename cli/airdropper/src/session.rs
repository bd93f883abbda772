use std::path::Path;
use std::sync::Arc;

use airdropper::config::credential_from_str;
use airdropper::tx::tx_cost_wei;
use airdropper::{
    hex_encode, AirdropContract, Config, Credential, Erc20Token, Funding, JsonRpcLedger, Receipt,
    TransactionSubmitter,
};
use anyhow::{Context, Result};
use zeroize::Zeroize;

/// Contract access over a node connection, for one sender.
pub struct Session {
    pub config: Config,
    pub contract: AirdropContract<JsonRpcLedger>,
    pub token: Option<Erc20Token<JsonRpcLedger>>,
    pub submitter: TransactionSubmitter<JsonRpcLedger>,
}

/// Resolves the sender key: `-` reads one line from stdin, any other value
/// is the hex key itself, and no value falls back to the configured
/// environment variable.
pub fn read_credential(private_key: Option<&str>, config: &Config) -> Result<Credential> {
    match private_key {
        Some("-") => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_line(&mut buffer)
                .context("Failed to read private key from stdin")?;
            let credential = credential_from_str(&buffer);
            buffer.zeroize();
            Ok(credential?)
        }
        Some(key) => Ok(credential_from_str(key)?),
        None => Ok(config.credential_from_env()?),
    }
}

fn token(
    config: &Config,
    ledger: &Arc<JsonRpcLedger>,
) -> Result<Option<Erc20Token<JsonRpcLedger>>> {
    Ok(config
        .token_address()?
        .map(|address| Erc20Token::new(address, Arc::clone(ledger))))
}

pub fn connect_readonly(
    config: &Config,
) -> Result<(AirdropContract<JsonRpcLedger>, Option<Erc20Token<JsonRpcLedger>>)> {
    let ledger = Arc::new(JsonRpcLedger::new(config.rpc_url.clone())?);
    let token = token(config, &ledger)?;
    Ok((AirdropContract::new(config.contract_address()?, ledger), token))
}

pub fn connect(config_path: &Path, private_key: Option<&str>) -> Result<Session> {
    let config = Config::load(config_path).context("Failed to load config")?;
    let credential = read_credential(private_key, &config)?;
    println!("Sender: {}", hex_encode(credential.address()));

    let ledger = Arc::new(JsonRpcLedger::new(config.rpc_url.clone())?);
    let contract = AirdropContract::new(config.contract_address()?, Arc::clone(&ledger));
    let token = token(&config, &ledger)?;
    let submitter = TransactionSubmitter::new(ledger, credential, config.submitter_config());
    Ok(Session {
        config,
        contract,
        token,
        submitter,
    })
}

/// Reads the airdrop contract's token balance against `required` and warns
/// when it cannot cover every claim.
pub fn check_funding(
    token: &Erc20Token<JsonRpcLedger>,
    contract: &AirdropContract<JsonRpcLedger>,
    required: u128,
) -> Result<Funding> {
    let funding = token
        .funding(&contract.address(), required)
        .context("Failed to read contract token balance")?;
    println!("Contract token balance: {}", funding.balance);
    println!("Required by distribution: {}", funding.required);
    if !funding.is_sufficient() {
        tracing::warn!(
            balance = funding.balance,
            required = funding.required,
            shortfall = funding.shortfall(),
            "airdrop contract holds too few tokens for every claim"
        );
    }
    Ok(funding)
}

pub fn print_receipt(label: &str, receipt: &Receipt, gas_price: u128) {
    println!("{}: {}", label, hex_encode(receipt.transaction_hash));
    if let Some(block) = receipt.block_number {
        println!("  Block: {}", block);
    }
    if let Some(gas_used) = receipt.gas_used {
        println!("  Gas used: {}", gas_used);
        if let Some(cost) = tx_cost_wei(gas_price, gas_used) {
            println!("  Cost: {} wei", cost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        serde_json::from_str(
            r#"{
                "rpc_url": "http://localhost:8545",
                "contract_address": "0x5ef8e4950f0de565860b233f253ae70b102e97b7",
                "private_key_env": "AIRDROPPER_TEST_KEY_SESSION_RS"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_read_credential_inline() {
        let credential = read_credential(Some(&"01".repeat(32)), &config()).unwrap();
        assert_eq!(
            credential.address(),
            Credential::from_hex(&"01".repeat(32)).unwrap().address()
        );
    }

    #[test]
    fn test_read_credential_missing_env() {
        assert!(read_credential(None, &config()).is_err());
    }

    #[test]
    fn test_read_credential_bad_key() {
        assert!(read_credential(Some("0x1234"), &config()).is_err());
    }
}
