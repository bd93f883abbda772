use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::common::{parse_address, Address};
use crate::distribution::{Rewards, DEFAULT_BASE_REWARD, DEFAULT_REFERRAL_REWARD};
use crate::error::ConfigError;
use crate::submitter::{SubmitterConfig, DEFAULT_CONFIRMATION_BLOCKS};
use crate::tx::{Credential, GasOptions, DEFAULT_CHAIN_ID, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};

/// Environment variable holding the sender's private key unless the config
/// names another one.
pub const DEFAULT_PRIVATE_KEY_ENV: &str = "AIRDROPPER_PRIVATE_KEY";

/// Process configuration, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub rpc_url: String,
    pub contract_address: String,
    /// ERC20 token the airdrop pays out; enables the funding checks.
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_gas_price")]
    pub gas_price: u128,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_confirmation_blocks")]
    pub confirmation_blocks: u64,
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    #[serde(default = "default_base_reward")]
    pub base_reward: u128,
    #[serde(default = "default_referral_reward")]
    pub referral_reward: u128,
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_gas_price() -> u128 {
    DEFAULT_GAS_PRICE
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_confirmation_blocks() -> u64 {
    DEFAULT_CONFIRMATION_BLOCKS
}

fn default_base_reward() -> u128 {
    DEFAULT_BASE_REWARD
}

fn default_referral_reward() -> u128 {
    DEFAULT_REFERRAL_REWARD
}

fn default_private_key_env() -> String {
    DEFAULT_PRIVATE_KEY_ENV.to_string()
}

impl Config {
    /// # Errors
    /// Fails if the file cannot be read, is not valid JSON for [`Config`], or
    /// fails [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), rpc_url = %config.rpc_url, "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("rpc_url is empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        self.contract_address()?;
        self.token_address()?;
        Ok(())
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        contract_field("contract_address", &self.contract_address)
    }

    pub fn token_address(&self) -> Result<Option<Address>, ConfigError> {
        self.token_address
            .as_deref()
            .map(|address| contract_field("token_address", address))
            .transpose()
    }

    pub fn submitter_config(&self) -> SubmitterConfig {
        SubmitterConfig {
            chain_id: self.chain_id,
            gas: GasOptions {
                price: self.gas_price,
                limit: self.gas_limit,
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            confirmation_blocks: self.confirmation_blocks,
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }

    pub fn rewards(&self) -> Rewards {
        Rewards {
            base_reward: self.base_reward,
            referral_reward: self.referral_reward,
        }
    }

    /// Reads the sender key from the configured environment variable.
    pub fn credential_from_env(&self) -> Result<Credential, ConfigError> {
        let mut key = std::env::var(&self.private_key_env).map_err(|_| {
            ConfigError::Credential(format!("{} is not set", self.private_key_env))
        })?;
        let credential = credential_from_str(&key);
        key.zeroize();
        credential
    }
}

fn contract_field(name: &str, value: &str) -> Result<Address, ConfigError> {
    let address =
        parse_address(value).map_err(|e| ConfigError::Invalid(format!("{}: {}", name, e)))?;
    if address == [0u8; 20] {
        return Err(ConfigError::Invalid(format!("{} is the zero address", name)));
    }
    Ok(address)
}

pub fn credential_from_str(key: &str) -> Result<Credential, ConfigError> {
    Credential::from_hex(key).map_err(|e| ConfigError::Credential(e.to_string()))
}
