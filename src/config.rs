use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

use crate::fee::{BPS_PRECISION, MAX_FEE_RATE_BPS, calculate_fee};
use crate::network::Network;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid bridge config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Per-network transaction fee charged on the source side
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct NetworkFees {
    pub solana: u64,
    pub qubic: u64,
}

impl Default for NetworkFees {
    fn default() -> Self {
        Self {
            solana: 5_000, // one signature, in lamports
            qubic: 0,
        }
    }
}

/// Bridge parameters shared by the validator and the lifecycle controller
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub min_amount: u64,
    pub max_amount: u64,
    pub fee_rate_bps: u64,
    #[serde(default)]
    pub network_fees: NetworkFees,
    pub validator_count: u32,
    pub required_signatures: u32,
    /// Confirmations needed to finalize; `required_signatures` when unset
    #[serde(default)]
    pub confirmation_threshold: Option<u32>,
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_archive_capacity")]
    pub archive_capacity: usize,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_submit_timeout_ms() -> u64 {
    30_000
}

fn default_confirmation_timeout_ms() -> u64 {
    600_000
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_archive_capacity() -> usize {
    1_000
}

fn default_is_active() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_amount: 1_000_000,
            max_amount: 1_000_000_000_000,
            fee_rate_bps: 100,
            network_fees: NetworkFees::default(),
            validator_count: 3,
            required_signatures: 2,
            confirmation_threshold: None,
            submit_timeout_ms: default_submit_timeout_ms(),
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            archive_capacity: default_archive_capacity(),
            is_active: default_is_active(),
        }
    }
}

impl BridgeConfig {
    pub fn network_fee(&self, network: Network) -> u64 {
        match network {
            Network::Solana => self.network_fees.solana,
            Network::Qubic => self.network_fees.qubic,
        }
    }

    pub fn confirmation_threshold(&self) -> u32 {
        self.confirmation_threshold
            .unwrap_or(self.required_signatures)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject configs the controller cannot run safely with.
    ///
    /// The fee check at `min_amount` covers the whole range: the bridge fee
    /// grows at `fee_rate_bps` per unit, so `fee + network_fee < amount`
    /// holds for every amount in `[min_amount, max_amount]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_amount == 0 {
            return Err(ConfigError::Invalid("min_amount must be positive".into()));
        }
        if self.min_amount > self.max_amount {
            return Err(ConfigError::Invalid(format!(
                "min_amount {} exceeds max_amount {}",
                self.min_amount, self.max_amount
            )));
        }
        if self.fee_rate_bps > MAX_FEE_RATE_BPS {
            return Err(ConfigError::Invalid(format!(
                "fee_rate_bps {} exceeds {}",
                self.fee_rate_bps, MAX_FEE_RATE_BPS
            )));
        }
        if self.required_signatures == 0 || self.required_signatures > self.validator_count {
            return Err(ConfigError::Invalid(format!(
                "required_signatures {} must be in 1..={}",
                self.required_signatures, self.validator_count
            )));
        }
        let threshold = self.confirmation_threshold();
        if threshold == 0 || threshold > self.validator_count {
            return Err(ConfigError::Invalid(format!(
                "confirmation_threshold {} must be in 1..={}",
                threshold, self.validator_count
            )));
        }
        if self.submit_timeout_ms == 0
            || self.confirmation_timeout_ms == 0
            || self.poll_interval_ms == 0
        {
            return Err(ConfigError::Invalid(
                "timeouts and poll interval must be nonzero".into(),
            ));
        }

        let max_network_fee = self.network_fees.solana.max(self.network_fees.qubic);
        let min = self.min_amount as u128;
        let scaled_cost = min * self.fee_rate_bps as u128
            + max_network_fee as u128 * BPS_PRECISION as u128;
        if scaled_cost >= min * BPS_PRECISION as u128
            || calculate_fee(self.min_amount, self.fee_rate_bps).saturating_add(max_network_fee)
                >= self.min_amount
        {
            return Err(ConfigError::Invalid(format!(
                "fees at min_amount {} would consume the whole amount",
                self.min_amount
            )));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load and validate `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.bridge.validate()?;
        Ok(config)
    }
}
