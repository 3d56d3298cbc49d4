use crate::event::{Address, Amount, ETHER};
use hex::FromHex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("genesis json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid address hex for {field} (expected 32 bytes)")]
    Address { field: String },
    #[error("invalid parameter: {0}")]
    Invalid(String),
}

const TERMINAL_STATUS_CODES: usize = 5;

/// Economic and protocol constants. Fixed for the lifetime of a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuretyConfig {
    #[serde(default = "default_airline_fund_minimum")]
    pub airline_fund_minimum: Amount,
    #[serde(default = "default_oracle_registration_fee")]
    pub oracle_registration_fee: Amount,
    #[serde(default = "default_premium_cap")]
    pub premium_cap: Amount,
    #[serde(default = "default_payout_numerator")]
    pub payout_numerator: Amount,
    #[serde(default = "default_payout_denominator")]
    pub payout_denominator: Amount,
    /// Matching oracle responses needed to seal a status.
    #[serde(default = "default_oracle_quorum")]
    pub oracle_quorum: u32,
    /// Registered airlines admitted without a vote.
    #[serde(default = "default_direct_registration_limit")]
    pub direct_registration_limit: u32,
    /// Indexes are drawn from 0..index_range.
    #[serde(default = "default_index_range")]
    pub index_range: u8,
    /// Bound on oracle response sets and the starting bound on airline vote sets,
    /// which grow with the funded airline count.
    #[serde(default = "default_tally_capacity")]
    pub tally_capacity: usize,
    /// Open requests older than this stop accepting responses. None = never expire.
    #[serde(default)]
    pub request_ttl_secs: Option<u64>,
}

fn default_airline_fund_minimum() -> Amount {
    10 * ETHER
}

fn default_oracle_registration_fee() -> Amount {
    ETHER
}

fn default_premium_cap() -> Amount {
    ETHER
}

fn default_payout_numerator() -> Amount {
    3
}

fn default_payout_denominator() -> Amount {
    2
}

fn default_oracle_quorum() -> u32 {
    3
}

fn default_direct_registration_limit() -> u32 {
    4
}

fn default_index_range() -> u8 {
    10
}

fn default_tally_capacity() -> usize {
    64
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            airline_fund_minimum: default_airline_fund_minimum(),
            oracle_registration_fee: default_oracle_registration_fee(),
            premium_cap: default_premium_cap(),
            payout_numerator: default_payout_numerator(),
            payout_denominator: default_payout_denominator(),
            oracle_quorum: default_oracle_quorum(),
            direct_registration_limit: default_direct_registration_limit(),
            index_range: default_index_range(),
            tally_capacity: default_tally_capacity(),
            request_ttl_secs: None,
        }
    }
}

impl SuretyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.payout_denominator == 0 {
            return Err(ConfigError::Invalid("payout_denominator must be non-zero".into()));
        }
        if self.oracle_quorum == 0 {
            return Err(ConfigError::Invalid("oracle_quorum must be at least 1".into()));
        }
        if self.index_range == 0 {
            return Err(ConfigError::Invalid("index_range must be at least 1".into()));
        }
        // Before sealing, each terminal status code holds at most quorum - 1 supporters.
        let max_responders = TERMINAL_STATUS_CODES * (self.oracle_quorum as usize - 1) + 1;
        if self.tally_capacity < max_responders {
            return Err(ConfigError::Invalid(format!(
                "tally_capacity must be at least {max_responders} to hold every response before quorum"
            )));
        }
        Ok(())
    }
}

/// Parsed genesis: who owns the ledger and which airline is seeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Genesis {
    pub owner: Address,
    pub first_airline: Address,
    pub balances: Vec<(Address, Amount)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceConfig {
    pub address_hex: String,
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub owner_hex: String,
    pub first_airline_hex: String,
    #[serde(default)]
    pub surety: SuretyConfig,
    /// Opening balances for the in-memory value-transfer primitive.
    #[serde(default)]
    pub balances: Vec<BalanceConfig>,
}

impl GenesisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn genesis(&self) -> Result<Genesis, ConfigError> {
        self.surety.validate()?;
        let owner = parse_address(&self.owner_hex, "owner_hex")?;
        let first_airline = parse_address(&self.first_airline_hex, "first_airline_hex")?;
        let mut balances = Vec::with_capacity(self.balances.len());
        for b in &self.balances {
            balances.push((parse_address(&b.address_hex, "balances.address_hex")?, b.amount));
        }
        Ok(Genesis {
            owner,
            first_airline,
            balances,
        })
    }
}

pub fn parse_address(hex_str: &str, field: &str) -> Result<Address, ConfigError> {
    <[u8; 32]>::from_hex(hex_str.trim().trim_start_matches("0x")).map_err(|_| ConfigError::Address {
        field: field.to_string(),
    })
}
