//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::adapters::dbc::BondingCurveProgram;
use crate::adapters::solana::RetryPolicy;
use crate::application::PermanentPoolAddressing;
use crate::domain::sol_to_lamports;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub solana: SolanaSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub migration: MigrationSection,
    pub programs: ProgramsSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Solana RPC configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SolanaSection {
    /// RPC endpoint (use private RPC for production)
    pub rpc_url: String,
    /// Commitment level: "processed", "confirmed", "finalized"
    #[serde(default = "default_commitment")]
    pub commitment: String,
    /// Partner keypair path (NEVER commit this file!)
    pub keypair_path: String,
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
    #[serde(default = "default_confirm_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

fn default_confirm_poll_interval_ms() -> u64 {
    500
}

impl SolanaSection {
    /// Get RPC URL with environment variable override
    /// Checks SOLANA_RPC_URL env var first, falls back to config value
    pub fn get_rpc_url(&self) -> String {
        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| self.rpc_url.clone())
    }

    /// Get keypair path with environment variable override, `~` expanded
    pub fn get_keypair_path(&self) -> String {
        let raw = std::env::var("SOLANA_KEYPAIR_PATH")
            .unwrap_or_else(|_| self.keypair_path.clone());
        shellexpand::tilde(&raw).into_owned()
    }

    pub fn commitment_config(&self) -> Result<CommitmentConfig, ConfigError> {
        CommitmentConfig::from_str(&self.commitment).map_err(|_| {
            ConfigError::ValidationError(format!(
                "commitment must be processed, confirmed or finalized, got {}",
                self.commitment
            ))
        })
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }
}

/// Rate-limit retry section
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

/// Graduation rules section
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationSection {
    /// Virtual quote reserve (SOL) a pool needs before it may migrate
    #[serde(default = "default_threshold_sol")]
    pub graduation_threshold_sol: Decimal,
    /// Fees below this (SOL) are left in the pool
    #[serde(default = "default_min_claim_sol")]
    pub min_claim_sol: Decimal,
    /// Freshness of cached pool state served by the progress endpoint
    #[serde(default = "default_pool_cache_ttl_secs")]
    pub pool_cache_ttl_secs: u64,
    #[serde(default)]
    pub permanent_pool_addressing: PermanentPoolAddressing,
}

fn default_threshold_sol() -> Decimal {
    dec!(85)
}

fn default_min_claim_sol() -> Decimal {
    dec!(0.001)
}

fn default_pool_cache_ttl_secs() -> u64 {
    30
}

impl Default for MigrationSection {
    fn default() -> Self {
        Self {
            graduation_threshold_sol: default_threshold_sol(),
            min_claim_sol: default_min_claim_sol(),
            pool_cache_ttl_secs: default_pool_cache_ttl_secs(),
            permanent_pool_addressing: PermanentPoolAddressing::default(),
        }
    }
}

impl MigrationSection {
    pub fn threshold_lamports(&self) -> Result<u64, ConfigError> {
        sol_to_lamports(self.graduation_threshold_sol).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "graduation_threshold_sol out of range: {}",
                self.graduation_threshold_sol
            ))
        })
    }

    pub fn min_claim_lamports(&self) -> Result<u64, ConfigError> {
        sol_to_lamports(self.min_claim_sol).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "min_claim_sol out of range: {}",
                self.min_claim_sol
            ))
        })
    }

    pub fn pool_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.pool_cache_ttl_secs as i64)
    }
}

/// On-chain addresses section
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramsSection {
    /// Bonding-curve program whose pool accounts match `VirtualPoolAccount`
    pub bonding_curve_program: String,
    /// AMM program the migration creates the permanent pool in
    pub amm_program: String,
    /// Partner fee collection wallet
    pub fee_collection_address: String,
    /// Protocol migration fee receiver
    pub migration_fee_address: String,
    /// AMM config the migration creates the permanent pool under
    pub migration_config: String,
    /// Overridden by LOOKUP_TABLE_ADDRESS when set
    #[serde(default)]
    pub lookup_table_address: Option<String>,
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value.trim()).map_err(|e| {
        ConfigError::ValidationError(format!(
            "{} is not a valid address ({}): {}",
            field, value, e
        ))
    })
}

impl ProgramsSection {
    pub fn program(&self) -> Result<BondingCurveProgram, ConfigError> {
        Ok(BondingCurveProgram::new(
            parse_pubkey("bonding_curve_program", &self.bonding_curve_program)?,
            parse_pubkey("amm_program", &self.amm_program)?,
        ))
    }

    pub fn fee_collection(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("fee_collection_address", &self.fee_collection_address)
    }

    pub fn migration_fee(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("migration_fee_address", &self.migration_fee_address)
    }

    pub fn migration_config(&self) -> Result<Pubkey, ConfigError> {
        parse_pubkey("migration_config", &self.migration_config)
    }

    /// Lookup table with LOOKUP_TABLE_ADDRESS env override; empty means unset
    pub fn lookup_table(&self) -> Result<Option<Pubkey>, ConfigError> {
        let value = std::env::var("LOOKUP_TABLE_ADDRESS")
            .ok()
            .or_else(|| self.lookup_table_address.clone())
            .filter(|v| !v.trim().is_empty());
        value
            .map(|v| parse_pubkey("lookup_table_address", &v))
            .transpose()
    }
}

/// HTTP API section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Persistence section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    pub data_file: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_file: format!("data/{}", crate::adapters::storage::DEFAULT_STORE_FILE),
        }
    }
}

impl StorageSection {
    pub fn data_path(&self) -> String {
        shellexpand::tilde(&self.data_file).into_owned()
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate Solana
        if self.solana.rpc_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "rpc_url cannot be empty".to_string(),
            ));
        }

        if self.solana.keypair_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "keypair_path cannot be empty".to_string(),
            ));
        }

        self.solana.commitment_config()?;

        if self.solana.confirm_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "confirm_poll_interval_ms must be > 0".to_string(),
            ));
        }

        // Validate retry
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be > 0".to_string(),
            ));
        }

        // Validate migration
        if self.migration.graduation_threshold_sol <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "graduation_threshold_sol must be > 0, got {}",
                self.migration.graduation_threshold_sol
            )));
        }

        if self.migration.min_claim_sol < Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "min_claim_sol must be >= 0, got {}",
                self.migration.min_claim_sol
            )));
        }

        self.migration.threshold_lamports()?;
        self.migration.min_claim_lamports()?;

        // Validate programs
        self.programs.program()?;
        self.programs.fee_collection()?;
        self.programs.migration_fee()?;
        self.programs.migration_config()?;
        if let Some(table) = &self.programs.lookup_table_address {
            if !table.trim().is_empty() {
                parse_pubkey("lookup_table_address", table)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[solana]
rpc_url = "https://api.mainnet-beta.solana.com"
commitment = "confirmed"
keypair_path = "~/.config/solana/partner.json"

[retry]
max_attempts = 5
base_delay_ms = 1000

[migration]
graduation_threshold_sol = 85
min_claim_sol = 0.001
pool_cache_ttl_secs = 30
permanent_pool_addressing = "alias_bonding_pool"

[programs]
bonding_curve_program = "dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN"
amm_program = "cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG"
fee_collection_address = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
migration_fee_address = "CHRkrgcfM5kJcs6SMnWQuNcGmhwJbjmw8uzqs4B4VKz2"
migration_config = "7F6dnUcRuyM2TwR8myT1dYypFXpPSxqwKNSFNkxyNESd"

[server]
bind_addr = "127.0.0.1:3000"

[logging]
level = "info"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_load_valid_config() {
        let temp_file = write_config(&create_valid_config());

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.migration.threshold_lamports().unwrap(), 85_000_000_000);
        assert_eq!(config.migration.min_claim_lamports().unwrap(), 1_000_000);
        assert_eq!(config.retry.policy().worst_case_delay(), Duration::from_secs(15));
        assert_eq!(
            config.migration.permanent_pool_addressing,
            PermanentPoolAddressing::AliasBondingPool
        );
        let program = config.programs.program().unwrap();
        assert_eq!(
            program.program_id,
            Pubkey::from_str("dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN").unwrap()
        );
        assert_eq!(
            program.amm_program_id,
            Pubkey::from_str("cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG").unwrap()
        );
        assert_eq!(config.server.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_optional_sections_default() {
        let minimal = r#"
[solana]
rpc_url = "http://127.0.0.1:8899"
keypair_path = "partner.json"

[programs]
bonding_curve_program = "dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN"
amm_program = "cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG"
fee_collection_address = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
migration_fee_address = "CHRkrgcfM5kJcs6SMnWQuNcGmhwJbjmw8uzqs4B4VKz2"
migration_config = "7F6dnUcRuyM2TwR8myT1dYypFXpPSxqwKNSFNkxyNESd"
"#;
        let config: Config = toml::from_str(minimal).unwrap();
        config.validate().unwrap();

        assert_eq!(config.solana.commitment, "confirmed");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.migration.graduation_threshold_sol, dec!(85));
        assert_eq!(config.migration.pool_cache_ttl_secs, 30);
        assert!(config.programs.lookup_table_address.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_program_ids_are_required() {
        for line in [
            "bonding_curve_program = \"dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN\"\n",
            "amm_program = \"cpamdpZCGKUy5JxQXB4dcpGPiikHawvSWAd6mEn1sGG\"\n",
        ] {
            let content = create_valid_config().replace(line, "");
            let temp_file = write_config(&content);

            match load_config(temp_file.path()) {
                Err(ConfigError::ParseError(e)) => assert!(e.to_string().contains("program")),
                other => panic!("expected parse error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_threshold() {
        let content = create_valid_config().replace(
            "graduation_threshold_sol = 85",
            "graduation_threshold_sol = 0",
        );
        let temp_file = write_config(&content);

        let result = load_config(temp_file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_invalid_address() {
        let content = create_valid_config().replace(
            "migration_config = \"7F6dnUcRuyM2TwR8myT1dYypFXpPSxqwKNSFNkxyNESd\"",
            "migration_config = \"not-a-pubkey\"",
        );
        let temp_file = write_config(&content);

        match load_config(temp_file.path()) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("migration_config")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_commitment() {
        let content = create_valid_config()
            .replace("commitment = \"confirmed\"", "commitment = \"eventual\"");
        let temp_file = write_config(&content);

        assert!(matches!(
            load_config(temp_file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_derived_pda_addressing_parses() {
        let content = create_valid_config().replace("alias_bonding_pool", "derived_pda");
        let temp_file = write_config(&content);

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.migration.permanent_pool_addressing,
            PermanentPoolAddressing::DerivedPda
        );
    }

    #[test]
    fn test_malformed_toml() {
        let temp_file = write_config("[solana\nrpc_url = ");
        assert!(matches!(
            load_config(temp_file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
