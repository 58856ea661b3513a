//! Configuration management for utxochain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WalletConfig {
    #[serde(default = "default_wallet_path")]
    pub path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            path: default_wallet_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MinerConfig {
    /// Exclusive upper bound of the nonce search.
    #[serde(default = "default_max_nonce")]
    pub max_nonce: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            max_nonce: default_max_nonce(),
        }
    }
}

fn default_database_path() -> String {
    "./data/chain.db".to_string()
}

fn default_wallet_path() -> String {
    "./data/wallets.json".to_string()
}

fn default_max_nonce() -> u64 {
    i64::MAX as u64
}

/// Loads the configuration from `path`, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<Config, ChainError> {
    let config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        parse_config(&config_str)?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    Ok(toml::from_str(config_str)?)
}

fn validate(config: &Config) -> Result<(), ChainError> {
    if config.database.path.is_empty() {
        return Err(ChainError::ConfigError(
            "database.path must be set in config.toml".to_string(),
        ));
    }

    if config.wallet.path.is_empty() {
        return Err(ChainError::ConfigError(
            "wallet.path must be set in config.toml".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = parse_config("").unwrap();
        assert_eq!(config.database.path, "./data/chain.db");
        assert_eq!(config.wallet.path, "./data/wallets.json");
        assert_eq!(config.miner.max_nonce, i64::MAX as u64);
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config(
            r#"
            [database]
            path = "/tmp/ledger.db"

            [miner]
            max_nonce = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.database.path, "/tmp/ledger.db");
        assert_eq!(config.wallet.path, "./data/wallets.json");
        assert_eq!(config.miner.max_nonce, 1000);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/utxochain/config.toml")).unwrap();
        assert_eq!(config.database.path, "./data/chain.db");
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = parse_config("[database]\npath = \"\"\n").unwrap();
        assert!(matches!(validate(&config), Err(ChainError::ConfigError(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = parse_config("[miner]\nmax_nonce = \"lots\"\n");
        assert!(matches!(result, Err(ChainError::ConfigError(_))));
    }
}
