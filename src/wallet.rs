//! Wallet file management
//!
//! Wallets live in a single JSON document mapping each address to its key material. The file is
//! rewritten atomically through a temporary file and a rename.

use crate::crypto::{validate_address, KeyPair};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub secret_key_hex: String,
    /// Raw `x || y` public key, hex-encoded.
    pub public_key_hex: String,
    /// RFC3339 creation timestamp
    pub created_at: String,
}

impl Wallet {
    pub fn generate() -> Result<Self, ChainError> {
        Ok(Self::from_keypair(&KeyPair::generate()?))
    }

    pub fn from_keypair(keypair: &KeyPair) -> Self {
        Wallet {
            secret_key_hex: hex::encode(keypair.secret_bytes()),
            public_key_hex: hex::encode(keypair.public_key_raw()),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuilds the key pair, checking it against the stored public key.
    pub fn keypair(&self) -> Result<KeyPair, ChainError> {
        let secret = hex::decode(&self.secret_key_hex)
            .map_err(|e| ChainError::WalletError(format!("Invalid secret key hex: {}", e)))?;
        let keypair = KeyPair::from_secret_bytes(&secret)?;

        if hex::encode(keypair.public_key_raw()) != self.public_key_hex {
            return Err(ChainError::WalletError(
                "Stored public key does not match the secret key".to_string(),
            ));
        }
        Ok(keypair)
    }

    pub fn address(&self) -> Result<String, ChainError> {
        Ok(self.keypair()?.address())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wallets {
    wallets: BTreeMap<String, Wallet>,
}

impl Wallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the wallet file, or an empty collection when it does not exist yet.
    pub fn load(path: &Path) -> Result<Self, ChainError> {
        if !path.exists() {
            return Ok(Wallets::new());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ChainError::WalletError(format!("Failed to read wallet file: {}", e)))?;
        let wallets: Wallets = serde_json::from_str(&contents)
            .map_err(|e| ChainError::WalletError(format!("Failed to parse wallet file: {}", e)))?;

        for address in wallets.wallets.keys() {
            if !validate_address(address) {
                return Err(ChainError::WalletError(format!(
                    "Wallet file contains invalid address {}",
                    address
                )));
            }
        }
        Ok(wallets)
    }

    pub fn save(&self, path: &Path) -> Result<(), ChainError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ChainError::WalletError(format!("Failed to create wallet dir: {}", e))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ChainError::WalletError(format!("Failed to serialize wallets: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .map_err(|e| ChainError::WalletError(format!("Failed to create temp file: {}", e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| ChainError::WalletError(format!("Failed to write wallets: {}", e)))?;
        file.sync_all()
            .map_err(|e| ChainError::WalletError(format!("Failed to sync file: {}", e)))?;
        drop(file);

        fs::rename(&temp_path, path)
            .map_err(|e| ChainError::WalletError(format!("Failed to finalize write: {}", e)))?;
        Ok(())
    }

    /// Generates a new wallet and returns its address. Call [`save`](Self::save) to persist it.
    pub fn create_wallet(&mut self) -> Result<String, ChainError> {
        let wallet = Wallet::generate()?;
        let address = wallet.address()?;
        self.wallets.insert(address.clone(), wallet);
        info!("Created wallet {}", address);
        Ok(address)
    }

    pub fn get(&self, address: &str) -> Result<&Wallet, ChainError> {
        self.wallets
            .get(address)
            .ok_or_else(|| ChainError::NotFound(format!("No wallet for address {}", address)))
    }

    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wallet_keypair_roundtrip() {
        let keypair = KeyPair::generate().unwrap();
        let wallet = Wallet::from_keypair(&keypair);

        let restored = wallet.keypair().unwrap();
        assert_eq!(restored.public_key_raw(), keypair.public_key_raw());
        assert_eq!(wallet.address().unwrap(), keypair.address());
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let mut wallet = Wallet::generate().unwrap();
        wallet.public_key_hex = hex::encode(KeyPair::generate().unwrap().public_key_raw());
        assert!(matches!(wallet.keypair(), Err(ChainError::WalletError(_))));
    }

    #[test]
    fn test_create_and_get() {
        let mut wallets = Wallets::new();
        let address = wallets.create_wallet().unwrap();

        assert!(validate_address(&address));
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets.get(&address).unwrap().address().unwrap(), address);
        assert!(matches!(
            wallets.get("1NoSuchWallet"),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let wallets = Wallets::load(&dir.path().join("wallets.json")).unwrap();
        assert!(wallets.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("wallets.json");

        let mut wallets = Wallets::new();
        let first = wallets.create_wallet().unwrap();
        let second = wallets.create_wallet().unwrap();
        wallets.save(&path).unwrap();

        let loaded = Wallets::load(&path).unwrap();
        let mut expected = vec![first.clone(), second];
        expected.sort();
        assert_eq!(loaded.addresses(), expected);
        assert_eq!(loaded.get(&first).unwrap(), wallets.get(&first).unwrap());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_wallet_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallets.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Wallets::load(&path), Err(ChainError::WalletError(_))));
    }
}
