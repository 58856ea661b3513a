//! CLI utilities shared by the `utxochain` binary

use crate::blockchain::{new_transfer, Block, ChainScan, Ledger, UtxoIndex};
use crate::config::Config;
use crate::crypto::{pub_key_hash_from_address, validate_address};
use crate::error::ChainError;
use crate::miner::ProofOfWork;
use crate::persistence::{Database, Persistence};
use crate::wallet::Wallets;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::fs;
use std::path::Path;

/// Opens the on-disk store, creating its parent directory when needed.
pub fn open_persistence(config: &Config) -> Result<Box<dyn Persistence>, ChainError> {
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                ChainError::DatabaseError(format!("Failed to create data dir {:?}: {}", parent, e))
            })?;
        }
    }
    Ok(Box::new(Database::open(&config.database.path)?))
}

pub fn open_ledger(config: &Config) -> Result<Ledger, ChainError> {
    Ledger::open(open_persistence(config)?, config.miner.clone())
}

pub fn init_ledger(config: &Config, address: &str) -> Result<Ledger, ChainError> {
    ensure_address(address)?;
    Ledger::initialize(open_persistence(config)?, address, config.miner.clone())
}

pub fn load_wallets(config: &Config) -> Result<Wallets, ChainError> {
    Wallets::load(Path::new(&config.wallet.path))
}

fn ensure_address(address: &str) -> Result<(), ChainError> {
    if validate_address(address) {
        Ok(())
    } else {
        Err(ChainError::InvalidAddress(format!(
            "{} is not a valid address",
            address
        )))
    }
}

pub fn balance_of(ledger: &Ledger, address: &str) -> Result<u64, ChainError> {
    let pub_key_hash = pub_key_hash_from_address(address)?;
    ChainScan::new(ledger).balance(&pub_key_hash)
}

/// Pays `amount` from a wallet held in `wallets` and mines the payment into its own block.
pub fn send(
    ledger: &mut Ledger,
    wallets: &Wallets,
    from: &str,
    to: &str,
    amount: u64,
) -> Result<Block, ChainError> {
    ensure_address(from)?;
    ensure_address(to)?;

    let keypair = wallets.get(from)?.keypair()?;
    let tx = new_transfer(&keypair, to, amount, ledger)?;
    ledger.append_block(vec![tx])
}

/// Renders a block the way `print` shows it, including whether its proof-of-work holds.
pub fn format_block(block: &Block) -> String {
    let pow_valid = ProofOfWork::new(block).validate();
    let pow = if pow_valid {
        "true".bright_green()
    } else {
        "false".bright_red().bold()
    };

    let mut lines = vec![
        format!("{} {}", "Prev. hash:".bright_cyan(), hex::encode(&block.prev_hash)),
        format!("{} {}", "Hash:".bright_cyan(), block.hash_str()),
        format!("{} {}", "Nonce:".bright_cyan(), block.nonce),
        format!("{} {}", "PoW:".bright_cyan(), pow),
    ];
    lines.extend(block.transactions.iter().map(|tx| tx.to_string()));
    lines.join("\n")
}

pub fn print_chain(ledger: &Ledger) -> Result<(), ChainError> {
    for block in ledger.iter() {
        println!("{}", format_block(&block?));
        println!();
    }
    Ok(())
}

pub fn address_table(wallets: &Wallets) -> Result<Table, ChainError> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Address").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
        ]);

    for (index, address) in wallets.addresses().iter().enumerate() {
        let wallet = wallets.get(address)?;
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(address),
            Cell::new(&wallet.created_at),
        ]);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, WalletConfig};
    use crate::miner::hash_meets_target;
    use tempfile::TempDir;

    fn temp_config(dir: &TempDir) -> Config {
        Config {
            database: DatabaseConfig {
                path: dir.path().join("data").join("chain.db").to_string_lossy().into_owned(),
            },
            wallet: WalletConfig {
                path: dir.path().join("data").join("wallets.json").to_string_lossy().into_owned(),
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_open_before_init_is_not_found() {
        let dir = TempDir::new().unwrap();
        let config = temp_config(&dir);
        assert!(matches!(open_ledger(&config), Err(ChainError::NotFound(_))));
    }

    #[test]
    fn test_init_rejects_invalid_address() {
        let dir = TempDir::new().unwrap();
        let config = temp_config(&dir);
        assert!(matches!(
            init_ledger(&config, "bogus"),
            Err(ChainError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_send_between_wallets() {
        let dir = TempDir::new().unwrap();
        let config = temp_config(&dir);

        let mut wallets = load_wallets(&config).unwrap();
        let alice = wallets.create_wallet().unwrap();
        let bob = wallets.create_wallet().unwrap();
        wallets.save(Path::new(&config.wallet.path)).unwrap();

        drop(init_ledger(&config, &alice).unwrap());

        let mut ledger = open_ledger(&config).unwrap();
        let wallets = load_wallets(&config).unwrap();
        send(&mut ledger, &wallets, &alice, &bob, 40).unwrap();

        assert_eq!(balance_of(&ledger, &alice).unwrap(), 60);
        assert_eq!(balance_of(&ledger, &bob).unwrap(), 40);
    }

    #[test]
    fn test_send_from_unknown_wallet() {
        let dir = TempDir::new().unwrap();
        let config = temp_config(&dir);

        let mut wallets = Wallets::new();
        let alice = wallets.create_wallet().unwrap();
        let mut ledger = init_ledger(&config, &alice).unwrap();

        let result = send(&mut ledger, &Wallets::new(), &alice, &alice, 1);
        assert!(matches!(result, Err(ChainError::NotFound(_))));
    }

    #[test]
    fn test_format_block_reports_pow() {
        let dir = TempDir::new().unwrap();
        let config = temp_config(&dir);
        let mut wallets = Wallets::new();
        let alice = wallets.create_wallet().unwrap();
        let ledger = init_ledger(&config, &alice).unwrap();

        let mut genesis = ledger.block(ledger.last_hash()).unwrap();
        let rendered = format_block(&genesis);
        assert!(rendered.contains("true"));
        assert!(rendered.contains(&genesis.hash_str()));

        let pow = ProofOfWork::new(&genesis);
        let bad_nonce = (0..)
            .find(|nonce| !hash_meets_target(&pow.digest(*nonce), pow.target()))
            .unwrap();
        genesis.nonce = bad_nonce;
        let rendered = format_block(&genesis);
        assert!(rendered.contains("false"));
        assert!(!rendered.contains("true"));
    }

    #[test]
    fn test_address_table_lists_wallets() {
        let mut wallets = Wallets::new();
        let address = wallets.create_wallet().unwrap();
        let rendered = address_table(&wallets).unwrap().to_string();
        assert!(rendered.contains(&address));
    }
}
