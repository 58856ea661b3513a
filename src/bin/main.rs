#![forbid(unsafe_code)]
//! utxochain command line

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::Level;
use utxochain::cli;
use utxochain::config::{load_config, Config, DEFAULT_CONFIG_FILE};
use utxochain::error::ChainError;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log mining progress and other debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a new chain whose genesis reward goes to ADDRESS
    Init { address: String },
    /// Prints every block from the tip back to genesis
    Print,
    /// Sends AMOUNT from a local wallet to another address
    Send {
        from: String,
        to: String,
        amount: u64,
    },
    /// Shows the spendable balance of ADDRESS
    Getbalance { address: String },
    /// Generates a new wallet and stores it in the wallet file
    Createwallet,
    /// Lists the addresses held in the wallet file
    Listaddresses,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), ChainError> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init { address } => {
            cli::init_ledger(&config, &address)?;
            println!("{}", "Blockchain initialized!".bright_green().bold());
        }
        Commands::Print => {
            let ledger = cli::open_ledger(&config)?;
            cli::print_chain(&ledger)?;
        }
        Commands::Send { from, to, amount } => {
            let mut ledger = cli::open_ledger(&config)?;
            let wallets = cli::load_wallets(&config)?;
            let block = cli::send(&mut ledger, &wallets, &from, &to, amount)?;
            println!("{}", "Success!".bright_green().bold());
            println!("Block: {}", block.hash_str().bright_white());
        }
        Commands::Getbalance { address } => {
            let ledger = cli::open_ledger(&config)?;
            let balance = cli::balance_of(&ledger, &address)?;
            println!("Balance of {}: {}", address.bright_white(), balance.to_string().bright_yellow());
        }
        Commands::Createwallet => create_wallet(&config)?,
        Commands::Listaddresses => {
            let wallets = cli::load_wallets(&config)?;
            if wallets.is_empty() {
                println!("{}", "No wallets yet. Run 'createwallet' first.".yellow());
            } else {
                println!("{}", cli::address_table(&wallets)?);
            }
        }
    }

    Ok(())
}

fn create_wallet(config: &Config) -> Result<(), ChainError> {
    let mut wallets = cli::load_wallets(config)?;
    let address = wallets.create_wallet()?;
    wallets.save(Path::new(&config.wallet.path))?;

    println!("{}", "New wallet created".bright_green().bold());
    println!("Address: {}", address.bright_white());
    println!("Stored in {}", config.wallet.path.dimmed());
    Ok(())
}
