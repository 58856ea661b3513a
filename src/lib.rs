//! utxochain - A single-node UTXO ledger secured by proof-of-work
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the persisted ledger, admission checks and UTXO resolution
//! - [`transaction`] - Transaction types and the per-input signing protocol
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search and validation
//!
//! ## Cryptography
//! - [`crypto`] - secp256k1 keys, public key hashing and Base58Check addresses
//!
//! ## State Management
//! - [`wallet`] - JSON wallet file
//! - [`persistence`] - Key/value store (SQLite and in-memory)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;
pub mod wallet;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
