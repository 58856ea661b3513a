// Thin re-export module: implementation is in `blockchain/core.rs` so block structure, the
// ledger, admission checks and UTXO resolution can evolve separately.

pub mod core;
pub use self::core::*;
