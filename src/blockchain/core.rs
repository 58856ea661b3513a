// core.rs splits chain responsibilities into submodules: block structure, the persisted ledger,
// admission checks and unspent-output resolution.
pub mod block;
pub mod chain;
pub mod utxo;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use utxo::*;
pub use validation::*;
