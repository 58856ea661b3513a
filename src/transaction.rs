//! Transaction module split into types and the signing protocol

pub mod signing;
pub mod types;

pub use signing::PriorTransactions;
pub use types::*;
