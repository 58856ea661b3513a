use crate::blockchain::core::block::Block;
use crate::error::ChainError;
use crate::miner::ProofOfWork;
use std::collections::HashMap;

/// Runs every stateless admission check for a block about to extend `expected_prev_hash`.
pub fn validate_block(block: &Block, expected_prev_hash: &[u8]) -> Result<(), ChainError> {
    if block.transactions.is_empty() {
        return Err(ChainError::InvalidBlock(
            "Block contains no transactions".to_string(),
        ));
    }

    if block.prev_hash != expected_prev_hash {
        return Err(ChainError::InvalidBlockLinkage);
    }

    validate_proof_of_work(block)?;
    validate_transaction_ids(block)?;
    validate_no_double_spend(block)
}

/// The stored hash must be the digest of the stored nonce, and that digest must meet the target.
pub fn validate_proof_of_work(block: &Block) -> Result<(), ChainError> {
    let pow = ProofOfWork::new(block);
    if !pow.validate() || pow.digest(block.nonce)[..] != block.hash[..] {
        return Err(ChainError::InvalidProofOfWork);
    }
    Ok(())
}

/// Ids are assigned before signing, so signatures are excluded from the recomputation.
pub fn validate_transaction_ids(block: &Block) -> Result<(), ChainError> {
    for tx in &block.transactions {
        if tx.compute_unsigned_id()? != tx.id {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction id {} does not match its contents",
                tx.hash_str()
            )));
        }
    }
    Ok(())
}

pub fn validate_no_double_spend(block: &Block) -> Result<(), ChainError> {
    let mut seen_inputs = HashMap::new();
    for tx in block.transactions.iter().filter(|tx| !tx.is_coinbase()) {
        for input in &tx.inputs {
            let outpoint = (input.prev_tx_hex(), input.out_index);
            if let Some(conflicting_tx) = seen_inputs.get(&outpoint) {
                return Err(ChainError::DoubleSpendDetected(format!(
                    "Output {}:{} is spent by both {} and {}",
                    outpoint.0,
                    outpoint.1,
                    conflicting_tx,
                    tx.hash_str()
                )));
            }
            seen_inputs.insert(outpoint, tx.hash_str());
        }
    }
    Ok(())
}
