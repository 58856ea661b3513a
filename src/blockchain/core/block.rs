use crate::config::MinerConfig;
use crate::error::ChainError;
use crate::miner::mine_block;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(with = "serde_bytes")]
    pub hash: Vec<u8>,
    pub transactions: Vec<Transaction>,
    /// Empty for the genesis block.
    #[serde(with = "serde_bytes")]
    pub prev_hash: Vec<u8>,
    pub nonce: u64,
}

impl Block {
    /// Mines a new block over `transactions` linked to `prev_hash`.
    pub fn create(
        transactions: Vec<Transaction>,
        prev_hash: Vec<u8>,
        miner: &MinerConfig,
    ) -> Result<Self, ChainError> {
        if transactions.is_empty() {
            return Err(ChainError::InvalidBlock(
                "A block must contain at least one transaction".to_string(),
            ));
        }

        let block = Block {
            hash: Vec::new(),
            transactions,
            prev_hash,
            nonce: 0,
        };
        mine_block(block, miner)
    }

    pub fn genesis(coinbase: Transaction, miner: &MinerConfig) -> Result<Self, ChainError> {
        Block::create(vec![coinbase], Vec::new(), miner)
    }

    /// SHA-256 over the concatenated transaction ids, in block order.
    pub fn hash_transactions(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for tx in &self.transactions {
            hasher.update(&tx.id);
        }
        hasher.finalize().to_vec()
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, ChainError> {
        bincode::deserialize(data).map_err(|e| ChainError::CorruptBlock(e.to_string()))
    }
}
