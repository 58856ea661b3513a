//! Proof-of-work mining
//!
//! A block is mined when `SHA-256(prev_hash || tx_digest || nonce || difficulty)`, read as an
//! unsigned 256-bit big-endian integer, is strictly below `2^(256 - DIFFICULTY)`. Comparing
//! two 32-byte big-endian arrays lexicographically is the same as comparing the integers.

use crate::blockchain::Block;
use crate::config::MinerConfig;
use crate::error::ChainError;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Fixed number of leading zero bits demanded of a block hash.
pub const DIFFICULTY: u32 = 14;

const PROGRESS_INTERVAL: u64 = 1 << 16;

pub type Target = [u8; 32];

/// `2^(256 - difficulty)` as a big-endian 32-byte integer.
///
/// A difficulty of zero would need 2^256, so it saturates to the all-ones value.
pub fn target_for(difficulty: u32) -> Target {
    if difficulty == 0 {
        return [0xFF; 32];
    }
    let bit = 256 - difficulty.min(256) as usize;
    let mut target = [0u8; 32];
    target[31 - bit / 8] = 1 << (bit % 8);
    target
}

pub fn hash_meets_target(hash: &[u8], target: &Target) -> bool {
    hash.len() == target.len() && hash < &target[..]
}

pub struct ProofOfWork<'a> {
    block: &'a Block,
    target: Target,
    prefix: Vec<u8>,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(block: &'a Block) -> Self {
        let mut prefix = block.prev_hash.clone();
        prefix.extend_from_slice(&block.hash_transactions());
        ProofOfWork {
            block,
            target: target_for(DIFFICULTY),
            prefix,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Bytes hashed for a given nonce.
    pub fn candidate_data(&self, nonce: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.prefix.len() + 16);
        data.extend_from_slice(&self.prefix);
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(&u64::from(DIFFICULTY).to_be_bytes());
        data
    }

    pub fn digest(&self, nonce: u64) -> [u8; 32] {
        Sha256::digest(self.candidate_data(nonce)).into()
    }

    /// Searches `0..max_nonce` for the first nonce whose digest is below the target.
    pub fn run(&self, max_nonce: u64) -> Result<(u64, Vec<u8>), ChainError> {
        self.search(max_nonce, None)
    }

    /// Same as [`run`](Self::run), giving up with `MiningCancelled` once `cancel` is set.
    pub fn run_with_cancel(
        &self,
        max_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<(u64, Vec<u8>), ChainError> {
        self.search(max_nonce, Some(cancel))
    }

    fn search(
        &self,
        max_nonce: u64,
        cancel: Option<&AtomicBool>,
    ) -> Result<(u64, Vec<u8>), ChainError> {
        for nonce in 0..max_nonce {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(ChainError::MiningCancelled);
            }

            let hash = self.digest(nonce);
            if hash_meets_target(&hash, &self.target) {
                info!("Mined block {} with nonce {}", hex::encode(hash), nonce);
                return Ok((nonce, hash.to_vec()));
            }

            if nonce > 0 && nonce % PROGRESS_INTERVAL == 0 {
                debug!("Mining: {} attempts, last hash {}", nonce, hex::encode(hash));
            }
        }

        Err(ChainError::MiningExhausted(max_nonce))
    }

    /// Recomputes the digest for the block's stored nonce and checks it against the target.
    pub fn validate(&self) -> bool {
        hash_meets_target(&self.digest(self.block.nonce), &self.target)
    }
}

/// Finds and records the nonce and hash for `block`.
pub fn mine_block(mut block: Block, miner: &MinerConfig) -> Result<Block, ChainError> {
    let (nonce, hash) = ProofOfWork::new(&block).run(miner.max_nonce)?;
    block.nonce = nonce;
    block.hash = hash;
    Ok(block)
}
