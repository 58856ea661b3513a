use crate::blockchain::core::block::Block;
use crate::blockchain::core::validation::validate_block;
use crate::config::MinerConfig;
use crate::crypto::KeyPair;
use crate::error::ChainError;
use crate::persistence::{Persistence, WriteBatch};
use crate::transaction::{PriorTransactions, Transaction};
use std::collections::HashSet;
use tracing::{debug, info};

/// Store key holding the hash of the current chain tip.
pub const LAST_HASH_KEY: &[u8] = b"lh";

/// Issuance metadata carried by the genesis coinbase input.
pub const GENESIS_DATA: &str = "First Transaction from Genesis";

/// An output reference: hex transaction id and output index.
pub type Outpoint = (String, i64);

/// The append-only chain. Only the tip hash lives in memory; blocks are read from the store on
/// demand.
pub struct Ledger {
    last_hash: Vec<u8>,
    persistence: Box<dyn Persistence>,
    miner: MinerConfig,
}

impl Ledger {
    /// Creates a new chain whose genesis coinbase pays `genesis_address`.
    pub fn initialize(
        persistence: Box<dyn Persistence>,
        genesis_address: &str,
        miner: MinerConfig,
    ) -> Result<Self, ChainError> {
        if persistence.contains(LAST_HASH_KEY)? {
            return Err(ChainError::AlreadyExists);
        }

        info!("No existing blockchain found, creating genesis for {}", genesis_address);
        let coinbase = Transaction::new_coinbase(genesis_address, GENESIS_DATA)?;
        let genesis = Block::genesis(coinbase, &miner)?;
        validate_block(&genesis, &[])?;

        let mut batch = WriteBatch::new();
        batch
            .put(genesis.hash.clone(), genesis.serialize()?)
            .put(LAST_HASH_KEY, genesis.hash.clone());
        persistence.write_batch(&batch)?;

        info!("Genesis block {} created", genesis.hash_str());
        Ok(Ledger {
            last_hash: genesis.hash,
            persistence,
            miner,
        })
    }

    /// Re-opens an existing chain.
    pub fn open(persistence: Box<dyn Persistence>, miner: MinerConfig) -> Result<Self, ChainError> {
        let last_hash = persistence.get(LAST_HASH_KEY)?.ok_or_else(|| {
            ChainError::NotFound("No existing blockchain found, initialize one first".to_string())
        })?;

        debug!("Opened blockchain at tip {}", hex::encode(&last_hash));
        Ok(Ledger {
            last_hash,
            persistence,
            miner,
        })
    }

    pub fn last_hash(&self) -> &[u8] {
        &self.last_hash
    }

    fn read_head(&self) -> Result<Vec<u8>, ChainError> {
        self.persistence
            .get(LAST_HASH_KEY)?
            .ok_or_else(|| ChainError::NotFound("chain-head pointer".to_string()))
    }

    pub fn block(&self, hash: &[u8]) -> Result<Block, ChainError> {
        load_block(self.persistence.as_ref(), hash)
    }

    /// Iterates from the tip back to genesis.
    pub fn iter(&self) -> LedgerIterator<'_> {
        LedgerIterator {
            current_hash: self.last_hash.clone(),
            persistence: self.persistence.as_ref(),
            finished: false,
        }
    }

    /// Number of blocks on the chain, genesis included.
    pub fn height(&self) -> Result<usize, ChainError> {
        self.iter().try_fold(0, |count, block| block.map(|_| count + 1))
    }

    pub fn find_transaction(&self, id: &[u8]) -> Result<Transaction, ChainError> {
        for block in self.iter() {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| tx.id == id) {
                return Ok(tx);
            }
        }

        Err(ChainError::NotFound(format!(
            "Transaction {} does not exist",
            hex::encode(id)
        )))
    }

    fn prior_transactions(&self, tx: &Transaction) -> Result<PriorTransactions, ChainError> {
        let mut prev_txs = PriorTransactions::new();
        for input in &tx.inputs {
            let prev_tx = self.find_transaction(&input.prev_tx_id).map_err(|e| match e {
                ChainError::NotFound(msg) => ChainError::MissingPriorTransaction(msg),
                other => other,
            })?;
            prev_txs.insert(prev_tx.hash_str(), prev_tx);
        }
        Ok(prev_txs)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, key: &KeyPair) -> Result<(), ChainError> {
        if tx.is_coinbase() {
            return Ok(());
        }
        let prev_txs = self.prior_transactions(tx)?;
        tx.sign(key, &prev_txs)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool, ChainError> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev_txs = self.prior_transactions(tx)?;
        tx.verify(&prev_txs)
    }

    /// Every output already consumed by an input somewhere on the chain.
    pub fn spent_outpoints(&self) -> Result<HashSet<Outpoint>, ChainError> {
        let mut spent = HashSet::new();
        for block in self.iter() {
            for tx in block?.transactions.iter().filter(|tx| !tx.is_coinbase()) {
                for input in &tx.inputs {
                    spent.insert((input.prev_tx_hex(), input.out_index));
                }
            }
        }
        Ok(spent)
    }

    fn check_spend(
        &self,
        tx: &Transaction,
        spent: &HashSet<Outpoint>,
    ) -> Result<(), ChainError> {
        let prev_txs = self.prior_transactions(tx)?;
        if !tx.verify(&prev_txs)? {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} failed signature verification",
                tx.hash_str()
            )));
        }

        let mut input_total: u64 = 0;
        for input in &tx.inputs {
            let outpoint = (input.prev_tx_hex(), input.out_index);
            if spent.contains(&outpoint) {
                return Err(ChainError::DoubleSpendDetected(format!(
                    "Output {}:{} is already spent on chain",
                    outpoint.0, outpoint.1
                )));
            }

            // `verify` has already resolved every referenced output.
            let value = usize::try_from(input.out_index)
                .ok()
                .and_then(|index| prev_txs.get(&outpoint.0)?.outputs.get(index))
                .map(|output| output.value)
                .unwrap_or_default();
            input_total = input_total.saturating_add(value);
        }

        if tx.total_output() > input_total {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} spends {} but only consumes {}",
                tx.hash_str(),
                tx.total_output(),
                input_total
            )));
        }

        Ok(())
    }

    /// Mines `transactions` into a new block on top of the stored tip and persists it.
    ///
    /// The cached tip is refreshed from the store first, so spend checks, linkage and the
    /// persisted head all refer to the same chain.
    pub fn append_block(&mut self, transactions: Vec<Transaction>) -> Result<Block, ChainError> {
        if transactions.is_empty() {
            return Err(ChainError::InvalidBlock(
                "A block must contain at least one transaction".to_string(),
            ));
        }

        let last_hash = self.read_head()?;
        if last_hash != self.last_hash {
            debug!(
                "Cached tip {} is stale, store head is {}",
                hex::encode(&self.last_hash),
                hex::encode(&last_hash)
            );
            self.last_hash = last_hash.clone();
        }

        let spent = self.spent_outpoints()?;
        for tx in transactions.iter().filter(|tx| !tx.is_coinbase()) {
            self.check_spend(tx, &spent)?;
        }

        let block = Block::create(transactions, last_hash.clone(), &self.miner)?;
        self.commit_block(block, &last_hash)
    }

    /// Runs block admission and writes the block together with the new head.
    fn commit_block(&mut self, block: Block, prev_hash: &[u8]) -> Result<Block, ChainError> {
        validate_block(&block, prev_hash)?;

        let mut batch = WriteBatch::new();
        batch
            .put(block.hash.clone(), block.serialize()?)
            .put(LAST_HASH_KEY, block.hash.clone());
        self.persistence.write_batch(&batch)?;

        self.last_hash = block.hash.clone();
        info!(
            "Appended block {} with {} transaction(s)",
            block.hash_str(),
            block.transactions.len()
        );
        Ok(block)
    }
}

fn load_block(persistence: &dyn Persistence, hash: &[u8]) -> Result<Block, ChainError> {
    let encoded = persistence
        .get(hash)?
        .ok_or_else(|| ChainError::NotFound(format!("Block {}", hex::encode(hash))))?;
    Block::deserialize(&encoded)
}

/// Walks the chain from the tip to genesis, loading one block per step.
///
/// A load or decode failure is yielded once and ends the iteration.
pub struct LedgerIterator<'a> {
    current_hash: Vec<u8>,
    persistence: &'a dyn Persistence,
    finished: bool,
}

impl Iterator for LedgerIterator<'_> {
    type Item = Result<Block, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match load_block(self.persistence, &self.current_hash) {
            Ok(block) => {
                if block.is_genesis() {
                    self.finished = true;
                } else {
                    self.current_hash = block.prev_hash.clone();
                }
                Some(Ok(block))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
