//! Unspent output resolution
//!
//! Nothing is indexed: every query walks the chain from the tip back to genesis. Because the
//! walk is newest-first, an output is always marked spent before the transaction that created
//! it is visited.

use crate::blockchain::core::chain::Ledger;
use crate::crypto::{validate_address, KeyPair};
use crate::error::ChainError;
use crate::transaction::{Transaction, TxInput, TxOutput};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Hex transaction id to the output indices consumed by later transactions.
pub type SpentOutputs = HashMap<String, Vec<usize>>;

/// Hex transaction id to the output indices selected for spending.
pub type SpendableOutputs = BTreeMap<String, Vec<usize>>;

pub trait UtxoIndex {
    /// Transactions holding at least one unspent output locked to `pub_key_hash`.
    fn unspent_transactions(&self, pub_key_hash: &[u8]) -> Result<Vec<Transaction>, ChainError>;

    fn unspent_outputs(&self, pub_key_hash: &[u8]) -> Result<Vec<TxOutput>, ChainError>;

    /// First-fit selection of outputs worth at least `amount`, in chain-scan order.
    ///
    /// The returned total is below `amount` only when the owner cannot cover it.
    fn spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, SpendableOutputs), ChainError>;

    fn balance(&self, pub_key_hash: &[u8]) -> Result<u64, ChainError> {
        Ok(self
            .unspent_outputs(pub_key_hash)?
            .iter()
            .map(|output| output.value)
            .sum())
    }
}

/// Full-rescan implementation of [`UtxoIndex`] over a [`Ledger`].
pub struct ChainScan<'a> {
    ledger: &'a Ledger,
}

impl<'a> ChainScan<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        ChainScan { ledger }
    }

    fn scan(&self, pub_key_hash: &[u8]) -> Result<(Vec<Transaction>, SpentOutputs), ChainError> {
        let mut unspent = Vec::new();
        let mut spent = SpentOutputs::new();

        for block in self.ledger.iter() {
            for tx in block?.transactions {
                let consumed = spent.get(&tx.hash_str());
                let owns_unspent = tx.outputs.iter().enumerate().any(|(index, output)| {
                    output.is_locked_with_key(pub_key_hash)
                        && !consumed.is_some_and(|indices| indices.contains(&index))
                });

                if !tx.is_coinbase() {
                    for input in &tx.inputs {
                        if let Ok(index) = usize::try_from(input.out_index) {
                            spent.entry(input.prev_tx_hex()).or_default().push(index);
                        }
                    }
                }

                if owns_unspent {
                    unspent.push(tx);
                }
            }
        }

        Ok((unspent, spent))
    }

    /// Every unspent `(tx id, index, output)` locked to `pub_key_hash`, in scan order.
    fn unspent_outpoints(
        &self,
        pub_key_hash: &[u8],
    ) -> Result<Vec<(String, usize, TxOutput)>, ChainError> {
        let (transactions, spent) = self.scan(pub_key_hash)?;

        let mut outpoints = Vec::new();
        for tx in transactions {
            let txid = tx.hash_str();
            let consumed = spent.get(&txid);
            for (index, output) in tx.outputs.into_iter().enumerate() {
                if !output.is_locked_with_key(pub_key_hash) {
                    continue;
                }
                if consumed.is_some_and(|indices| indices.contains(&index)) {
                    continue;
                }
                outpoints.push((txid.clone(), index, output));
            }
        }
        Ok(outpoints)
    }
}

impl UtxoIndex for ChainScan<'_> {
    fn unspent_transactions(&self, pub_key_hash: &[u8]) -> Result<Vec<Transaction>, ChainError> {
        Ok(self.scan(pub_key_hash)?.0)
    }

    fn unspent_outputs(&self, pub_key_hash: &[u8]) -> Result<Vec<TxOutput>, ChainError> {
        Ok(self
            .unspent_outpoints(pub_key_hash)?
            .into_iter()
            .map(|(_, _, output)| output)
            .collect())
    }

    fn spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, SpendableOutputs), ChainError> {
        let mut accumulated: u64 = 0;
        let mut selected = SpendableOutputs::new();

        for (txid, index, output) in self.unspent_outpoints(pub_key_hash)? {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated.saturating_add(output.value);
            selected.entry(txid).or_default().push(index);
        }

        Ok((accumulated, selected))
    }
}

/// Builds and signs a payment of `amount` from the owner of `from` to `to`, returning change
/// to the sender when the selected outputs exceed the amount.
pub fn new_transfer(
    from: &KeyPair,
    to: &str,
    amount: u64,
    ledger: &Ledger,
) -> Result<Transaction, ChainError> {
    if amount == 0 {
        return Err(ChainError::InvalidTransaction(
            "Amount must be greater than zero".to_string(),
        ));
    }
    if !validate_address(to) {
        return Err(ChainError::InvalidAddress(format!(
            "Recipient address {} is not valid",
            to
        )));
    }

    let from_address = from.address();
    let (accumulated, selected) =
        ChainScan::new(ledger).spendable_outputs(&from.pub_key_hash(), amount)?;
    if accumulated < amount {
        return Err(ChainError::InsufficientFunds {
            available: accumulated,
            requested: amount,
        });
    }

    let mut inputs = Vec::new();
    for (txid, indices) in selected {
        let prev_tx_id = hex::decode(&txid).map_err(|e| {
            ChainError::InvalidTransaction(format!("Malformed transaction id {}: {}", txid, e))
        })?;
        for index in indices {
            let out_index = i64::try_from(index).map_err(|_| {
                ChainError::InvalidTransaction(format!("Output index {} out of range", index))
            })?;
            inputs.push(TxInput::new(prev_tx_id.clone(), out_index, from.public_key_raw()));
        }
    }

    let mut outputs = vec![TxOutput::new(amount, to)?];
    if accumulated > amount {
        outputs.push(TxOutput::new(accumulated - amount, &from_address)?);
    }

    let mut tx = Transaction::new(inputs, outputs)?;
    ledger.sign_transaction(&mut tx, from)?;
    debug!(
        "Built transfer {} of {} from {} to {}",
        tx.hash_str(),
        amount,
        from_address,
        to
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinerConfig;
    use crate::persistence::InMemoryPersistence;
    use crate::transaction::COINBASE_REWARD;

    fn funded_ledger() -> (KeyPair, Ledger) {
        let owner = KeyPair::generate().unwrap();
        let ledger = Ledger::initialize(
            Box::new(InMemoryPersistence::new()),
            &owner.address(),
            MinerConfig::default(),
        )
        .unwrap();
        (owner, ledger)
    }

    #[test]
    fn test_genesis_owner_holds_reward() {
        let (owner, ledger) = funded_ledger();
        let scan = ChainScan::new(&ledger);

        assert_eq!(scan.balance(&owner.pub_key_hash()).unwrap(), COINBASE_REWARD);
        assert_eq!(scan.unspent_transactions(&owner.pub_key_hash()).unwrap().len(), 1);

        let stranger = KeyPair::generate().unwrap();
        assert_eq!(scan.balance(&stranger.pub_key_hash()).unwrap(), 0);
        assert!(scan.unspent_outputs(&stranger.pub_key_hash()).unwrap().is_empty());
    }

    #[test]
    fn test_transfer_with_change() {
        let (owner, mut ledger) = funded_ledger();
        let recipient = KeyPair::generate().unwrap();

        let tx = new_transfer(&owner, &recipient.address(), 40, &ledger).unwrap();
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 40);
        assert!(tx.outputs[0].is_locked_with_key(&recipient.pub_key_hash()));
        assert_eq!(tx.outputs[1].value, 60);
        assert!(tx.outputs[1].is_locked_with_key(&owner.pub_key_hash()));

        ledger.append_block(vec![tx]).unwrap();

        let scan = ChainScan::new(&ledger);
        assert_eq!(scan.balance(&owner.pub_key_hash()).unwrap(), 60);
        assert_eq!(scan.balance(&recipient.pub_key_hash()).unwrap(), 40);
        // The genesis coinbase is fully consumed.
        assert_eq!(scan.unspent_transactions(&owner.pub_key_hash()).unwrap().len(), 1);
    }

    #[test]
    fn test_exact_amount_has_no_change() {
        let (owner, ledger) = funded_ledger();
        let recipient = KeyPair::generate().unwrap();

        let tx = new_transfer(&owner, &recipient.address(), COINBASE_REWARD, &ledger).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.total_output(), COINBASE_REWARD);
    }

    #[test]
    fn test_insufficient_funds() {
        let (owner, ledger) = funded_ledger();
        let recipient = KeyPair::generate().unwrap();

        let result = new_transfer(&owner, &recipient.address(), 101, &ledger);
        assert_eq!(
            result,
            Err(ChainError::InsufficientFunds {
                available: 100,
                requested: 101
            })
        );
    }

    #[test]
    fn test_transfer_argument_checks() {
        let (owner, ledger) = funded_ledger();
        assert!(matches!(
            new_transfer(&owner, "not-an-address", 10, &ledger),
            Err(ChainError::InvalidAddress(_))
        ));
        assert!(matches!(
            new_transfer(&owner, &owner.address(), 0, &ledger),
            Err(ChainError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_first_fit_selection_stops_early() {
        let (owner, mut ledger) = funded_ledger();
        for data in ["reward one", "reward two"] {
            let reward = Transaction::new_coinbase(&owner.address(), data).unwrap();
            ledger.append_block(vec![reward]).unwrap();
        }

        let scan = ChainScan::new(&ledger);
        assert_eq!(scan.balance(&owner.pub_key_hash()).unwrap(), 300);

        let (accumulated, selected) = scan.spendable_outputs(&owner.pub_key_hash(), 150).unwrap();
        assert_eq!(accumulated, 200);
        assert_eq!(selected.values().map(Vec::len).sum::<usize>(), 2);

        let (accumulated, selected) = scan.spendable_outputs(&owner.pub_key_hash(), 0).unwrap();
        assert_eq!(accumulated, 0);
        assert!(selected.is_empty());
    }

    #[test]
    fn test_spent_outputs_are_not_selected_again() {
        let (owner, mut ledger) = funded_ledger();
        let recipient = KeyPair::generate().unwrap();

        let first = new_transfer(&owner, &recipient.address(), 40, &ledger).unwrap();
        let first_id = first.hash_str();
        ledger.append_block(vec![first]).unwrap();

        let (_, selected) = ChainScan::new(&ledger)
            .spendable_outputs(&owner.pub_key_hash(), 60)
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected.get(&first_id), Some(&vec![1]));

        let second = new_transfer(&owner, &recipient.address(), 60, &ledger).unwrap();
        ledger.append_block(vec![second]).unwrap();

        let scan = ChainScan::new(&ledger);
        assert_eq!(scan.balance(&owner.pub_key_hash()).unwrap(), 0);
        assert_eq!(scan.balance(&recipient.pub_key_hash()).unwrap(), 100);
        assert!(matches!(
            new_transfer(&owner, &recipient.address(), 1, &ledger),
            Err(ChainError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn test_self_transfer_preserves_balance() {
        let (owner, mut ledger) = funded_ledger();
        let tx = new_transfer(&owner, &owner.address(), 25, &ledger).unwrap();
        ledger.append_block(vec![tx]).unwrap();

        let scan = ChainScan::new(&ledger);
        assert_eq!(scan.balance(&owner.pub_key_hash()).unwrap(), 100);
        assert_eq!(scan.unspent_outputs(&owner.pub_key_hash()).unwrap().len(), 2);
    }
}
