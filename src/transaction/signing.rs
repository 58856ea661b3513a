/// Per-input signing and verification protocol.
///
/// Each input is signed over the id of a trimmed copy of the transaction in which only that
/// input's public key slot holds the public key hash of the output it spends. The resulting
/// digest differs per input and binds every signature to the output it consumes.
use crate::crypto::{verify_digest, KeyPair};
use crate::error::ChainError;
use crate::transaction::types::{Transaction, TxInput, TxOutput};
use std::collections::HashMap;

/// Prior transactions keyed by hex-encoded id.
pub type PriorTransactions = HashMap<String, Transaction>;

fn prior_output<'a>(
    input: &TxInput,
    prev_txs: &'a PriorTransactions,
) -> Result<&'a TxOutput, ChainError> {
    let prev_tx = prev_txs
        .get(&input.prev_tx_hex())
        .filter(|tx| !tx.id.is_empty())
        .ok_or_else(|| {
            ChainError::MissingPriorTransaction(format!(
                "transaction {} is not among the supplied priors",
                input.prev_tx_hex()
            ))
        })?;

    usize::try_from(input.out_index)
        .ok()
        .and_then(|index| prev_tx.outputs.get(index))
        .ok_or_else(|| {
            ChainError::MissingPriorTransaction(format!(
                "transaction {} has no output {}",
                input.prev_tx_hex(),
                input.out_index
            ))
        })
}

/// Resolves every input's referenced output before anything is signed or checked.
fn prior_outputs<'a>(
    tx: &Transaction,
    prev_txs: &'a PriorTransactions,
) -> Result<Vec<&'a TxOutput>, ChainError> {
    tx.inputs
        .iter()
        .map(|input| prior_output(input, prev_txs))
        .collect()
}

fn signing_digest(
    trimmed: &mut Transaction,
    index: usize,
    pub_key_hash: &[u8],
) -> Result<Vec<u8>, ChainError> {
    trimmed.inputs[index].signature.clear();
    trimmed.inputs[index].pub_key = pub_key_hash.to_vec();
    let digest = trimmed.compute_id()?;
    trimmed.inputs[index].pub_key.clear();
    Ok(digest)
}

impl Transaction {
    /// Signs every input with `key`. Coinbase transactions are left untouched.
    pub fn sign(&mut self, key: &KeyPair, prev_txs: &PriorTransactions) -> Result<(), ChainError> {
        if self.is_coinbase() {
            return Ok(());
        }

        let spent: Vec<Vec<u8>> = prior_outputs(self, prev_txs)?
            .into_iter()
            .map(|output| output.pub_key_hash.clone())
            .collect();

        let mut trimmed = self.trimmed_copy();
        for (index, pub_key_hash) in spent.iter().enumerate() {
            let digest = signing_digest(&mut trimmed, index, pub_key_hash)?;
            self.inputs[index].signature = key.sign_digest(&digest)?;
        }

        Ok(())
    }

    /// Checks every input's signature against the output it spends.
    ///
    /// Returns `Ok(false)` on any bad signature, malformed key, or a public key that does not
    /// hash to the owner of the spent output. Errors only when a prior cannot be resolved.
    pub fn verify(&self, prev_txs: &PriorTransactions) -> Result<bool, ChainError> {
        if self.is_coinbase() {
            return Ok(true);
        }

        let spent = prior_outputs(self, prev_txs)?;

        let mut trimmed = self.trimmed_copy();
        for (index, (input, output)) in self.inputs.iter().zip(spent).enumerate() {
            if !input.uses_key(&output.pub_key_hash) {
                return Ok(false);
            }

            let digest = signing_digest(&mut trimmed, index, &output.pub_key_hash)?;
            if !verify_digest(&input.pub_key, &digest, &input.signature) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
