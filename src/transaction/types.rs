/// Transaction types for utxochain
use crate::crypto::{hash_pub_key, pub_key_hash_from_address};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Amount minted by a coinbase transaction.
pub const COINBASE_REWARD: u64 = 100;

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_OUT_INDEX: i64 = -1;

/// A value locked to the owner of a public key hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    #[serde(with = "serde_bytes")]
    pub pub_key_hash: Vec<u8>,
}

impl TxOutput {
    /// Creates an output locked to the owner of `address`.
    pub fn new(value: u64, address: &str) -> Result<Self, ChainError> {
        let mut output = TxOutput {
            value,
            pub_key_hash: Vec::new(),
        };
        output.lock(address)?;
        Ok(output)
    }

    pub fn lock(&mut self, address: &str) -> Result<(), ChainError> {
        self.pub_key_hash = pub_key_hash_from_address(address)?;
        Ok(())
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash == pub_key_hash
    }
}

/// A reference to an output of an earlier transaction, plus the proof of authority to spend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(with = "serde_bytes")]
    pub prev_tx_id: Vec<u8>,
    pub out_index: i64,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    /// Raw public key of the spender; issuance metadata for coinbase inputs.
    #[serde(with = "serde_bytes")]
    pub pub_key: Vec<u8>,
}

impl TxInput {
    pub fn new(prev_tx_id: Vec<u8>, out_index: i64, pub_key: Vec<u8>) -> Self {
        TxInput {
            prev_tx_id,
            out_index,
            signature: Vec::new(),
            pub_key,
        }
    }

    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(&self.pub_key) == pub_key_hash
    }

    pub fn prev_tx_hex(&self) -> String {
        hex::encode(&self.prev_tx_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "serde_bytes")]
    pub id: Vec<u8>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Builds a transaction and assigns its content-addressed id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self, ChainError> {
        let mut tx = Transaction {
            id: Vec::new(),
            inputs,
            outputs,
        };
        tx.set_id()?;
        Ok(tx)
    }

    /// Issuance transaction paying `COINBASE_REWARD` to `to`.
    pub fn new_coinbase(to: &str, data: &str) -> Result<Self, ChainError> {
        let data = if data.is_empty() {
            format!("Coins to {}", to)
        } else {
            data.to_string()
        };

        let input = TxInput::new(Vec::new(), COINBASE_OUT_INDEX, data.into_bytes());
        let output = TxOutput::new(COINBASE_REWARD, to)?;
        Transaction::new(vec![input], vec![output])
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ChainError> {
        bincode::serialize(self).map_err(|e| {
            ChainError::InvalidTransaction(format!("Serialization failed: {}", e))
        })
    }

    /// SHA-256 of the canonical encoding with `id` treated as absent.
    pub fn compute_id(&self) -> Result<Vec<u8>, ChainError> {
        let mut copy = self.clone();
        copy.id = Vec::new();
        Ok(Sha256::digest(copy.serialize()?).to_vec())
    }

    /// The id as assigned before any input was signed.
    pub fn compute_unsigned_id(&self) -> Result<Vec<u8>, ChainError> {
        let mut copy = self.clone();
        for input in &mut copy.inputs {
            input.signature.clear();
        }
        copy.compute_id()
    }

    pub fn set_id(&mut self) -> Result<(), ChainError> {
        self.id = self.compute_id()?;
        Ok(())
    }

    pub fn hash_str(&self) -> String {
        hex::encode(&self.id)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prev_tx_id.is_empty()
            && self.inputs[0].out_index == COINBASE_OUT_INDEX
    }

    /// Copy with every input's signature and public key cleared.
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput::new(input.prev_tx_id.clone(), input.out_index, Vec::new()))
            .collect();

        Transaction {
            id: self.id.clone(),
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|out| out.value).sum()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "-- Transaction {}:", self.hash_str())?;
        for (index, input) in self.inputs.iter().enumerate() {
            writeln!(f, "    Input {}:", index)?;
            writeln!(f, "      TXID:      {}", hex::encode(&input.prev_tx_id))?;
            writeln!(f, "      Out:       {}", input.out_index)?;
            writeln!(f, "      Signature: {}", hex::encode(&input.signature))?;
            writeln!(f, "      PublicKey: {}", hex::encode(&input.pub_key))?;
        }
        for (index, output) in self.outputs.iter().enumerate() {
            writeln!(f, "    Output {}:", index)?;
            writeln!(f, "      Value:     {}", output.value)?;
            write!(f, "      Script:    {}", hex::encode(&output.pub_key_hash))?;
            if index + 1 < self.outputs.len() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
