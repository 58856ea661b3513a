//! Cryptographic primitives for utxochain
//!
//! Key pairs are secp256k1. Public keys travel in transactions as the raw 64-byte `x || y`
//! form, signatures as the 64-byte compact `r || s` form. Ownership is expressed through a
//! 20-byte public key hash, and addresses are its Base58Check encoding.

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, SECRET_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Address version byte prepended before the checksum is taken.
pub const ADDRESS_VERSION: u8 = 0x00;
/// Number of trailing checksum bytes in a decoded address.
pub const CHECKSUM_LEN: usize = 4;
/// Length of a RIPEMD-160 public key hash.
pub const PUB_KEY_HASH_LEN: usize = 20;
/// Length of a raw `x || y` public key.
pub const RAW_PUBLIC_KEY_LEN: usize = UNCOMPRESSED_PUBLIC_KEY_SIZE - 1;

const UNCOMPRESSED_TAG: u8 = 0x04;
const SCALAR_LEN: usize = COMPACT_SIGNATURE_SIZE / 2;

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, ChainError> {
        let secret_key = SecretKey::new(&mut OsRng);
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.secret_key.secret_bytes()
    }

    /// The public key as the 64-byte concatenation of its affine coordinates.
    pub fn public_key_raw(&self) -> Vec<u8> {
        self.public_key.serialize_uncompressed()[1..].to_vec()
    }

    pub fn pub_key_hash(&self) -> Vec<u8> {
        hash_pub_key(&self.public_key_raw())
    }

    pub fn address(&self) -> String {
        address_from_pub_key_hash(&self.pub_key_hash())
    }

    /// Signs a 32-byte digest as-is and returns the compact `r || s` signature.
    pub fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>, ChainError> {
        let message = Message::from_digest_slice(digest)
            .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))?;

        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }
}

/// Left-pads a big-endian integer to `width` bytes. `None` if it does not fit.
fn left_pad(bytes: &[u8], width: usize) -> Option<Vec<u8>> {
    if bytes.len() > width {
        return None;
    }
    let mut padded = vec![0u8; width - bytes.len()];
    padded.extend_from_slice(bytes);
    Some(padded)
}

/// Verifies a signature over a 32-byte digest.
///
/// The signature is split into two equal halves `(r, s)` and the public key into two equal
/// halves `(x, y)`. Malformed inputs verify as `false` rather than erroring.
pub fn verify_digest(public_key_raw: &[u8], digest: &[u8], signature: &[u8]) -> bool {
    if signature.is_empty() || signature.len() % 2 != 0 {
        return false;
    }
    if public_key_raw.is_empty() || public_key_raw.len() % 2 != 0 {
        return false;
    }

    let (r, s) = signature.split_at(signature.len() / 2);
    let (x, y) = public_key_raw.split_at(public_key_raw.len() / 2);

    let (Some(r), Some(s), Some(x), Some(y)) = (
        left_pad(r, SCALAR_LEN),
        left_pad(s, SCALAR_LEN),
        left_pad(x, SCALAR_LEN),
        left_pad(y, SCALAR_LEN),
    ) else {
        return false;
    };

    let mut compact = r;
    compact.extend_from_slice(&s);
    let mut point = Vec::with_capacity(UNCOMPRESSED_PUBLIC_KEY_SIZE);
    point.push(UNCOMPRESSED_TAG);
    point.extend_from_slice(&x);
    point.extend_from_slice(&y);

    let Ok(public_key) = PublicKey::from_slice(&point) else {
        return false;
    };
    let Ok(signature) = Signature::from_compact(&compact) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}

/// RIPEMD-160 of the SHA-256 of a public key.
pub fn hash_pub_key(public_key: &[u8]) -> Vec<u8> {
    let sha = Sha256::digest(public_key);
    Ripemd160::digest(sha).to_vec()
}

/// First four bytes of a double SHA-256.
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let first = Sha256::digest(payload);
    let second = Sha256::digest(first);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&second[..CHECKSUM_LEN]);
    out
}

pub fn address_from_pub_key_hash(pub_key_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + pub_key_hash.len() + CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pub_key_hash);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    bs58::encode(payload).into_string()
}

/// Recovers the public key hash from a Base58Check address, rejecting bad checksums.
pub fn pub_key_hash_from_address(address: &str) -> Result<Vec<u8>, ChainError> {
    let decoded = bs58::decode(address.trim())
        .into_vec()
        .map_err(|e| ChainError::InvalidAddress(format!("{}: {}", address, e)))?;

    if decoded.len() != 1 + PUB_KEY_HASH_LEN + CHECKSUM_LEN {
        return Err(ChainError::InvalidAddress(format!(
            "{}: decoded length {} (expected {})",
            address,
            decoded.len(),
            1 + PUB_KEY_HASH_LEN + CHECKSUM_LEN
        )));
    }

    let (payload, actual) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    if checksum(payload) != actual {
        return Err(ChainError::InvalidAddress(format!(
            "{}: checksum mismatch",
            address
        )));
    }

    Ok(payload[1..].to_vec())
}

pub fn validate_address(address: &str) -> bool {
    pub_key_hash_from_address(address).is_ok()
}
