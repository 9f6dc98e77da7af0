//! Blocks and the seals that distinguish proof-of-work from proof-of-stake.

use crate::hash::{Hash, HashAlgorithm};
use crate::merkle::{self, MerkleTree};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Protocol-specific block field mixed into the block hash.
pub trait Seal:
    Clone
    + Default
    + fmt::Debug
    + fmt::Display
    + PartialEq
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
{
}

/// Proof-of-work counter, varied during mining.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Nonce(pub u64);

impl Seal for Nonce {}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the validator that sealed a proof-of-stake block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorId(pub String);

impl Seal for ValidatorId {}

impl ValidatorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ValidatorId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A proof-of-work block.
pub type PowBlock = Block<Nonce>;
/// A proof-of-stake block.
pub type PosBlock = Block<ValidatorId>;

/// A block in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block<S> {
    /// Block height (0 for genesis).
    pub index: u64,
    /// Creation time. Only meaningful as hash input.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary structured data.
    pub payload: Value,
    /// Hash of the previous block, `Hash::ZERO` for genesis.
    pub prev_hash: Hash,
    /// Nonce or validator id.
    pub seal: S,
    /// Digest over all of the above.
    pub hash: Hash,
}

impl<S: Seal> Block<S> {
    /// Create a block stamped with the current time and hash it.
    pub fn new(
        index: u64,
        prev_hash: Hash,
        payload: Value,
        seal: S,
        algorithm: HashAlgorithm,
    ) -> Self {
        Self::with_timestamp(index, Utc::now(), payload, prev_hash, seal, algorithm)
    }

    /// Create a block with an explicit timestamp and hash it.
    pub fn with_timestamp(
        index: u64,
        timestamp: DateTime<Utc>,
        payload: Value,
        prev_hash: Hash,
        seal: S,
        algorithm: HashAlgorithm,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            payload,
            prev_hash,
            seal,
            hash: Hash::ZERO,
        };
        block.rehash(algorithm);
        block
    }

    /// Create the genesis block.
    pub fn genesis(payload: Value, seal: S, algorithm: HashAlgorithm) -> Self {
        Self::new(0, Hash::ZERO, payload, seal, algorithm)
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.prev_hash == Hash::ZERO
    }

    /// Timestamp as hashed: RFC 3339, nanosecond precision, `Z` suffix.
    /// Every stored digit is covered, so any timestamp edit changes the hash.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }

    /// Hasher over every field except the seal.
    pub fn seal_hasher(&self, algorithm: HashAlgorithm) -> SealHasher {
        // `Value` objects serialize with sorted keys, so equal payloads
        // encode identically.
        let payload = serde_json::to_string(&self.payload).expect("serialization should not fail");
        let preimage = (self.index, self.timestamp_string(), payload, self.prev_hash);
        let prefix = bincode::serialize(&preimage).expect("serialization should not fail");
        SealHasher { prefix, algorithm }
    }

    /// Recompute the hash from the current field values.
    pub fn calculate_hash(&self, algorithm: HashAlgorithm) -> Hash {
        self.seal_hasher(algorithm).hash(&self.seal)
    }

    /// Store the recomputed hash.
    pub fn rehash(&mut self, algorithm: HashAlgorithm) {
        self.hash = self.calculate_hash(algorithm);
    }

    /// Whether the stored hash matches the current fields.
    pub fn has_valid_hash(&self, algorithm: HashAlgorithm) -> bool {
        self.hash == self.calculate_hash(algorithm)
    }

    /// Verify the merkle root embedded by [`merkle_payload`].
    ///
    /// Returns false if the payload does not carry a root and record list.
    pub fn verify_merkle_root(&self, algorithm: HashAlgorithm) -> bool {
        let (Some(root), Some(Value::Array(records))) = (
            self.payload.get("merkle_root").and_then(Value::as_str),
            self.payload.get("transactions"),
        ) else {
            return false;
        };
        let Ok(expected) = Hash::from_hex(root) else {
            return false;
        };
        matches!(
            MerkleTree::from_records(records, algorithm),
            Ok(tree) if tree.root() == expected
        )
    }
}

/// Hashes candidate seals against a fixed block body.
///
/// Mining varies only the seal, so the body is encoded once.
#[derive(Debug, Clone)]
pub struct SealHasher {
    prefix: Vec<u8>,
    algorithm: HashAlgorithm,
}

impl SealHasher {
    pub fn hash<S: Serialize>(&self, seal: &S) -> Hash {
        let encoded = bincode::serialize(seal).expect("serialization should not fail");
        self.algorithm.digest_concat(&[&self.prefix, &encoded])
    }
}

/// Payload carrying a list of records and their merkle root.
///
/// The root is computed over the records as embedded JSON values, so
/// [`Block::verify_merkle_root`] can recompute it from the payload alone.
pub fn merkle_payload<T: Serialize>(
    records: &[T],
    algorithm: HashAlgorithm,
) -> merkle::Result<Value> {
    let values = records
        .iter()
        .map(serde_json::to_value)
        .collect::<serde_json::Result<Vec<_>>>()?;
    let root = MerkleTree::from_records(&values, algorithm)?.root();
    Ok(json!({
        "merkle_root": root.to_hex(),
        "transactions": values,
    }))
}
