//! Records that are hashed into merkle trees and block payloads.

use crate::hash::{Hash, HashAlgorithm};
use serde::{Deserialize, Serialize};

/// Canonical byte encoding of a record.
///
/// Struct fields are emitted in declaration order and `serde_json::Value`
/// objects in sorted key order, so logically equal records always encode to
/// the same bytes.
pub fn canonical_bytes<T: Serialize + ?Sized>(record: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(record)
}

/// Digest of a record's canonical encoding.
pub fn record_digest<T: Serialize + ?Sized>(
    record: &T,
    algorithm: HashAlgorithm,
) -> serde_json::Result<Hash> {
    Ok(algorithm.digest(&canonical_bytes(record)?))
}

/// A value transfer between two named parties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    /// Sender name.
    pub from: String,
    /// Recipient name.
    pub to: String,
    /// Amount moved.
    pub amount: u64,
}

impl Transfer {
    /// Create a new transfer.
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    /// Get the transfer hash with the default algorithm.
    pub fn hash(&self) -> Hash {
        self.hash_with(HashAlgorithm::default())
    }

    /// Get the transfer hash with the given algorithm.
    pub fn hash_with(&self, algorithm: HashAlgorithm) -> Hash {
        // A struct of strings and integers always serializes.
        let encoded = canonical_bytes(self).expect("serialization should not fail");
        algorithm.digest(&encoded)
    }

    /// Same transfer with a different amount.
    pub fn with_amount(&self, amount: u64) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }
}
