//! Block and chain validation rules.
//!
//! Validation never mutates anything. A failed check is reported as a
//! [`ValidationError`] naming the first offending block.

use crate::engine::Consensus;
use hashchain_core::{Block, Hash, HashAlgorithm, Seal};
use thiserror::Error;

/// Reasons a chain is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("chain has no genesis block")]
    EmptyChain,

    #[error("genesis block must have index 0 and the zero prev_hash")]
    InvalidGenesis,

    #[error("block {index}: prev_hash does not match the previous block's hash")]
    BrokenLink { index: u64 },

    #[error("block height mismatch (expected {expected}, got {got})")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: u64 },

    #[error("block {index}: hash has fewer than {difficulty} leading zeros")]
    InsufficientWork { index: u64, difficulty: usize },

    #[error("block {index}: validator {validator} is not in the validator set")]
    UnknownValidator { index: u64, validator: String },
}

impl ValidationError {
    /// Index of the offending block, if the error concerns one.
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::EmptyChain => None,
            Self::InvalidGenesis => Some(0),
            Self::BrokenLink { index }
            | Self::HashMismatch { index }
            | Self::InsufficientWork { index, .. }
            | Self::UnknownValidator { index, .. } => Some(*index),
            Self::InvalidIndex { got, .. } => Some(*got),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// Genesis must sit at index 0 on the sentinel and hash correctly.
    pub fn validate_genesis<S: Seal>(block: &Block<S>, algorithm: HashAlgorithm) -> Result<()> {
        if !block.is_genesis() {
            return Err(ValidationError::InvalidGenesis);
        }
        Self::validate_block_hash(block, algorithm)
    }

    /// Stored hash must equal the hash of the block's current fields.
    pub fn validate_block_hash<S: Seal>(block: &Block<S>, algorithm: HashAlgorithm) -> Result<()> {
        if !block.has_valid_hash(algorithm) {
            return Err(ValidationError::HashMismatch { index: block.index });
        }
        Ok(())
    }

    /// Validate block extends the parent correctly.
    pub fn validate_block_extends_parent<S: Seal>(
        block: &Block<S>,
        position: u64,
        parent_hash: Hash,
    ) -> Result<()> {
        if block.prev_hash != parent_hash {
            return Err(ValidationError::BrokenLink { index: position });
        }

        if block.index != position {
            return Err(ValidationError::InvalidIndex {
                expected: position,
                got: block.index,
            });
        }

        Ok(())
    }

    /// Validate a whole chain, stopping at the first violation.
    ///
    /// For every block after genesis: linkage, index, hash, then the
    /// protocol's acceptance rule.
    pub fn validate_chain<C: Consensus>(
        blocks: &[Block<C::Seal>],
        consensus: &C,
        algorithm: HashAlgorithm,
    ) -> Result<()> {
        let genesis = blocks.first().ok_or(ValidationError::EmptyChain)?;
        Self::validate_genesis(genesis, algorithm)?;

        for (position, pair) in (1u64..).zip(blocks.windows(2)) {
            let (parent, block) = (&pair[0], &pair[1]);
            Self::validate_block_extends_parent(block, position, parent.hash)?;
            Self::validate_block_hash(block, algorithm)?;
            consensus.verify_acceptance(block)?;
        }

        Ok(())
    }
}
