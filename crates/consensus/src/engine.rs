//! The capability shared by every block-acceptance protocol.

use crate::pow::MiningError;
use crate::validator::ValidationError;
use hashchain_core::{Block, HashAlgorithm, Seal};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during consensus operations.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("no validators with positive stake")]
    EmptyValidatorSet,

    #[error("validator {name} has a non-positive or non-finite stake")]
    InvalidStake { name: String },

    #[error("duplicate validator name: {0}")]
    DuplicateValidator(String),

    #[error("difficulty must be between 1 and 64, got {0}")]
    InvalidDifficulty(usize),

    #[error("mining failed: {0}")]
    Mining(#[from] MiningError),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// A block-acceptance protocol.
///
/// The chain is written once against this trait: it asks the protocol for a
/// genesis block, hands each new candidate to [`Consensus::seal`], and asks
/// [`Consensus::verify_acceptance`] about every stored block during
/// validation.
pub trait Consensus {
    /// Protocol field carried by each block.
    type Seal: Seal;
    /// What sealing a block produced (a mining report, a chosen validator).
    type Outcome: fmt::Debug + Clone;

    /// Build the genesis block. It is hashed once and never sealed.
    fn genesis(&self, algorithm: HashAlgorithm) -> Block<Self::Seal>;

    /// Make `candidate` acceptable, updating its seal and hash.
    fn seal(
        &mut self,
        candidate: &mut Block<Self::Seal>,
        algorithm: HashAlgorithm,
    ) -> Result<Self::Outcome>;

    /// Check that a stored non-genesis block satisfies acceptance.
    fn verify_acceptance(
        &self,
        block: &Block<Self::Seal>,
    ) -> std::result::Result<(), ValidationError>;

    /// Does this block satisfy acceptance?
    fn accepts(&self, block: &Block<Self::Seal>) -> bool {
        self.verify_acceptance(block).is_ok()
    }
}
