//! Proof of Stake: stake-weighted random validator selection.
//!
//! A validator holding stake `s` out of a total `T` is chosen with
//! probability `s / T`. There is no puzzle: once a validator is picked the
//! block is hashed exactly once.

use crate::engine::{Consensus, ConsensusError, Result};
use crate::validator::ValidationError;
use hashchain_core::{Block, HashAlgorithm, PosBlock, ValidatorId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

/// Seal of the genesis block, which no validator produced.
pub const GENESIS_VALIDATOR: &str = "genesis";

/// A staking validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    pub name: String,
    pub stake: f64,
}

impl Validator {
    pub fn new(name: impl Into<String>, stake: f64) -> Self {
        Self {
            name: name.into(),
            stake,
        }
    }

    pub fn id(&self) -> ValidatorId {
        ValidatorId(self.name.clone())
    }
}

/// Stake-weighted selection.
pub struct ValidatorSelector;

impl ValidatorSelector {
    /// Sum of all stakes.
    pub fn total_stake(validators: &[Validator]) -> f64 {
        validators.iter().map(|v| v.stake).sum()
    }

    /// Pick a validator with probability proportional to its stake.
    ///
    /// Draws `r` uniformly from `[0, total)` and walks the validators in
    /// order, subtracting each stake; the first validator that drives the
    /// accumulator below zero wins. If rounding leaves the accumulator
    /// non-negative after the last validator, the last validator is chosen.
    pub fn choose<'a, R: Rng + ?Sized>(
        validators: &'a [Validator],
        rng: &mut R,
    ) -> Result<&'a Validator> {
        let total = Self::total_stake(validators);
        let Some(last) = validators.last() else {
            return Err(ConsensusError::EmptyValidatorSet);
        };
        if !(total > 0.0 && total.is_finite()) {
            return Err(ConsensusError::EmptyValidatorSet);
        }

        let mut acc = rng.gen::<f64>() * total;
        for validator in validators {
            acc -= validator.stake;
            if acc < 0.0 {
                return Ok(validator);
            }
        }

        Ok(last)
    }
}

/// Proof of Stake configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PosConfig {
    /// Fixed validator set, walked in this order during selection.
    pub validators: Vec<Validator>,
    /// Seed for reproducible selection; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl PosConfig {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self {
            validators,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Proof of Stake acceptance: each block is assigned one validator drawn by
/// stake.
#[derive(Debug)]
pub struct ProofOfStake {
    validators: Vec<Validator>,
    rng: StdRng,
}

impl ProofOfStake {
    /// Create the engine. Every stake must be positive and finite and
    /// names must be unique.
    pub fn new(config: PosConfig) -> Result<Self> {
        if config.validators.is_empty() {
            return Err(ConsensusError::EmptyValidatorSet);
        }

        let mut names = HashSet::new();
        for validator in &config.validators {
            if !(validator.stake > 0.0 && validator.stake.is_finite()) {
                return Err(ConsensusError::InvalidStake {
                    name: validator.name.clone(),
                });
            }
            if !names.insert(validator.name.as_str()) {
                return Err(ConsensusError::DuplicateValidator(validator.name.clone()));
            }
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            validators: config.validators,
            rng,
        })
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn total_stake(&self) -> f64 {
        ValidatorSelector::total_stake(&self.validators)
    }

    pub fn is_validator(&self, id: &ValidatorId) -> bool {
        self.validators.iter().any(|v| v.name == id.0)
    }

    /// Draw the next validator.
    pub fn choose(&mut self) -> Result<Validator> {
        ValidatorSelector::choose(&self.validators, &mut self.rng).cloned()
    }

    /// Draw `rounds` validators and count how often each was chosen,
    /// in validator order.
    pub fn selection_frequencies(&mut self, rounds: usize) -> Result<Vec<(String, usize)>> {
        let mut counts = vec![0usize; self.validators.len()];
        for _ in 0..rounds {
            let chosen = ValidatorSelector::choose(&self.validators, &mut self.rng)?;
            if let Some(i) = self.validators.iter().position(|v| v.name == chosen.name) {
                counts[i] += 1;
            }
        }
        Ok(self
            .validators
            .iter()
            .map(|v| v.name.clone())
            .zip(counts)
            .collect())
    }
}

impl Consensus for ProofOfStake {
    type Seal = ValidatorId;
    type Outcome = Validator;

    fn genesis(&self, algorithm: HashAlgorithm) -> PosBlock {
        Block::genesis(json!("Genesis PoS"), ValidatorId::from(GENESIS_VALIDATOR), algorithm)
    }

    fn seal(&mut self, candidate: &mut PosBlock, algorithm: HashAlgorithm) -> Result<Validator> {
        let validator = self.choose()?;
        candidate.seal = validator.id();
        candidate.rehash(algorithm);
        tracing::debug!(
            index = candidate.index,
            validator = %validator.name,
            stake = validator.stake,
            "validator selected"
        );
        Ok(validator)
    }

    fn verify_acceptance(&self, block: &PosBlock) -> std::result::Result<(), ValidationError> {
        if !self.is_validator(&block.seal) {
            return Err(ValidationError::UnknownValidator {
                index: block.index,
                validator: block.seal.0.clone(),
            });
        }
        Ok(())
    }
}
