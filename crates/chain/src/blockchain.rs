//! Main chain orchestration.
//!
//! A [`Chain`] owns its blocks and one consensus engine. Appending builds a
//! candidate on top of the latest block and lets the engine seal it;
//! validation replays every rule without touching the blocks.

use chrono::{DateTime, Utc};
use hashchain_consensus::{
    AcceptancePredicate, BlockValidator, Consensus, ConsensusError, MiningReport, PosConfig,
    PowConfig, ProofOfStake, ProofOfWork, ValidationError, Validator,
};
use hashchain_core::{Block, Hash, HashAlgorithm, Nonce, PowBlock};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Chain configuration shared by every protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainConfig {
    /// Digest used for block hashes.
    pub algorithm: HashAlgorithm,
}

/// A freshly appended block and what sealing it produced.
#[derive(Debug, Clone)]
pub struct AddedBlock<S, O> {
    pub block: Block<S>,
    pub outcome: O,
}

/// A proof-of-work chain.
pub type PowChain = Chain<ProofOfWork>;
/// A proof-of-stake chain.
pub type PosChain = Chain<ProofOfStake>;

/// Ordered, append-only sequence of blocks sealed by `C`.
#[derive(Debug)]
pub struct Chain<C: Consensus> {
    blocks: Vec<Block<C::Seal>>,
    consensus: C,
    config: ChainConfig,
}

impl<C: Consensus> Chain<C> {
    /// Create a chain holding only the engine's genesis block.
    pub fn with_consensus(consensus: C, config: ChainConfig) -> Self {
        let genesis = consensus.genesis(config.algorithm);
        tracing::debug!(hash = %genesis.hash, "genesis block created");
        Self {
            blocks: vec![genesis],
            consensus,
            config,
        }
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: a chain starts with its genesis block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Height of the latest block.
    pub fn height(&self) -> u64 {
        self.latest().index
    }

    pub fn blocks(&self) -> &[Block<C::Seal>] {
        &self.blocks
    }

    pub fn genesis(&self) -> &Block<C::Seal> {
        &self.blocks[0]
    }

    /// Get the latest block.
    pub fn latest(&self) -> &Block<C::Seal> {
        // The genesis block is never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Get a block by height.
    pub fn get(&self, index: u64) -> Option<&Block<C::Seal>> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    /// Mutable access to a stored block.
    ///
    /// Changing a field without calling [`Block::rehash`] is exactly the
    /// tampering that [`Chain::validate`] reports.
    pub fn block_mut(&mut self, index: u64) -> Option<&mut Block<C::Seal>> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get_mut(i))
    }

    pub fn consensus(&self) -> &C {
        &self.consensus
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.config.algorithm
    }

    /// Unsealed block on top of the latest one.
    fn candidate(&self, payload: Value) -> Block<C::Seal> {
        Block::new(
            self.blocks.len() as u64,
            self.latest().hash,
            payload,
            C::Seal::default(),
            self.config.algorithm,
        )
    }

    fn append(&mut self, block: Block<C::Seal>) {
        tracing::info!(
            index = block.index,
            seal = %block.seal,
            hash = %block.hash,
            "block appended"
        );
        self.blocks.push(block);
    }

    /// Seal a new block carrying `payload` and append it.
    pub fn add_block(&mut self, payload: Value) -> Result<AddedBlock<C::Seal, C::Outcome>> {
        let mut block = self.candidate(payload);
        let outcome = self.consensus.seal(&mut block, self.config.algorithm)?;
        self.append(block.clone());
        Ok(AddedBlock { block, outcome })
    }

    /// Check every block, stopping at the first violation.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        BlockValidator::validate_chain(&self.blocks, &self.consensus, self.config.algorithm)
            .inspect_err(|err| tracing::warn!(index = ?err.index(), "chain invalid: {err}"))
    }

    /// Whether [`Chain::validate`] passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Iterate over `(index, seal)` pairs.
    pub fn seals(&self) -> impl Iterator<Item = (u64, &C::Seal)> {
        self.blocks.iter().map(|b| (b.index, &b.seal))
    }

    /// Get chain statistics.
    pub fn stats(&self) -> ChainStats {
        let latest = self.latest();
        ChainStats {
            height: latest.index,
            latest_block_hash: latest.hash,
            latest_timestamp: latest.timestamp,
            algorithm: self.config.algorithm,
        }
    }
}

impl Chain<ProofOfWork> {
    /// Create a proof-of-work chain with the given difficulty.
    pub fn new_pow(difficulty: usize) -> Result<Self> {
        Self::from_pow_config(PowConfig::new(difficulty), ChainConfig::default())
    }

    pub fn from_pow_config(pow: PowConfig, config: ChainConfig) -> Result<Self> {
        Ok(Self::with_consensus(ProofOfWork::new(pow)?, config))
    }

    pub fn difficulty(&self) -> usize {
        self.consensus.difficulty()
    }

    /// Change the difficulty enforced by future mining and by validation.
    pub fn set_difficulty(&mut self, difficulty: usize) -> Result<()> {
        Ok(self.consensus.set_difficulty(difficulty)?)
    }

    /// Mine a block against `predicate` instead of the chain difficulty.
    ///
    /// The block is appended either way; it only validates if its hash also
    /// happens to meet the difficulty.
    pub fn add_block_with(
        &mut self,
        payload: Value,
        predicate: &dyn AcceptancePredicate,
    ) -> Result<AddedBlock<Nonce, MiningReport>> {
        let mut block: PowBlock = self.candidate(payload);
        let report = self
            .consensus
            .mine_with(&mut block, predicate, self.config.algorithm)?;
        self.append(block.clone());
        Ok(AddedBlock {
            block,
            outcome: report,
        })
    }
}

impl Chain<ProofOfStake> {
    /// Create a proof-of-stake chain over a fixed validator set.
    pub fn new_pos(validators: Vec<Validator>) -> Result<Self> {
        Self::from_pos_config(PosConfig::new(validators), ChainConfig::default())
    }

    pub fn from_pos_config(pos: PosConfig, config: ChainConfig) -> Result<Self> {
        Ok(Self::with_consensus(ProofOfStake::new(pos)?, config))
    }

    pub fn validators(&self) -> &[Validator] {
        self.consensus.validators()
    }

    /// Draw `rounds` validators without adding blocks.
    pub fn selection_frequencies(&mut self, rounds: usize) -> Result<Vec<(String, usize)>> {
        Ok(self.consensus.selection_frequencies(rounds)?)
    }
}

/// Chain statistics.
#[derive(Debug, Clone)]
pub struct ChainStats {
    /// Current chain height.
    pub height: u64,
    /// Hash of the latest block.
    pub latest_block_hash: Hash,
    /// Timestamp of the latest block.
    pub latest_timestamp: DateTime<Utc>,
    pub algorithm: HashAlgorithm,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashchain_consensus::SymbolAt;
    use serde_json::json;

    fn setup_pow() -> PowChain {
        let mut chain = Chain::new_pow(2).unwrap();
        chain.add_block(json!({"amount": 4, "from": "A", "to": "B"})).unwrap();
        chain.add_block(json!({"amount": 10, "from": "C", "to": "D"})).unwrap();
        chain.add_block(json!({"amount": 2, "from": "E", "to": "F"})).unwrap();
        chain
    }

    fn lab_validators() -> Vec<Validator> {
        vec![
            Validator::new("Alice", 5.0),
            Validator::new("Bob", 10.0),
            Validator::new("Charlie", 1.0),
        ]
    }

    #[test]
    fn test_chain_init() {
        let chain = Chain::new_pow(2).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.height(), 0);
        assert!(chain.latest().is_genesis());
        assert_eq!(chain.genesis().payload, json!("Genesis Block"));
        assert!(chain.is_valid());
    }

    #[test]
    fn test_add_block_links_to_latest() {
        let mut chain = Chain::new_pow(1).unwrap();
        let genesis_hash = chain.latest().hash;
        let added = chain.add_block(json!({"n": 1})).unwrap();

        assert_eq!(added.block.index, 1);
        assert_eq!(added.block.prev_hash, genesis_hash);
        assert_eq!(added.outcome.hash, added.block.hash);
        assert_eq!(chain.latest(), &added.block);
    }

    #[test]
    fn test_pow_chain_valid() {
        let chain = setup_pow();
        assert_eq!(chain.len(), 4);
        assert!(chain.is_valid());
        for block in &chain.blocks()[1..] {
            assert!(block.hash.to_hex().starts_with("00"));
        }
    }

    #[test]
    fn test_tamper_detected_and_repaired() {
        let mut chain = setup_pow();
        let original = chain.get(1).unwrap().payload.clone();

        chain.block_mut(1).unwrap().payload = json!("Hacked!");
        assert!(!chain.is_valid());
        assert_eq!(chain.validate(), Err(ValidationError::HashMismatch { index: 1 }));

        let algorithm = chain.algorithm();
        let block = chain.block_mut(1).unwrap();
        block.payload = original;
        block.rehash(algorithm);
        assert!(chain.is_valid());
    }

    #[test]
    fn test_raised_difficulty_invalidates() {
        let mut chain = setup_pow();
        let weakest = chain.blocks()[1..]
            .iter()
            .map(|b| b.hash.leading_zero_nibbles())
            .min()
            .unwrap();

        chain.set_difficulty(weakest + 1).unwrap();
        assert!(matches!(
            chain.validate(),
            Err(ValidationError::InsufficientWork { .. })
        ));

        chain.set_difficulty(2).unwrap();
        assert!(chain.is_valid());
    }

    #[test]
    fn test_invalid_difficulty() {
        assert!(matches!(
            Chain::new_pow(0),
            Err(BlockchainError::Consensus(ConsensusError::InvalidDifficulty(0)))
        ));
    }

    #[test]
    fn test_alternative_predicate() {
        let mut chain = Chain::new_pow(1).unwrap();
        let added = chain
            .add_block_with(json!({"amount": 99}), &SymbolAt::THIRD_IS_THREE)
            .unwrap();

        assert_eq!(added.block.hash.hex_symbol(2), Some('3'));
        assert!(added.block.has_valid_hash(chain.algorithm()));
        assert_eq!(
            chain.is_valid(),
            added.block.hash.leading_zero_nibbles() >= 1
        );
    }

    #[test]
    fn test_pos_chain() {
        let config = PosConfig::new(lab_validators()).with_seed(11);
        let mut chain = Chain::from_pos_config(config, ChainConfig::default()).unwrap();

        for i in 1..=5 {
            let added = chain.add_block(json!({"tx": format!("tx{i}"), "amount": i})).unwrap();
            assert_eq!(added.block.seal.as_str(), added.outcome.name);
        }

        assert_eq!(chain.len(), 6);
        assert_eq!(chain.genesis().payload, json!("Genesis PoS"));
        assert!(chain.is_valid());

        chain.block_mut(3).unwrap().payload = json!("Hacked!");
        assert_eq!(chain.validate(), Err(ValidationError::HashMismatch { index: 3 }));
    }

    #[test]
    fn test_pos_has_no_work_target() {
        let mut chain = Chain::new_pos(lab_validators()).unwrap();
        for i in 0..20 {
            chain.add_block(json!({"test": i})).unwrap();
        }
        // Hashes are random, so most blocks would fail any zero-prefix rule.
        assert!(chain.is_valid());
    }

    #[test]
    fn test_pos_empty_validators() {
        assert!(matches!(
            Chain::new_pos(vec![]),
            Err(BlockchainError::Consensus(ConsensusError::EmptyValidatorSet))
        ));
    }

    #[test]
    fn test_broken_link_detected() {
        let mut chain = setup_pow();
        let algorithm = chain.algorithm();
        let block = chain.block_mut(2).unwrap();
        block.prev_hash = Hash::ZERO;
        block.rehash(algorithm);
        assert_eq!(chain.validate(), Err(ValidationError::BrokenLink { index: 2 }));
    }

    #[test]
    fn test_other_algorithms() {
        for algorithm in [HashAlgorithm::Sha3_256, HashAlgorithm::Blake3] {
            let mut chain =
                Chain::from_pow_config(PowConfig::new(1), ChainConfig { algorithm }).unwrap();
            chain.add_block(json!({"algo": algorithm.name()})).unwrap();
            assert!(chain.is_valid());
            assert_eq!(chain.stats().algorithm, algorithm);
        }
    }

    #[test]
    fn test_chain_stats() {
        let chain = setup_pow();
        let stats = chain.stats();
        assert_eq!(stats.height, 3);
        assert_eq!(stats.latest_block_hash, chain.latest().hash);
    }

    #[test]
    fn test_seals() {
        let chain = setup_pow();
        let seals: Vec<_> = chain.seals().collect();
        assert_eq!(seals.len(), 4);
        assert_eq!(seals[0], (0, &Nonce(0)));
    }
}
