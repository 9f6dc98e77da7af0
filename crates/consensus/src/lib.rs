//! Block acceptance protocols for hashchain.
//!
//! This crate provides:
//! - The [`Consensus`] capability the chain is generic over
//! - Proof of Work: a nonce miner with pluggable acceptance predicates and
//!   an optional parallel search
//! - Proof of Stake: stake-weighted validator selection
//! - Chain validation rules (linkage, index, hash, acceptance)
//!
//! # Example
//!
//! ```rust,no_run
//! use hashchain_consensus::{Consensus, PowConfig, ProofOfWork};
//! use hashchain_core::{HashAlgorithm, Nonce, PowBlock};
//! use serde_json::json;
//!
//! let algorithm = HashAlgorithm::Sha256;
//! let mut pow = ProofOfWork::new(PowConfig::new(3)).unwrap();
//! let genesis = pow.genesis(algorithm);
//!
//! let mut block = PowBlock::new(1, genesis.hash, json!({"amount": 4}), Nonce(0), algorithm);
//! let report = pow.seal(&mut block, algorithm).unwrap();
//! assert!(block.hash.to_hex().starts_with("000"));
//! println!("mined after {} iterations", report.iterations);
//! ```

pub mod engine;
pub mod pos;
pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use engine::{Consensus, ConsensusError};
pub use pos::{PosConfig, ProofOfStake, Validator, ValidatorSelector, GENESIS_VALIDATOR};
pub use pow::{
    AcceptancePredicate, LeadingZeros, Miner, MinerConfig, MiningError, MiningReport, PowConfig,
    ProofOfWork, SymbolAt,
};
pub use validator::{BlockValidator, ValidationError};
