//! Chain orchestration for hashchain.
//!
//! A [`Chain`] is generic over a [`Consensus`](hashchain_consensus::Consensus)
//! engine, so proof-of-work and proof-of-stake chains share linkage,
//! appending and validation:
//! - [`PowChain`]: blocks sealed by a nonce search against a difficulty
//! - [`PosChain`]: blocks sealed by a stake-weighted validator draw
//!
//! # Example
//!
//! ```rust,no_run
//! use hashchain_chain::Chain;
//! use serde_json::json;
//!
//! let mut chain = Chain::new_pow(3).unwrap();
//! chain.add_block(json!({"amount": 4, "from": "A", "to": "B"})).unwrap();
//! chain.add_block(json!({"amount": 10, "from": "C", "to": "D"})).unwrap();
//! assert!(chain.is_valid());
//!
//! chain.block_mut(1).unwrap().payload = json!("Hacked!");
//! assert!(!chain.is_valid());
//! ```

pub mod blockchain;

// Re-export commonly used types
pub use blockchain::{
    AddedBlock, BlockchainError, Chain, ChainConfig, ChainStats, PosChain, PowChain, Result,
};
