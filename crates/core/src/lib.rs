//! Core primitives for hashchain.
//!
//! This crate provides the fundamental types used throughout the chain:
//! - Hashing with a configurable digest algorithm
//! - Blocks sealed by a nonce (PoW) or a validator id (PoS)
//! - Merkle trees with inclusion proofs
//! - Canonical record encoding
//! - Ed25519 document signing

pub mod block;
pub mod crypto;
pub mod hash;
pub mod merkle;
pub mod record;

// Re-export commonly used types at the crate root
pub use block::{merkle_payload, Block, Nonce, PosBlock, PowBlock, Seal, SealHasher, ValidatorId};
pub use crypto::{sign_document, verify_document, CryptoError, Keypair, PublicKey, Signature};
pub use hash::{
    avalanche, find_prefix_collision, hash, hash_concat, Hash, HashAlgorithm, PrefixCollision, H256,
};
pub use merkle::{
    build_proof, build_root, verify_proof, Direction, MerkleError, MerkleProof, MerkleTree,
    ProofStep,
};
pub use record::{canonical_bytes, record_digest, Transfer};
