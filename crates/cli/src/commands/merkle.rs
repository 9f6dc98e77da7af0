//! Merkle tree demo command.

use super::{section, verdict};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use hashchain_core::{merkle_payload, HashAlgorithm, MerkleTree, Nonce, PowBlock, Transfer};

#[derive(Args, Default)]
pub struct MerkleArgs {
    /// Leaf to prove (defaults to the second transfer)
    #[arg(short, long)]
    index: Option<usize>,

    /// Digest algorithm (sha256, sha3-256, blake3)
    #[arg(short, long, default_value_t = HashAlgorithm::Sha256)]
    algorithm: HashAlgorithm,
}

fn transfers() -> Vec<Transfer> {
    vec![
        Transfer::new("Alice", "Bob", 10),
        Transfer::new("Bob", "Charlie", 5),
        Transfer::new("Charlie", "Dave", 2),
    ]
}

pub fn run(args: MerkleArgs) -> Result<()> {
    let algorithm = args.algorithm;
    let index = args.index.unwrap_or(1);
    let mut records = transfers();

    section("Merkle root in a block");
    let tree = MerkleTree::from_records(&records, algorithm)?;
    println!("  Leaves: {}  Depth: {}", tree.leaf_count(), tree.depth());
    println!("  Merkle root: {}", tree.root().to_hex().bright_yellow());

    let prev_hash = algorithm.digest(b"previous block");
    let block = PowBlock::new(
        1,
        prev_hash,
        merkle_payload(&records, algorithm)?,
        Nonce(0),
        algorithm,
    );
    println!("  Block hash:  {}", block.hash.to_hex().bright_yellow());

    records[0] = records[0].with_amount(999);
    let altered = MerkleTree::from_records(&records, algorithm)?;
    let altered_block = PowBlock::new(
        1,
        prev_hash,
        merkle_payload(&records, algorithm)?,
        Nonce(0),
        algorithm,
    );
    println!("  After changing transfer 0:");
    println!("  Merkle root: {}", altered.root().to_hex().bright_red());
    println!("  Block hash:  {}", altered_block.hash.to_hex().bright_red());

    section("Merkle proof");
    let records = transfers();
    let proof = tree
        .proof(index)
        .with_context(|| format!("No proof for leaf {index}"))?;
    let record = records.get(index).context("Leaf out of range")?;

    println!("  Proving leaf {}: {:?}", index, record);
    for step in &proof.steps {
        println!(
            "    {:<5} {}",
            format!("{:?}", step.direction).to_lowercase(),
            step.sibling.to_hex().bright_black()
        );
    }

    let tampered = record.with_amount(999);
    let foreign = Transfer::new("X", "Y", 1);
    println!("  Included record:  {}", verdict(tree.verify(record, &proof)));
    println!("  Altered record:   {}", verdict(tree.verify(&tampered, &proof)));
    println!("  Foreign record:   {}", verdict(tree.verify(&foreign, &proof)));

    Ok(())
}
