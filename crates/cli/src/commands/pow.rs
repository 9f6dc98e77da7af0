//! Proof-of-work demo command.

use super::{section, verdict};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use hashchain_chain::{ChainConfig, PowChain};
use hashchain_consensus::{AcceptancePredicate, MinerConfig, MiningReport, PowConfig, SymbolAt};
use hashchain_core::HashAlgorithm;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_DIFFICULTY: usize = 3;

#[derive(Args)]
pub struct PowArgs {
    /// Required leading zero hex symbols
    #[arg(short, long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Worker threads for the nonce search
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Nonces each worker scans per round
    #[arg(long, default_value_t = 4096)]
    batch_size: u64,

    /// Give up on a block after this many hashes
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Give up on a block after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Digest algorithm (sha256, sha3-256, blake3)
    #[arg(short, long, default_value_t = HashAlgorithm::Sha256)]
    algorithm: HashAlgorithm,
}

impl Default for PowArgs {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            workers: 1,
            batch_size: 4096,
            max_iterations: None,
            timeout_secs: None,
            algorithm: HashAlgorithm::Sha256,
        }
    }
}

fn transfers() -> [Value; 3] {
    [
        json!({"amount": 4, "from": "A", "to": "B"}),
        json!({"amount": 10, "from": "C", "to": "D"}),
        json!({"amount": 2, "from": "E", "to": "F"}),
    ]
}

pub fn run(args: PowArgs) -> Result<()> {
    section("Proof of Work");

    let pow = PowConfig {
        difficulty: args.difficulty,
        miner: MinerConfig {
            workers: args.workers,
            batch_size: args.batch_size,
            max_iterations: args.max_iterations,
            deadline: args.timeout_secs.map(Duration::from_secs),
        },
    };
    let mut chain = PowChain::from_pow_config(
        pow,
        ChainConfig {
            algorithm: args.algorithm,
        },
    )
    .context("Failed to create chain")?;

    println!(
        "  Difficulty: {}  Workers: {}  Algorithm: {}",
        args.difficulty.to_string().bright_cyan(),
        args.workers.to_string().bright_cyan(),
        args.algorithm.to_string().bright_cyan()
    );
    println!("  Genesis: {}", chain.genesis().hash.to_hex().bright_yellow());
    println!();

    for payload in transfers() {
        let added = chain.add_block(payload).context("Failed to mine block")?;
        print_mined(added.block.index, &added.outcome);
    }

    println!();
    println!("  Chain is {}", verdict(chain.is_valid()));

    // Tamper with block 1 and show validation catching it.
    section("Tampering block 1");
    let original = chain.get(1).context("Block 1 missing")?.payload.clone();
    chain.block_mut(1).context("Block 1 missing")?.payload = json!("Hacked!");
    match chain.validate() {
        Ok(()) => println!("  Chain is {}", verdict(true)),
        Err(e) => println!("  Chain is {}: {}", verdict(false), e.to_string().bright_black()),
    }

    let algorithm = chain.algorithm();
    let block = chain.block_mut(1).context("Block 1 missing")?;
    block.payload = original;
    block.rehash(algorithm);
    println!("  Restored and rehashed: chain is {}", verdict(chain.is_valid()));

    section("Alternative mining");
    let predicate = SymbolAt::THIRD_IS_THREE;
    println!("  Predicate: {}", predicate.describe());
    let added = chain
        .add_block_with(json!({"amount": 99}), &predicate)
        .context("Failed to mine block")?;
    print_mined(added.block.index, &added.outcome);
    println!(
        "  Against difficulty {}: chain is {}",
        chain.difficulty(),
        verdict(chain.is_valid())
    );

    Ok(())
}

fn print_mined(index: u64, report: &MiningReport) {
    println!(
        "  {} {} {}",
        format!("#{}", index).bright_black(),
        report.hash.to_hex().bright_yellow(),
        format!(
            "(nonce {}, {} iterations, {} hashes, {:.2?})",
            report.nonce, report.iterations, report.hashes_computed, report.elapsed
        )
        .bright_black()
    );
}
