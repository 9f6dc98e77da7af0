//! Proof-of-stake demo command.

use super::{section, verdict};
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use hashchain_chain::{ChainConfig, PosChain};
use hashchain_consensus::{PosConfig, Validator};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Args)]
pub struct PosArgs {
    /// Validators as NAME=STAKE (default: Alice=5 Bob=10 Charlie=1)
    #[arg(short, long = "validator", value_parser = parse_validator)]
    validators: Vec<Validator>,

    /// Blocks added before the tamper check
    #[arg(short, long, default_value_t = 5)]
    blocks: u64,

    /// Blocks added for the selection frequency test
    #[arg(short, long, default_value_t = 50)]
    rounds: usize,

    /// Extra validator draws without adding blocks
    #[arg(long, default_value_t = 10_000)]
    draws: usize,

    /// Seed for reproducible selection
    #[arg(long)]
    seed: Option<u64>,
}

impl Default for PosArgs {
    fn default() -> Self {
        Self {
            validators: Vec::new(),
            blocks: 5,
            rounds: 50,
            draws: 10_000,
            seed: None,
        }
    }
}

fn parse_validator(s: &str) -> std::result::Result<Validator, String> {
    let (name, stake) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=STAKE, got {s:?}"))?;
    let stake = stake
        .parse::<f64>()
        .map_err(|e| format!("invalid stake for {name}: {e}"))?;
    Ok(Validator::new(name, stake))
}

pub fn run(args: PosArgs) -> Result<()> {
    section("Proof of Stake");

    let validators = if args.validators.is_empty() {
        vec![
            Validator::new("Alice", 5.0),
            Validator::new("Bob", 10.0),
            Validator::new("Charlie", 1.0),
        ]
    } else {
        args.validators
    };
    if args.blocks < 3 {
        bail!("need at least 3 blocks to stage the tamper check");
    }

    let mut pos = PosConfig::new(validators);
    pos.seed = args.seed;
    let mut chain =
        PosChain::from_pos_config(pos, ChainConfig::default()).context("Failed to create chain")?;

    let total = chain.consensus().total_stake();
    for validator in chain.validators() {
        println!(
            "  {} stake {} ({:.2}%)",
            validator.name.bright_yellow(),
            validator.stake,
            validator.stake / total * 100.0
        );
    }
    println!();

    for i in 1..=args.blocks {
        let added = chain
            .add_block(json!({"tx": format!("tx{i}"), "amount": i}))
            .context("Failed to add block")?;
        println!(
            "  {} validated by {} (stake {})",
            format!("#{}", added.block.index).bright_black(),
            added.outcome.name.bright_yellow(),
            added.outcome.stake
        );
    }

    println!();
    println!("  Chain is {}", verdict(chain.is_valid()));

    section("Tampering block 3");
    let original = chain.get(3).context("Block 3 missing")?.payload.clone();
    chain.block_mut(3).context("Block 3 missing")?.payload = json!("Hacked!");
    match chain.validate() {
        Ok(()) => println!("  Chain is {}", verdict(true)),
        Err(e) => println!("  Chain is {}: {}", verdict(false), e.to_string().bright_black()),
    }

    let algorithm = chain.algorithm();
    let block = chain.block_mut(3).context("Block 3 missing")?;
    block.payload = original;
    block.rehash(algorithm);
    println!("  Restored and rehashed: chain is {}", verdict(chain.is_valid()));

    section(&format!("Selection frequency ({} blocks)", args.rounds));
    let mut wins: BTreeMap<String, usize> = chain
        .validators()
        .iter()
        .map(|v| (v.name.clone(), 0))
        .collect();
    for i in 0..args.rounds {
        let added = chain
            .add_block(json!({"test": i}))
            .context("Failed to add block")?;
        *wins.entry(added.outcome.name).or_default() += 1;
    }
    for validator in chain.validators() {
        let count = wins.get(&validator.name).copied().unwrap_or_default();
        print_share(&validator.name, count, args.rounds, validator.stake / total);
    }

    if args.draws > 0 {
        section(&format!("Selection frequency ({} draws)", args.draws));
        let counts = chain.selection_frequencies(args.draws)?;
        for ((name, count), validator) in counts.iter().zip(chain.validators()) {
            print_share(name, *count, args.draws, validator.stake / total);
        }
    }

    println!();
    println!("  Chain of {} blocks is {}", chain.len(), verdict(chain.is_valid()));

    Ok(())
}

fn print_share(name: &str, count: usize, rounds: usize, expected: f64) {
    let observed = if rounds == 0 {
        0.0
    } else {
        count as f64 / rounds as f64
    };
    println!(
        "  {:<10} {:>6} wins  {:>6.2}%  {}",
        name.bright_yellow(),
        count,
        observed * 100.0,
        format!("(expected {:.2}%)", expected * 100.0).bright_black()
    );
}
