//! Hashing demo command.

use super::section;
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use hashchain_core::{avalanche, find_prefix_collision, HashAlgorithm};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DEFAULT_INPUT: &str = "Hello, world!";
const DEFAULT_BASE: &str = "student_test";

#[derive(Args)]
pub struct HashArgs {
    /// Text to digest with every algorithm
    #[arg(short, long, default_value = DEFAULT_INPUT)]
    input: String,

    /// Seed for the avalanche sample string
    #[arg(long)]
    seed: Option<u64>,

    /// Base string for the prefix collision search
    #[arg(long, default_value = DEFAULT_BASE)]
    base: String,

    /// Hex symbols that must match for a collision
    #[arg(short, long, default_value_t = 4)]
    prefix: usize,

    /// Give up the collision search after this many inputs
    #[arg(long, default_value_t = 1_000_000)]
    max_attempts: u64,
}

impl Default for HashArgs {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT.to_string(),
            seed: None,
            base: DEFAULT_BASE.to_string(),
            prefix: 4,
            max_attempts: 1_000_000,
        }
    }
}

pub fn run(args: HashArgs) -> Result<()> {
    if args.prefix == 0 || args.prefix > 64 {
        bail!("prefix must be between 1 and 64 hex symbols");
    }

    section("Digest algorithms");
    println!("  Input: {:?}", args.input);
    for algorithm in [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Blake3,
    ] {
        let digest = algorithm.digest(args.input.as_bytes()).to_hex();
        println!(
            "  {:<9} {} {}",
            algorithm.name(),
            digest.bright_yellow(),
            format!("({} hex symbols)", digest.len()).bright_black()
        );
    }

    section("Avalanche effect");
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let original: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let mut modified = original[..original.len() - 1].to_string();
    modified.push(if original.ends_with('A') { 'B' } else { 'A' });

    let first = HashAlgorithm::Sha256.digest(original.as_bytes());
    let second = HashAlgorithm::Sha256.digest(modified.as_bytes());
    let bits = avalanche(&first, &second);

    println!("  {}  {}", original, first.to_hex().bright_yellow());
    println!("  {}  {}", modified, second.to_hex().bright_yellow());
    println!(
        "  Differing bits: {} of 256 ({:.2}%)",
        bits.to_string().bright_cyan(),
        f64::from(bits) / 256.0 * 100.0
    );

    section(&format!("Prefix collision ({} hex symbols)", args.prefix));
    match find_prefix_collision(
        &args.base,
        args.prefix,
        HashAlgorithm::Sha256,
        args.max_attempts,
    ) {
        Some(found) => {
            println!("  Found after {} attempts", found.attempts.to_string().bright_cyan());
            println!("  {:?} and {:?}", found.first, found.second);
            println!("  Shared prefix: {}...", found.prefix.bright_yellow());
        }
        None => println!(
            "  {}",
            format!("No collision within {} attempts", args.max_attempts).bright_red()
        ),
    }

    Ok(())
}
