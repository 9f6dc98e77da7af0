//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;
use colored::{ColoredString, Colorize};

mod explore;
mod hash;
mod merkle;
mod pos;
mod pow;
mod sign;

#[derive(Subcommand)]
pub enum Commands {
    /// Mine a proof-of-work chain, tamper with it and repair it
    Pow(pow::PowArgs),
    /// Build a proof-of-stake chain and measure validator selection
    Pos(pos::PosArgs),
    /// Merkle root and inclusion proofs over sample transfers
    Merkle(merkle::MerkleArgs),
    /// Digest comparison, avalanche effect and prefix collisions
    Hash(hash::HashArgs),
    /// Sign a document and check forged variants
    Sign(sign::SignArgs),
    /// Average transactions per block on a public ledger
    Explore(explore::ExploreArgs),
    /// Run every offline demo with default settings
    Demo,
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Pow(args) => pow::run(args),
        Commands::Pos(args) => pos::run(args),
        Commands::Merkle(args) => merkle::run(args),
        Commands::Hash(args) => hash::run(args),
        Commands::Sign(args) => sign::run(args),
        Commands::Explore(args) => explore::run(args),
        Commands::Demo => {
            pow::run(pow::PowArgs::default())?;
            pos::run(pos::PosArgs::default())?;
            hash::run(hash::HashArgs::default())?;
            sign::run(sign::SignArgs::default())?;
            merkle::run(merkle::MerkleArgs::default())
        }
    }
}

fn section(title: &str) {
    println!();
    println!("{}", title.bold().cyan());
    println!();
}

fn verdict(ok: bool) -> ColoredString {
    if ok {
        "valid".green().bold()
    } else {
        "invalid".red().bold()
    }
}
