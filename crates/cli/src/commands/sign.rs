//! Document signing demo command.

use super::{section, verdict};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use hashchain_core::{canonical_bytes, sign_document, verify_document, Keypair, Signature};
use serde_json::json;

#[derive(Args, Default)]
pub struct SignArgs {
    /// Document to sign (defaults to a small JSON document)
    #[arg(short, long)]
    document: Option<String>,

    /// Hex-encoded Ed25519 private key (a fresh key when omitted)
    #[arg(long, env = "HASHCHAIN_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,
}

pub fn run(args: SignArgs) -> Result<()> {
    section("Document signature");

    let keypair = match &args.private_key {
        Some(hex) => Keypair::from_hex(hex).context("Invalid private key")?,
        None => Keypair::generate(),
    };
    let document = match args.document {
        Some(text) => text.into_bytes(),
        None => canonical_bytes(&json!({"id": 1, "content": "This is my document"}))?,
    };

    let signature = sign_document(&keypair, &document);
    println!("  Document:   {}", String::from_utf8_lossy(&document));
    println!("  Public key: {}", keypair.public_key().to_hex().bright_yellow());
    println!("  Signature:  {}", signature.to_hex().bright_yellow());
    println!();

    let mut altered = document.clone();
    altered.push(b'!');

    let mut forged_bytes = *signature.as_bytes();
    forged_bytes[63] ^= 0x01;
    let forged = Signature::from_bytes(forged_bytes);

    let stranger = Keypair::generate();

    let public_key = keypair.public_key();
    println!(
        "  (a) Original document:  {}",
        verdict(verify_document(&public_key, &document, &signature))
    );
    println!(
        "  (b) Altered document:   {}",
        verdict(verify_document(&public_key, &altered, &signature))
    );
    println!(
        "  (c) Forged signature:   {}",
        verdict(verify_document(&public_key, &document, &forged))
    );
    println!(
        "  (d) Someone else's key: {}",
        verdict(verify_document(&stranger.public_key(), &document, &signature))
    );

    Ok(())
}
