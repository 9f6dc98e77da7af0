//! Public ledger explorer command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use hashchain_explorer::{average_transactions, EtherscanClient, DEFAULT_BASE_URL};

#[derive(Args)]
pub struct ExploreArgs {
    /// Etherscan API key
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Number of recent blocks to average over
    #[arg(short, long, default_value_t = 5)]
    window: usize,

    /// Explorer endpoint
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

pub fn run(args: ExploreArgs) -> Result<()> {
    let client = EtherscanClient::with_base_url(args.base_url, args.api_key)
        .context("Failed to create explorer client")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let report = runtime
        .block_on(average_transactions(&client, args.window))
        .context("Explorer request failed")?;

    let latest = &report.latest;
    println!();
    println!("{}", "Latest Block:".bold().cyan());
    println!();
    println!("  Number:      {}", latest.block_number.to_string().bright_cyan());
    println!("  Time:        {}", latest.timestamp.to_rfc3339());
    println!("  Tx count:    {}", latest.transaction_count);
    println!("  Hash:        {}", latest.block_hash.bright_yellow());
    println!("  Parent hash: {}", latest.parent_hash.bright_black());
    println!();
    println!(
        "  Average tx per block (last {} blocks): {}",
        report.sampled,
        format!("{:.2}", report.average()).bright_green().bold()
    );
    if report.missing > 0 {
        println!(
            "  {}",
            format!("{} blocks were not returned and counted as empty", report.missing)
                .bright_black()
        );
    }
    println!();

    Ok(())
}
