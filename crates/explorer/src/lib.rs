//! Read-only ledger explorer for hashchain reports.
//!
//! Explorers supply block metadata from an external ledger. Nothing here
//! feeds back into local chain validity.
//!
//! # Example
//!
//! ```rust,no_run
//! use hashchain_explorer::{average_transactions, EtherscanClient};
//!
//! # async fn run() -> hashchain_explorer::Result<()> {
//! let client = EtherscanClient::new("YOUR_API_KEY")?;
//! let report = average_transactions(&client, 5).await?;
//! println!("block {}: {:.2} tx/block", report.latest.block_number, report.average());
//! # Ok(())
//! # }
//! ```

pub mod etherscan;
pub mod report;
pub mod types;

use async_trait::async_trait;

// Re-export commonly used types
pub use etherscan::{EtherscanClient, DEFAULT_BASE_URL};
pub use report::{average_transactions, TransactionAverage};
pub use types::{parse_quantity, quantity_tag, BlockInfo, ExplorerError, Result};

/// Source of block metadata for an external ledger.
#[async_trait]
pub trait LedgerExplorer: Send + Sync {
    /// Number of the newest block.
    async fn latest_block_number(&self) -> Result<u64>;

    /// Block by number, or `None` if the explorer has nothing for it.
    async fn block(&self, number: u64) -> Result<Option<BlockInfo>>;
}
