//! Aggregate reports over recent explorer blocks.

use crate::types::{BlockInfo, ExplorerError, Result};
use crate::LedgerExplorer;
use serde::Serialize;

/// Mean transaction count over a window of recent blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionAverage {
    /// The newest block in the window.
    pub latest: BlockInfo,
    /// Blocks requested, the latest included.
    pub sampled: usize,
    /// Blocks the explorer returned nothing for; they count as empty.
    pub missing: usize,
    pub total_transactions: usize,
}

impl TransactionAverage {
    pub fn average(&self) -> f64 {
        self.total_transactions as f64 / self.sampled as f64
    }
}

/// Average the transaction count of the latest block and the `window - 1`
/// blocks before it.
///
/// The window stops early at block 0.
pub async fn average_transactions<E>(explorer: &E, window: usize) -> Result<TransactionAverage>
where
    E: LedgerExplorer + ?Sized,
{
    if window == 0 {
        return Err(ExplorerError::EmptyWindow);
    }

    let number = explorer.latest_block_number().await?;
    let latest = explorer
        .block(number)
        .await?
        .ok_or_else(|| ExplorerError::MissingResult {
            action: format!("block {number}"),
        })?;

    let mut total_transactions = latest.transaction_count;
    let mut sampled = 1;
    let mut missing = 0;

    for back in 1..window as u64 {
        let Some(number) = number.checked_sub(back) else {
            break;
        };
        sampled += 1;
        match explorer.block(number).await? {
            Some(block) => total_transactions += block.transaction_count,
            None => {
                tracing::warn!(number, "block not returned by explorer");
                missing += 1;
            }
        }
    }

    tracing::debug!(latest = number, sampled, total_transactions, "window sampled");

    Ok(TransactionAverage {
        latest,
        sampled,
        missing,
        total_transactions,
    })
}
