//! Block metadata returned by a ledger explorer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while querying an explorer.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("explorer API error: {0}")]
    Api(String),

    #[error("{action} returned no result")]
    MissingResult { action: String },

    #[error("invalid hex quantity: {0:?}")]
    InvalidQuantity(String),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("window must cover at least one block")]
    EmptyWindow,
}

pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Read-only summary of one block on an external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub transaction_count: usize,
    pub block_hash: String,
    pub parent_hash: String,
}

/// Parse a JSON-RPC hex quantity such as `"0x1b4"`.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() {
        return Err(ExplorerError::InvalidQuantity(value.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| ExplorerError::InvalidQuantity(value.to_string()))
}

/// Encode a block number as a JSON-RPC tag.
pub fn quantity_tag(number: u64) -> String {
    format!("{number:#x}")
}

/// Block object as returned by `eth_getBlockByNumber`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcBlock {
    pub number: String,
    pub timestamp: String,
    pub hash: String,
    pub parent_hash: String,
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}

impl TryFrom<RpcBlock> for BlockInfo {
    type Error = ExplorerError;

    fn try_from(block: RpcBlock) -> Result<Self> {
        let seconds = parse_quantity(&block.timestamp)?;
        let timestamp = i64::try_from(seconds)
            .ok()
            .and_then(|s| DateTime::from_timestamp(s, 0))
            .ok_or(ExplorerError::InvalidQuantity(block.timestamp))?;

        Ok(Self {
            block_number: parse_quantity(&block.number)?,
            timestamp,
            transaction_count: block.transactions.len(),
            block_hash: block.hash,
            parent_hash: block.parent_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity("0X10").unwrap(), 16);
        assert_eq!(parse_quantity("ff").unwrap(), 255);
        assert_eq!(parse_quantity("0x12a05f200").unwrap(), 5_000_000_000);
    }

    #[test]
    fn test_parse_quantity_invalid() {
        for bad in ["", "0x", "0xzz", "0x1ffffffffffffffff"] {
            assert!(matches!(
                parse_quantity(bad),
                Err(ExplorerError::InvalidQuantity(_))
            ));
        }
    }

    #[test]
    fn test_quantity_tag() {
        assert_eq!(quantity_tag(0), "0x0");
        assert_eq!(quantity_tag(436), "0x1b4");
        assert_eq!(parse_quantity(&quantity_tag(19_000_000)).unwrap(), 19_000_000);
    }

    #[test]
    fn test_block_from_rpc() {
        let raw: RpcBlock = serde_json::from_value(json!({
            "number": "0x10d4f",
            "timestamp": "0x55ba467c",
            "hash": "0xabc",
            "parentHash": "0xdef",
            "miner": "0x0000000000000000000000000000000000000000",
            "transactions": [{"hash": "0x01"}, {"hash": "0x02"}, {"hash": "0x03"}]
        }))
        .unwrap();

        let info = BlockInfo::try_from(raw).unwrap();
        assert_eq!(info.block_number, 68_943);
        assert_eq!(info.timestamp.to_rfc3339(), "2015-07-30T15:45:00+00:00");
        assert_eq!(info.transaction_count, 3);
        assert_eq!(info.block_hash, "0xabc");
        assert_eq!(info.parent_hash, "0xdef");
    }

    #[test]
    fn test_block_without_transactions() {
        let raw: RpcBlock = serde_json::from_value(json!({
            "number": "0x1",
            "timestamp": "0x0",
            "hash": "0x1",
            "parentHash": "0x0"
        }))
        .unwrap();
        assert_eq!(BlockInfo::try_from(raw).unwrap().transaction_count, 0);
    }

    #[test]
    fn test_block_bad_timestamp() {
        let raw: RpcBlock = serde_json::from_value(json!({
            "number": "0x1",
            "timestamp": "soon",
            "hash": "0x1",
            "parentHash": "0x0",
            "transactions": []
        }))
        .unwrap();
        assert!(matches!(
            BlockInfo::try_from(raw),
            Err(ExplorerError::InvalidQuantity(_))
        ));
    }
}
