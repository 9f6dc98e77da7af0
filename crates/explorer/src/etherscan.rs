//! Etherscan-style explorer over the `proxy` JSON-RPC module.

use crate::types::{parse_quantity, quantity_tag, BlockInfo, ExplorerError, Result, RpcBlock};
use crate::LedgerExplorer;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Public Etherscan endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/api";

/// Etherscan explorer client.
pub struct EtherscanClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl EtherscanClient {
    /// Create a client against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a client against a custom endpoint.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn proxy(&self, action: &str, params: &[(&str, &str)]) -> Result<Envelope> {
        tracing::debug!(action, ?params, "explorer request");

        let envelope = self
            .client
            .get(&self.base_url)
            .query(&[
                ("module", "proxy"),
                ("action", action),
                ("apikey", self.api_key.as_str()),
            ])
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope>()
            .await?;

        Ok(envelope)
    }
}

impl fmt::Debug for EtherscanClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtherscanClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl LedgerExplorer for EtherscanClient {
    async fn latest_block_number(&self) -> Result<u64> {
        let action = "eth_blockNumber";
        let quantity: Option<String> = self.proxy(action, &[]).await?.into_result()?;
        let quantity = quantity.ok_or_else(|| ExplorerError::MissingResult {
            action: action.to_string(),
        })?;
        parse_quantity(&quantity)
    }

    async fn block(&self, number: u64) -> Result<Option<BlockInfo>> {
        let tag = quantity_tag(number);
        let block: Option<RpcBlock> = self
            .proxy("eth_getBlockByNumber", &[("tag", tag.as_str()), ("boolean", "true")])
            .await?
            .into_result()?;
        block.map(BlockInfo::try_from).transpose()
    }
}

/// Response body of a proxy call.
///
/// Successful calls carry `result`; JSON-RPC failures carry `error`; API
/// level failures (bad key, rate limit) carry `status: "0"` with the reason
/// in `message` and `result`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl Envelope {
    /// Decode `result`, mapping an absent or null result to `None`.
    pub(crate) fn into_result<T: DeserializeOwned>(self) -> Result<Option<T>> {
        if let Some(error) = self.error {
            return Err(ExplorerError::Api(format!("{} (code {})", error.message, error.code)));
        }

        if self.status.as_deref() == Some("0") {
            let message = self.message.unwrap_or_else(|| "NOTOK".to_string());
            let reason = match self.result {
                Value::String(reason) => reason,
                other => other.to_string(),
            };
            return Err(ExplorerError::Api(format!("{message}: {reason}")));
        }

        if self.result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(self.result)?))
    }
}
