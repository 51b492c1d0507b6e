use super::transport::{BlockTag, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration for the RPC transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcConfig {
    /// HTTP JSON-RPC endpoint (live chain or local fork)
    pub rpc_http_url: String,
    /// Timeout for a single HTTP request in seconds
    pub http_timeout_secs: u64,
    /// Attempts per call before a transient failure is surfaced
    pub max_attempts: u32,
    /// First retry delay in milliseconds, doubled per attempt
    pub backoff_base_ms: u64,
    /// Upper bound for the retry delay in milliseconds
    pub backoff_max_ms: u64,
    /// Number of pooled connections, also the in-flight call limit
    pub connections: usize,
    /// Pin every `eth_call` to this block. `None` queries `latest`.
    pub block_number: Option<u64>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_http_url: "http://127.0.0.1:8545".to_string(),
            http_timeout_secs: 10,
            max_attempts: 4,
            backoff_base_ms: 200,
            backoff_max_ms: 5_000,
            connections: 8,
            block_number: None,
        }
    }
}

impl RpcConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = Self::default();

        if let Ok(rpc_http_url) = std::env::var("RPC_HTTP_URL") {
            let _url = Url::parse(&rpc_http_url).map_err(|e| eyre::eyre!("Invalid RPC_HTTP_URL: {}", e))?;
            config.rpc_http_url = rpc_http_url;
        }

        if let Ok(timeout_str) = std::env::var("RPC_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout_str.parse().map_err(|e| eyre::eyre!("Invalid RPC_TIMEOUT_SECS: {}", e))?;
        }

        if let Ok(max_attempts_str) = std::env::var("RPC_MAX_ATTEMPTS") {
            config.max_attempts = max_attempts_str.parse().map_err(|e| eyre::eyre!("Invalid RPC_MAX_ATTEMPTS: {}", e))?;
        }

        if let Ok(base_str) = std::env::var("RPC_BACKOFF_BASE_MS") {
            config.backoff_base_ms = base_str.parse().map_err(|e| eyre::eyre!("Invalid RPC_BACKOFF_BASE_MS: {}", e))?;
        }

        if let Ok(max_str) = std::env::var("RPC_BACKOFF_MAX_MS") {
            config.backoff_max_ms = max_str.parse().map_err(|e| eyre::eyre!("Invalid RPC_BACKOFF_MAX_MS: {}", e))?;
        }

        if let Ok(connections_str) = std::env::var("RPC_CONNECTIONS") {
            config.connections = connections_str.parse().map_err(|e| eyre::eyre!("Invalid RPC_CONNECTIONS: {}", e))?;
        }

        if let Ok(block_str) = std::env::var("RPC_BLOCK") {
            config.block_number = match block_str.as_str() {
                "" | "latest" => None,
                num => Some(num.parse().map_err(|e| eyre::eyre!("Invalid RPC_BLOCK: {}", e))?),
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        Url::parse(&self.rpc_http_url).map_err(|e| eyre::eyre!("Invalid rpc_http_url {}: {}", self.rpc_http_url, e))?;
        if self.max_attempts == 0 {
            return Err(eyre::eyre!("max_attempts must be at least 1"));
        }
        if self.connections == 0 {
            return Err(eyre::eyre!("connections must be at least 1"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn block_tag(&self) -> BlockTag {
        BlockTag::from(self.block_number)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms.max(self.backoff_base_ms)),
        }
    }
}
