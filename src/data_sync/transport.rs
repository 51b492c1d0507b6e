use super::config::RpcConfig;
use super::rpc_error::RpcError;
use alloy_primitives::{Address, Bytes, hex};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Block selector for `eth_call`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockTag {
    #[default]
    Latest,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(num) => format!("0x{num:x}"),
        }
    }

    pub fn block_number(&self) -> Option<u64> {
        match self {
            BlockTag::Latest => None,
            BlockTag::Number(num) => Some(*num),
        }
    }
}

impl From<Option<u64>> for BlockTag {
    fn from(block_number: Option<u64>) -> Self {
        block_number.map(BlockTag::Number).unwrap_or_default()
    }
}

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// `eth_call` against `to` with ABI-encoded `data`.
    async fn call(&self, to: Address, data: Bytes, block: BlockTag) -> Result<Bytes, RpcError>;

    async fn block_number(&self) -> Result<u64, RpcError>;
}

/// Exponential backoff with jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay: Duration::from_millis(200), max_delay: Duration::from_secs(5) }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based). Doubles per attempt up to `max_delay`,
    /// then adds up to 25% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ms = (capped.as_millis() as u64 / 4).max(1);
        capped + Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
    }
}

/// JSON-RPC over HTTP with a bounded set of reusable connections.
///
/// Each slot is its own `reqwest::Client` holding at most one idle connection, calls are
/// spread across slots round-robin, and a semaphore keeps in-flight requests at or below
/// the number of slots.
pub struct HttpTransport {
    url: Url,
    clients: Vec<reqwest::Client>,
    next_client: AtomicUsize,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
    request_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let url = Url::parse(&config.rpc_http_url)
            .map_err(|e| RpcError::Fatal(format!("Invalid RPC URL {}: {}", config.rpc_http_url, e)))?;

        let connections = config.connections.max(1);
        let clients = (0..connections)
            .map(|_| {
                reqwest::Client::builder()
                    .timeout(config.http_timeout())
                    .pool_max_idle_per_host(1)
                    .build()
                    .map_err(|e| RpcError::Fatal(format!("Failed to create HTTP client: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            url,
            clients,
            next_client: AtomicUsize::new(0),
            permits: Arc::new(Semaphore::new(connections)),
            retry: config.retry_policy(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn connections(&self) -> usize {
        self.clients.len()
    }

    /// Sends a JSON-RPC request, retrying transient failures.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        warn!("RPC {} failed after {} attempts: {}", method, attempt, err);
                        return Err(RpcError::RetriesExhausted { attempts: attempt, last: err.to_string() });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "RPC {} attempt {}/{} failed: {}. Retrying in {:?}",
                        method, attempt, self.retry.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn request_once(&self, method: &str, params: &Value) -> Result<Value, RpcError> {
        let _permit = self.permits.acquire().await.map_err(|e| RpcError::Fatal(format!("Connection pool closed: {e}")))?;

        let slot = self.next_client.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request_body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        debug!("RPC {} id={} via connection {}", method, id, slot);

        let response = self.clients[slot].post(self.url.clone()).json(&request_body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::from_http_status(status));
        }

        let response_json: Value = response.json().await?;
        parse_json_rpc_response(response_json)
    }
}

/// Extracts `result` from a JSON-RPC response, classifying `error` objects.
pub fn parse_json_rpc_response(response_json: Value) -> Result<Value, RpcError> {
    if let Some(error) = response_json.get("error") {
        return Err(RpcError::from_json_rpc_error(error));
    }

    response_json
        .get("result")
        .cloned()
        .ok_or_else(|| RpcError::MalformedResponse("Missing result in RPC response".to_string()))
}

fn parse_hex_bytes(value: &Value) -> Result<Bytes, RpcError> {
    let result = value.as_str().ok_or_else(|| RpcError::MalformedResponse(format!("Expected hex string, got {value}")))?;
    let bytes = hex::decode(result.trim_start_matches("0x")).map_err(|e| RpcError::MalformedResponse(format!("Invalid hex result: {e}")))?;
    Ok(bytes.into())
}

fn parse_hex_u64(value: &Value) -> Result<u64, RpcError> {
    let result = value.as_str().ok_or_else(|| RpcError::MalformedResponse(format!("Expected hex quantity, got {value}")))?;
    u64::from_str_radix(result.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::MalformedResponse(format!("Invalid hex quantity {result}: {e}")))
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, to: Address, data: Bytes, block: BlockTag) -> Result<Bytes, RpcError> {
        let params = json!([
            {
                "to": format!("{:#x}", to),
                "data": format!("{:#x}", data)
            },
            block.to_param()
        ]);
        let result = self.request("eth_call", params).await?;
        parse_hex_bytes(&result)
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        parse_hex_u64(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_tag_param() {
        assert_eq!(BlockTag::Latest.to_param(), "latest");
        assert_eq!(BlockTag::Number(17_000_000).to_param(), "0x1036640");
        assert_eq!(BlockTag::from(Some(1)), BlockTag::Number(1));
        assert_eq!(BlockTag::from(None), BlockTag::Latest);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };

        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(125));

        let third = policy.delay_for(3);
        assert!(third >= Duration::from_millis(400) && third < Duration::from_millis(500));

        let capped = policy.delay_for(8);
        assert!(capped >= Duration::from_millis(1000) && capped < Duration::from_millis(1250));
    }

    #[test]
    fn test_parse_response() {
        let ok = parse_json_rpc_response(json!({ "jsonrpc": "2.0", "id": 1, "result": "0x01" })).unwrap();
        assert_eq!(parse_hex_bytes(&ok).unwrap(), Bytes::from(vec![1u8]));

        let missing = parse_json_rpc_response(json!({ "jsonrpc": "2.0", "id": 1 }));
        assert!(matches!(missing, Err(RpcError::MalformedResponse(_))));

        assert_eq!(parse_hex_u64(&json!("0x10")).unwrap(), 16);
    }

    #[test]
    fn test_invalid_url_is_fatal() {
        let config = RpcConfig { rpc_http_url: "not a url".to_string(), ..RpcConfig::default() };
        assert!(matches!(HttpTransport::new(&config), Err(RpcError::Fatal(_))));
    }
}
