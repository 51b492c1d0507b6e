use alloy_primitives::Bytes;
use serde_json::Value;
use thiserror::Error;

use super::abi::decode_revert;

/// Failure taxonomy of the RPC transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Network hiccup, timeout, rate limit or node-side hiccup. Retried by the transport.
    #[error("transient transport error: {0}")]
    Transient(String),
    #[error("transport gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("contract reverted: {}", .reason.as_deref().unwrap_or("no reason"))]
    Revert { reason: Option<String>, data: Bytes },
    /// Configuration or request misuse. Never retried.
    #[error("fatal RPC error: {0}")]
    Fatal(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl RpcError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transient(_))
    }

    pub fn revert(data: Bytes) -> Self {
        RpcError::Revert { reason: decode_revert(&data), data }
    }

    /// Classifies a JSON-RPC `error` object.
    pub fn from_json_rpc_error(error: &Value) -> Self {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error.get("message").and_then(Value::as_str).unwrap_or_default().to_string();

        if code == 3 || message.contains("revert") {
            let data = error
                .get("data")
                .and_then(|data| match data {
                    Value::String(s) => Some(s.as_str()),
                    // Some nodes nest the payload, e.g. {"data": {"data": "0x.."}}
                    Value::Object(obj) => obj.get("data").and_then(Value::as_str),
                    _ => None,
                })
                .and_then(|s| alloy_primitives::hex::decode(s.trim_start_matches("0x")).ok())
                .map(Bytes::from)
                .unwrap_or_default();
            let reason = decode_revert(&data)
                .or_else(|| message.strip_prefix("execution reverted: ").map(str::to_string));
            return RpcError::Revert { reason, data };
        }

        match code {
            // parse error, invalid request, method not found, invalid params
            -32700 | -32600 | -32601 | -32602 => RpcError::Fatal(format!("{code}: {message}")),
            // limit exceeded, internal error, implementation-defined server errors
            -32099..=-32000 | -32603 => RpcError::Transient(format!("{code}: {message}")),
            _ => RpcError::Fatal(format!("{code}: {message}")),
        }
    }

    pub fn from_http_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            RpcError::Transient(format!("HTTP {status}"))
        } else {
            RpcError::Fatal(format!("HTTP {status}"))
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            RpcError::Transient(err.to_string())
        } else if err.is_decode() || err.is_body() {
            RpcError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            RpcError::from_http_status(status)
        } else {
            RpcError::Fatal(err.to_string())
        }
    }
}
