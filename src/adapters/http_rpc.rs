//! JSON-RPC over HTTP.
//!
//! Queries a network's public RPC endpoint directly, without going through
//! the wallet agent. Used as a balance source and by the probe binary.

#![cfg(feature = "http")]

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Result, SessionError};
use crate::runtime::balance::BalanceSource;
use crate::types::{Address, Network};
use crate::utils::parse_quantity;

/// HTTP JSON-RPC client.
#[derive(Clone, Debug, Default)]
pub struct HttpRpcClient {
    http_client: reqwest::Client,
}

impl HttpRpcClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Issue a single JSON-RPC call against `rpc_url`.
    pub async fn call(&self, rpc_url: &str, method: &str, params: Value) -> Result<Value> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.http_client
            .post(rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SessionError::Rpc {
                code: -32603,
                message: format!("{} request failed: {}", method, e),
            })?;

        let result: Value = response.json().await.map_err(|e| SessionError::Rpc {
            code: -32700,
            message: format!("Failed to parse {} response: {}", method, e),
        })?;

        if let Some(error) = result.get("error") {
            return Err(SessionError::Rpc {
                code: error.get("code").and_then(|c| c.as_i64()).unwrap_or(-32603),
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        result.get("result").cloned().ok_or_else(|| SessionError::Rpc {
            code: -32603,
            message: format!("Invalid {} response", method),
        })
    }
}

#[async_trait]
impl BalanceSource for HttpRpcClient {
    async fn raw_balance(&self, address: &Address, network: &Network) -> Result<u128> {
        let value = self
            .call(&network.rpc_url, "eth_getBalance", json!([address.normalized(), "latest"]))
            .await?;
        let quantity = value
            .as_str()
            .ok_or_else(|| SessionError::InvalidQuantity(value.to_string()))?;
        parse_quantity(quantity)
    }
}
