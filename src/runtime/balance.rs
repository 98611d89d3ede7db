//! Balance retrieval and display conversion.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::ProviderGateway;
use crate::error::{Result, SessionError};
use crate::types::{Address, Network};
use crate::utils::format_units;

/// Where raw balances come from.
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Native balance of `address` on `network`, in the smallest unit.
    async fn raw_balance(&self, address: &Address, network: &Network) -> Result<u128>;
}

/// The wallet agent only answers for the chain it is on, so a request for
/// any other network is refused rather than answered with the wrong chain.
#[async_trait]
impl BalanceSource for ProviderGateway {
    async fn raw_balance(&self, address: &Address, network: &Network) -> Result<u128> {
        let chain_id = self.current_chain_id().await?;
        if chain_id != network.chain_id {
            return Err(SessionError::BalanceUnavailable(format!(
                "wallet is on chain {}, not {}",
                chain_id, network.name
            )));
        }
        self.get_balance(address).await
    }
}

#[derive(Clone)]
pub struct BalanceService {
    source: Arc<dyn BalanceSource>,
}

impl BalanceService {
    pub fn new(source: Arc<dyn BalanceSource>) -> Self {
        Self { source }
    }

    /// Fetch and format a balance.
    ///
    /// An empty address short-circuits to `""` without any call. Every
    /// failure is reported as [`SessionError::BalanceUnavailable`].
    pub async fn fetch(&self, address: Option<&Address>, network: &Network) -> Result<String> {
        let Some(address) = address else {
            return Ok(String::new());
        };
        let raw = self
            .source
            .raw_balance(address, network)
            .await
            .map_err(|e| match e {
                SessionError::BalanceUnavailable(reason) => {
                    SessionError::BalanceUnavailable(reason)
                }
                other => SessionError::BalanceUnavailable(other.to_string()),
            })?;
        Ok(format_units(raw, network.currency.decimals))
    }
}
