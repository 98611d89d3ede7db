//! Provider gateway.
//!
//! Sole point of contact with the wallet agent. Converts JSON results into
//! typed values and raw rejections into [`SessionError`]s. Owns no session
//! state.

use std::sync::Arc;

use serde_json::{json, Value};

use super::{methods, WalletEvent, WalletProvider};
use crate::error::{Result, SessionError};
use crate::listeners::Subscription;
use crate::types::{Address, Network};
use crate::utils::{parse_chain_id, parse_quantity};

/// Typed wallet event after normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

#[derive(Clone)]
pub struct ProviderGateway {
    provider: Arc<dyn WalletProvider>,
}

impl core::fmt::Debug for ProviderGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderGateway").finish_non_exhaustive()
    }
}

impl ProviderGateway {
    /// Wrap whatever agent the environment exposes.
    ///
    /// `None` is reported as [`SessionError::ProviderAbsent`], and an agent
    /// that is not a compatible wallet as [`SessionError::UnsupportedProvider`].
    pub fn detect(candidate: Option<Arc<dyn WalletProvider>>) -> Result<Self> {
        let provider = candidate.ok_or(SessionError::ProviderAbsent)?;
        if !provider.is_compatible() {
            return Err(SessionError::UnsupportedProvider);
        }
        Ok(Self { provider })
    }

    /// Trigger the permission prompt. A declined prompt comes back as
    /// [`SessionError::UserDeclined`].
    pub async fn request_accounts(&self) -> Result<Vec<Address>> {
        let value = self
            .provider
            .request(methods::REQUEST_ACCOUNTS, json!([]))
            .await?;
        parse_accounts(&value)
    }

    /// Already-authorized accounts, without prompting.
    pub async fn current_accounts(&self) -> Result<Vec<Address>> {
        let value = self.provider.request(methods::ACCOUNTS, json!([])).await?;
        parse_accounts(&value)
    }

    /// Chain id the agent is on. Falls back to `net_version` for agents
    /// that do not implement `eth_chainId`.
    pub async fn current_chain_id(&self) -> Result<u64> {
        let value = match self.provider.request(methods::CHAIN_ID, json!([])).await {
            Ok(value) => value,
            Err(err) if err.is_method_not_found() => {
                tracing::debug!("eth_chainId unsupported, falling back to net_version");
                self.provider.request(methods::NET_VERSION, json!([])).await?
            }
            Err(err) => return Err(err.into()),
        };
        chain_id_from_value(&value)
    }

    /// Ask the agent to register and display `network`.
    pub async fn add_network(&self, network: &Network) -> Result<()> {
        self.provider
            .request(methods::ADD_CHAIN, json!([network.add_chain_params()]))
            .await?;
        Ok(())
    }

    /// Native balance on the agent's current chain, in the smallest unit.
    pub async fn get_balance(&self, address: &Address) -> Result<u128> {
        let value = self
            .provider
            .request(methods::GET_BALANCE, json!([address.normalized(), "latest"]))
            .await?;
        quantity_from_value(&value)
    }

    /// Forward an `eth_sendTransaction` object; returns the transaction hash.
    pub async fn send_transaction(&self, tx: Value) -> Result<String> {
        let value = self
            .provider
            .request(methods::SEND_TRANSACTION, json!([tx]))
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SessionError::Rpc {
                code: -32603,
                message: format!("unexpected transaction result: {}", value),
            })
    }

    /// Register typed listeners for both event kinds.
    ///
    /// Malformed events are logged and dropped.
    pub fn subscribe<A, C>(&self, on_accounts_changed: A, on_chain_changed: C) -> Subscription
    where
        A: Fn(Vec<Address>) + Send + Sync + 'static,
        C: Fn(u64) + Send + Sync + 'static,
    {
        self.provider.subscribe(Arc::new(move |event: &WalletEvent| {
            match normalize_event(event) {
                Ok(ProviderEvent::AccountsChanged(accounts)) => on_accounts_changed(accounts),
                Ok(ProviderEvent::ChainChanged(chain_id)) => on_chain_changed(chain_id),
                Err(err) => tracing::warn!(?event, %err, "dropping malformed wallet event"),
            }
        }))
    }
}

/// Convert a raw wallet event into its typed form.
pub fn normalize_event(event: &WalletEvent) -> Result<ProviderEvent> {
    match event {
        WalletEvent::AccountsChanged(raw) => {
            let accounts = raw
                .iter()
                .map(|a| Address::parse(a))
                .collect::<Result<Vec<_>>>()?;
            Ok(ProviderEvent::AccountsChanged(accounts))
        }
        WalletEvent::ChainChanged(raw) => Ok(ProviderEvent::ChainChanged(parse_chain_id(raw)?)),
    }
}

fn parse_accounts(value: &Value) -> Result<Vec<Address>> {
    let list = value.as_array().ok_or_else(|| SessionError::Rpc {
        code: -32603,
        message: format!("expected account list, got {}", value),
    })?;
    list.iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| SessionError::InvalidAddress(entry.to_string()))
                .and_then(Address::parse)
        })
        .collect()
}

fn chain_id_from_value(value: &Value) -> Result<u64> {
    match value {
        Value::String(s) => parse_chain_id(s),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| SessionError::InvalidChainId(n.to_string())),
        other => Err(SessionError::InvalidChainId(other.to_string())),
    }
}

fn quantity_from_value(value: &Value) -> Result<u128> {
    match value {
        Value::String(s) => parse_quantity(s),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| SessionError::InvalidQuantity(n.to_string())),
        other => Err(SessionError::InvalidQuantity(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockWallet;

    #[test]
    fn test_detect_absent() {
        assert_eq!(ProviderGateway::detect(None).unwrap_err(), SessionError::ProviderAbsent);
    }

    #[test]
    fn test_detect_incompatible() {
        let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::incompatible());
        assert_eq!(
            ProviderGateway::detect(Some(wallet)).unwrap_err(),
            SessionError::UnsupportedProvider
        );
    }

    #[test]
    fn test_normalize_chain_event() {
        let event = WalletEvent::ChainChanged("0x507".to_string());
        assert_eq!(normalize_event(&event).unwrap(), ProviderEvent::ChainChanged(1287));
        assert!(normalize_event(&WalletEvent::ChainChanged("bogus".into())).is_err());
    }

    #[tokio::test]
    async fn test_declined_prompt_is_distinguished() {
        let wallet = Arc::new(MockWallet::new(1287));
        wallet.decline_prompts(true);
        let gateway = ProviderGateway::detect(Some(wallet as Arc<dyn WalletProvider>)).unwrap();
        assert_eq!(gateway.request_accounts().await.unwrap_err(), SessionError::UserDeclined);
    }

    #[tokio::test]
    async fn test_net_version_fallback() {
        let wallet = Arc::new(MockWallet::new(1281));
        wallet.set_legacy_chain_id(true);
        let gateway =
            ProviderGateway::detect(Some(wallet.clone() as Arc<dyn WalletProvider>)).unwrap();
        assert_eq!(gateway.current_chain_id().await.unwrap(), 1281);
        assert_eq!(wallet.calls("net_version"), 1);
    }
}
