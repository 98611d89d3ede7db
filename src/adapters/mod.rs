//! Wallet-agent adapters.
//!
//! [`WalletProvider`] is the capability interface the engine consumes: an
//! EIP-1193 style request/response call plus an event subscription. Browser
//! bindings, test doubles and remote bridges all plug in here. The
//! [`ProviderGateway`] wraps a provider with typed calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::listeners::Subscription;

pub mod gateway;
#[cfg(feature = "http")]
pub mod http_rpc;
pub mod mock;

pub use gateway::{ProviderEvent, ProviderGateway};
#[cfg(feature = "http")]
pub use http_rpc::HttpRpcClient;
pub use mock::{Hold, MockWallet};

/// JSON-RPC method names used against the wallet agent.
pub mod methods {
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const NET_VERSION: &str = "net_version";
    pub const GET_BALANCE: &str = "eth_getBalance";
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const ADD_CHAIN: &str = "wallet_addEthereumChain";
}

/// Raw event as the wallet agent emits it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    /// Newly exposed account set, possibly empty.
    AccountsChanged(Vec<String>),
    /// Chain id, normally `0x`-hex.
    ChainChanged(String),
}

/// Handler type for raw wallet events.
pub type WalletEventHandler = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

/// Capability surface of an external wallet agent.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Whether the agent is a wallet this engine knows how to drive.
    fn is_compatible(&self) -> bool {
        true
    }

    /// Issue a request. Suspends until the agent answers; no timeout.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register for account and chain events. Events arrive in emission
    /// order per kind, with no ordering across kinds and possible duplicates.
    fn subscribe(&self, handler: WalletEventHandler) -> Subscription;
}
