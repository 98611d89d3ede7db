//! # Wallet Session
//!
//! Session and network reconciliation engine for browser wallet agents.
//!
//! A wallet extension reports account and chain changes asynchronously, in
//! no particular order across kinds and sometimes twice. This crate keeps
//! one consistent view of the connected account, active network and
//! balance on top of that stream, alongside user actions such as
//! connecting or switching networks.
//!
//! ## Components
//!
//! - **NetworkRegistry**: chain id ↔ network descriptor, plus the allow-list
//! - **ProviderGateway**: typed calls and events over a [`WalletProvider`]
//! - **BalanceService**: smallest-unit balances to decimal display strings
//! - **TransactionSubmitter**: `eth_sendTransaction` with descriptive failures
//! - **SessionManager**: the state machine and sole writer of the [`Session`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wallet_session::{
//!     MockWallet, NetworkRegistry, SessionConfig, SessionManager, WalletProvider,
//! };
//!
//! # async fn demo() -> wallet_session::Result<()> {
//! let wallet: Arc<dyn WalletProvider> = Arc::new(
//!     MockWallet::new(1287).with_accounts(&["0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"]),
//! );
//! let manager =
//!     SessionManager::new(SessionConfig::default(), NetworkRegistry::moonbeam(), Some(wallet));
//!
//! let outcome = manager.connect("Moonbase Alpha").await?;
//! assert!(outcome.connected);
//! println!("{:?}", manager.session());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod error;
pub mod listeners;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod types;
pub mod utils;

pub use adapters::{MockWallet, ProviderEvent, ProviderGateway, WalletEvent, WalletProvider};
#[cfg(feature = "http")]
pub use adapters::HttpRpcClient;
pub use config::SessionConfig;
pub use error::{ProviderError, Result, SessionError};
pub use listeners::{Listeners, Subscription};
pub use registry::NetworkRegistry;
pub use runtime::{
    BalanceService, BalanceSource, EventPump, SessionManager, TransactionFailure,
    TransactionSubmitter,
};
pub use types::{
    Address, ConnectOutcome, ConnectionStatus, NativeCurrency, Network, Receipt, Session,
    TransactionRequest,
};
pub use utils::{format_native, format_units};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
