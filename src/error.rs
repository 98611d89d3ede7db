//! Error types for wallet session operations.
//!
//! Provides strongly-typed errors for the session engine using `thiserror`.
//! Raw wallet-agent rejections are carried as [`ProviderError`] and converted
//! at the component boundary before they reach the session manager.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// EIP-1193 code the wallet agent uses when the user rejects a prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// JSON-RPC code for an unknown method.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// A rejection reported by the wallet agent or an RPC endpoint.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The sentinel rejection for a declined permission prompt.
    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_CODE, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }

    pub fn is_method_not_found(&self) -> bool {
        self.code == METHOD_NOT_FOUND_CODE
    }
}

/// Errors that can occur during session operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No wallet agent was detected in the environment
    #[error("No wallet provider detected")]
    ProviderAbsent,
    /// An agent is present but is not a compatible wallet
    #[error("Other ethereum wallet did not support")]
    UnsupportedProvider,
    /// Network name is outside the allow-list or the registry
    #[error("This is not a valid network: {0}")]
    UnsupportedNetwork(String),
    /// Permission prompt rejected by the user
    #[error("User declined the request")]
    UserDeclined,
    /// Chain id reported by the wallet is not registered
    #[error("Chain {chain_id} is not a supported network")]
    NetworkMismatch { chain_id: u64 },
    /// Provider or RPC call failed
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// Balance could not be retrieved
    #[error("Balance unavailable: {0}")]
    BalanceUnavailable(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid chain id: {0}")]
    InvalidChainId(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ProviderError> for SessionError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            SessionError::UserDeclined
        } else {
            SessionError::Rpc {
                code: err.code,
                message: err.message,
            }
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = core::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_maps_to_declined() {
        let err: SessionError = ProviderError::user_rejected().into();
        assert_eq!(err, SessionError::UserDeclined);
    }

    #[test]
    fn test_other_codes_map_to_rpc() {
        let err: SessionError = ProviderError::new(-32000, "header not found").into();
        assert_eq!(
            err,
            SessionError::Rpc {
                code: -32000,
                message: "header not found".to_string()
            }
        );
    }
}
