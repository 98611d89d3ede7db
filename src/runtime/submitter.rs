//! Transaction submission through the wallet agent.
//!
//! Never touches session state: the outcome of a submission, good or bad,
//! leaves the account and network as they were.

use serde::{Deserialize, Serialize};

use crate::adapters::ProviderGateway;
use crate::error::SessionError;
use crate::types::{Receipt, TransactionRequest};

/// Descriptive failure handed back instead of a raw provider fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TransactionFailure {
    pub message: String,
}

impl From<SessionError> for TransactionFailure {
    fn from(err: SessionError) -> Self {
        let message = match err {
            SessionError::UserDeclined => "User denied transaction signature.".to_string(),
            SessionError::Rpc { message, .. } => message,
            other => other.to_string(),
        };
        Self { message }
    }
}

#[derive(Clone, Debug)]
pub struct TransactionSubmitter {
    gateway: ProviderGateway,
}

impl TransactionSubmitter {
    pub fn new(gateway: ProviderGateway) -> Self {
        Self { gateway }
    }

    /// Encode and forward `request`. Malformed quantities are rejected
    /// locally; agent rejections are converted to a [`TransactionFailure`].
    pub async fn submit(
        &self,
        request: &TransactionRequest,
    ) -> Result<Receipt, TransactionFailure> {
        let tx = request.to_rpc_object()?;
        match self.gateway.send_transaction(tx).await {
            Ok(transaction_hash) => {
                tracing::info!(
                    %transaction_hash,
                    from = %request.from,
                    to = %request.to,
                    "transaction submitted"
                );
                Ok(Receipt {
                    transaction_hash,
                    from: request.from.clone(),
                    to: request.to.clone(),
                    value: request.value.clone(),
                })
            }
            Err(err) => {
                tracing::warn!(%err, from = %request.from, "transaction rejected");
                Err(err.into())
            }
        }
    }
}
