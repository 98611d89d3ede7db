//! Event pump: drains wallet events into the session manager.
//!
//! Events are applied in the order the wallet emitted them. Follow-up work
//! that has to await the wallet (balance refresh, account discovery) is
//! spawned, so a slow follow-up never holds back later events.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapters::ProviderEvent;
use crate::error::Result;
use crate::listeners::Subscription;
use crate::runtime::session_manager::SessionManager;

/// Running subscription to the wallet's events.
pub struct EventPump {
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl SessionManager {
    /// Subscribe to the wallet and start applying its events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen(&self) -> Result<EventPump> {
        let gateway = self.gateway()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<ProviderEvent>();
        let chain_tx = tx.clone();
        let subscription = gateway.subscribe(
            move |accounts| {
                let _ = tx.send(ProviderEvent::AccountsChanged(accounts));
            },
            move |chain_id| {
                let _ = chain_tx.send(ProviderEvent::ChainChanged(chain_id));
            },
        );

        let manager = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                manager.dispatch(event);
            }
            tracing::debug!("wallet event pump stopped");
        });

        Ok(EventPump { subscription, task })
    }

    fn dispatch(&self, event: ProviderEvent) {
        tracing::debug!(?event, "wallet event");
        match event {
            ProviderEvent::AccountsChanged(accounts) => {
                if self.apply_accounts(accounts) {
                    let manager = self.clone();
                    tokio::spawn(async move { manager.after_accounts_changed().await });
                }
            }
            ProviderEvent::ChainChanged(chain_id) => {
                if self.record_chain(chain_id) {
                    let manager = self.clone();
                    tokio::spawn(async move { manager.discover_accounts().await });
                }
            }
        }
    }
}

impl EventPump {
    /// Cancel the wallet subscription and wait for queued events to drain.
    pub async fn shutdown(self) {
        // Dropping the handlers drops the senders, which ends the task.
        self.subscription.unsubscribe();
        if let Err(err) = self.task.await {
            tracing::warn!(%err, "wallet event pump ended abnormally");
        }
    }
}
