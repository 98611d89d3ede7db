//! Session manager: the reconciliation engine.
//!
//! Sole writer of the [`Session`]. Provider events and user actions only
//! record what the wallet last reported (account, chain id, connect in
//! flight); the status and network name are then derived from those facts.
//! Any interleaving of the same reports therefore converges on one state.
//!
//! Concurrency rules:
//! - one `connect` prompt at a time; later callers attach to its outcome
//! - one account-discovery pass at a time; chain changes arriving during a
//!   pass collapse into a single follow-up pass
//! - every balance fetch carries a sequence number and results older than
//!   the last applied one are dropped
//! - account and chain writes bump an epoch; a value read from the wallet
//!   before a newer write landed is dropped instead of applied

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::adapters::{ProviderGateway, WalletProvider};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::listeners::{Listeners, Subscription};
use crate::registry::NetworkRegistry;
use crate::runtime::balance::{BalanceService, BalanceSource};
use crate::runtime::submitter::{TransactionFailure, TransactionSubmitter};
use crate::types::{
    Address, ConnectOutcome, ConnectionStatus, Network, Receipt, Session, TransactionRequest,
};

type ConnectResult = core::result::Result<ConnectOutcome, SessionError>;

/// Facts reported by the wallet plus bookkeeping for in-flight work.
struct EngineState {
    account: Option<Address>,
    chain_id: Option<u64>,
    network_name: String,
    balance: String,
    connecting: bool,
    connect_outcome: Option<watch::Receiver<Option<ConnectResult>>>,
    accounts_epoch: u64,
    chain_epoch: u64,
    balance_issued: u64,
    balance_applied: u64,
    discovery_in_flight: bool,
    discovery_pending: Option<u64>,
}

impl EngineState {
    fn new(network_name: String) -> Self {
        Self {
            account: None,
            chain_id: None,
            network_name,
            balance: String::new(),
            connecting: false,
            connect_outcome: None,
            accounts_epoch: 0,
            chain_epoch: 0,
            balance_issued: 0,
            balance_applied: 0,
            discovery_in_flight: false,
            discovery_pending: None,
        }
    }

    fn status(&self, registry: &NetworkRegistry) -> ConnectionStatus {
        match (&self.account, self.chain_id) {
            (None, _) if self.connecting => ConnectionStatus::Connecting,
            (None, _) => ConnectionStatus::Disconnected,
            // Accounts known but chain not yet read
            (Some(_), None) => ConnectionStatus::Connecting,
            (Some(_), Some(id)) if registry.resolve_by_chain_id(id).is_some() => {
                ConnectionStatus::Connected
            }
            (Some(_), Some(_)) => ConnectionStatus::ConnectedWrongNetwork,
        }
    }

    fn snapshot(&self, registry: &NetworkRegistry) -> Session {
        Session {
            account: self.account.clone(),
            network_name: self.network_name.clone(),
            status: self.status(registry),
            balance_display: self.balance.clone(),
        }
    }

    fn set_accounts(&mut self, accounts: Vec<Address>) {
        self.account = accounts.into_iter().next();
        self.accounts_epoch += 1;
    }

    fn set_chain(&mut self, chain_id: u64) {
        self.chain_id = Some(chain_id);
        self.chain_epoch += 1;
    }

    /// Apply accounts read when the epoch was `read_at`. Returns false if a
    /// newer write landed while the read was in flight.
    fn accept_accounts(&mut self, read_at: u64, accounts: Vec<Address>) -> bool {
        if self.accounts_epoch != read_at {
            tracing::debug!(read_at, epoch = self.accounts_epoch, "discarding stale accounts");
            return false;
        }
        self.set_accounts(accounts);
        true
    }

    fn accept_chain(&mut self, read_at: u64, chain_id: u64) -> bool {
        if self.chain_epoch != read_at {
            tracing::debug!(
                chain_id,
                read_at,
                epoch = self.chain_epoch,
                "discarding stale chain id"
            );
            return false;
        }
        self.set_chain(chain_id);
        true
    }
}

struct Inner {
    config: SessionConfig,
    registry: Arc<NetworkRegistry>,
    gateway: core::result::Result<ProviderGateway, SessionError>,
    balances: Option<BalanceService>,
    state: Mutex<EngineState>,
    listeners: Listeners<Session>,
}

/// Handle to the engine. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build an engine whose balances come from the wallet agent itself.
    pub fn new(
        config: SessionConfig,
        registry: NetworkRegistry,
        provider: Option<Arc<dyn WalletProvider>>,
    ) -> Self {
        Self::build(config, registry, provider, None)
    }

    /// Build an engine with a separate balance source, such as an HTTP
    /// JSON-RPC client.
    pub fn with_balance_source(
        config: SessionConfig,
        registry: NetworkRegistry,
        provider: Option<Arc<dyn WalletProvider>>,
        source: Arc<dyn BalanceSource>,
    ) -> Self {
        Self::build(config, registry, provider, Some(source))
    }

    fn build(
        config: SessionConfig,
        registry: NetworkRegistry,
        provider: Option<Arc<dyn WalletProvider>>,
        source: Option<Arc<dyn BalanceSource>>,
    ) -> Self {
        let registry = Arc::new(registry.with_supported(config.supported_networks.clone()));
        let gateway = ProviderGateway::detect(provider);
        if let Err(err) = &gateway {
            tracing::warn!(%err, "wallet provider unavailable");
        }
        let balances = match (source, &gateway) {
            (Some(source), _) => Some(BalanceService::new(source)),
            (None, Ok(gateway)) => Some(BalanceService::new(Arc::new(gateway.clone()))),
            (None, Err(_)) => None,
        };
        let state = EngineState::new(config.default_network.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                gateway,
                balances,
                state: Mutex::new(state),
                listeners: Listeners::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn gateway(&self) -> Result<&ProviderGateway> {
        self.inner.gateway.as_ref().map_err(Clone::clone)
    }

    pub fn registry(&self) -> &NetworkRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Read-only snapshot of the current session.
    pub fn session(&self) -> Session {
        self.lock().snapshot(&self.inner.registry)
    }

    /// Notify `subscriber` on every change of the session snapshot.
    pub fn on_session_change<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(subscriber)
    }

    /// The network the wallet is on. `Ok(None)` until the wallet has
    /// reported a chain; [`SessionError::NetworkMismatch`] for a chain
    /// outside the registry.
    pub fn active_network(&self) -> Result<Option<Network>> {
        let chain_id = self.lock().chain_id;
        match chain_id {
            Some(id) => self
                .inner
                .registry
                .resolve_by_chain_id(id)
                .cloned()
                .map(Some)
                .ok_or(SessionError::NetworkMismatch { chain_id: id }),
            None => Ok(None),
        }
    }

    fn accounts_epoch(&self) -> u64 {
        self.lock().accounts_epoch
    }

    fn chain_epoch(&self) -> u64 {
        self.lock().chain_epoch
    }

    /// Apply a mutation, re-derive the session and publish it if it changed.
    ///
    /// A change of account or network clears the balance and retires every
    /// outstanding balance fetch.
    fn update<R>(&self, mutate: impl FnOnce(&mut EngineState) -> R) -> R {
        let registry = &self.inner.registry;
        let (result, changed) = {
            let mut state = self.lock();
            let before = state.snapshot(registry);
            let result = mutate(&mut state);
            if let Some(network) = state.chain_id.and_then(|id| registry.resolve_by_chain_id(id)) {
                if state.network_name != network.name {
                    state.network_name = network.name.clone();
                }
            }
            if state.account != before.account || state.network_name != before.network_name {
                state.balance.clear();
                state.balance_applied = state.balance_issued;
            }
            let after = state.snapshot(registry);
            if after.status != before.status {
                tracing::info!(
                    from = ?before.status,
                    to = ?after.status,
                    network = %after.network_name,
                    "session status changed"
                );
            }
            (result, (after != before).then_some(after))
        };
        if let Some(session) = changed {
            self.inner.listeners.emit(&session);
        }
        result
    }

    /// Connect to the wallet, targeting `network_name`.
    ///
    /// Concurrent calls share one permission prompt and one outcome. A
    /// declined prompt is not an error: it resolves with `connected: false`.
    pub async fn connect(&self, network_name: &str) -> Result<ConnectOutcome> {
        if !self.inner.registry.is_supported(network_name) {
            return Err(SessionError::UnsupportedNetwork(network_name.to_string()));
        }
        let gateway = self.gateway()?.clone();

        let leader = self.update(|state| match &state.connect_outcome {
            Some(outcome) => Err(outcome.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                state.connect_outcome = Some(rx);
                state.connecting = true;
                Ok(tx)
            }
        });

        let tx = match leader {
            Ok(tx) => tx,
            Err(mut outcome) => {
                tracing::debug!(network = network_name, "connect already in flight, attaching");
                let settled = outcome
                    .wait_for(Option::is_some)
                    .await
                    .map(|value| value.clone())
                    .ok()
                    .flatten();
                return settled.unwrap_or(Err(SessionError::Rpc {
                    code: -32603,
                    message: "connect attempt abandoned".to_string(),
                }));
            }
        };

        let mut guard = ConnectGuard {
            manager: self,
            armed: true,
        };
        let result = self.run_connect(&gateway, network_name).await;
        guard.armed = false;
        self.finish_connect();
        let _ = tx.send(Some(result.clone()));
        result
    }

    fn finish_connect(&self) {
        self.update(|state| {
            state.connecting = false;
            state.connect_outcome = None;
        });
    }

    async fn run_connect(&self, gateway: &ProviderGateway, target: &str) -> ConnectResult {
        let accounts_read_at = self.accounts_epoch();
        let accounts = match gateway.request_accounts().await {
            Ok(accounts) => accounts,
            Err(SessionError::UserDeclined) => {
                tracing::info!(network = target, "user declined wallet connection");
                return Ok(self.outcome_after_connect());
            }
            Err(err) => {
                tracing::warn!(%err, network = target, "wallet connection failed");
                return Err(err);
            }
        };

        let mut chain_read_at = self.chain_epoch();
        let mut chain_id = gateway.current_chain_id().await?;
        if self.inner.config.add_network_on_connect {
            if let Some(network) = self.inner.registry.resolve_by_name(target) {
                if network.chain_id != chain_id {
                    match gateway.add_network(network).await {
                        Ok(()) => {
                            chain_read_at = self.chain_epoch();
                            chain_id = gateway.current_chain_id().await?;
                        }
                        Err(err) => tracing::warn!(
                            %err,
                            network = %network.name,
                            "wallet did not add network"
                        ),
                    }
                }
            }
        }

        let (has_account, chain_applied) = self.update(|state| {
            let chain_applied = state.accept_chain(chain_read_at, chain_id);
            state.accept_accounts(accounts_read_at, accounts);
            (state.account.is_some(), chain_applied)
        });
        if chain_applied {
            self.log_chain(chain_id);
        }
        if has_account {
            self.refresh_balance().await;
        }
        Ok(self.outcome_after_connect())
    }

    /// Outcome as it will read once the connecting flag is cleared.
    fn outcome_after_connect(&self) -> ConnectOutcome {
        let state = self.lock();
        let connected = state.account.is_some() && state.chain_id.is_some();
        ConnectOutcome {
            connected,
            network_name: state.network_name.clone(),
        }
    }

    fn log_chain(&self, chain_id: u64) {
        match self.inner.registry.resolve_by_chain_id(chain_id) {
            Some(network) => {
                tracing::debug!(chain_id, network = %network.name, "wallet on supported network")
            }
            None => tracing::warn!(chain_id, "wallet is on an unsupported network"),
        }
    }

    /// Non-interactive startup probe: adopt accounts the wallet already
    /// exposes to this application, without prompting.
    pub async fn restore(&self) -> Result<Session> {
        let gateway = self.gateway()?.clone();
        let accounts_read_at = self.accounts_epoch();
        let accounts = gateway.current_accounts().await?;
        let chain_read_at = self.chain_epoch();
        let chain_id = gateway.current_chain_id().await?;
        let (has_account, chain_applied) = self.update(|state| {
            let chain_applied = state.accept_chain(chain_read_at, chain_id);
            state.accept_accounts(accounts_read_at, accounts);
            (state.account.is_some(), chain_applied)
        });
        if chain_applied {
            self.log_chain(chain_id);
        }
        if has_account {
            self.refresh_balance().await;
        }
        Ok(self.session())
    }

    /// Record a new account set. Returns whether an account is now active.
    pub(crate) fn apply_accounts(&self, accounts: Vec<Address>) -> bool {
        if accounts.is_empty() {
            tracing::info!("wallet exposes no accounts, session disconnected");
        }
        self.update(|state| {
            state.set_accounts(accounts);
            state.account.is_some()
        })
    }

    /// Record a chain change. Returns whether an account is active, in
    /// which case accounts must be re-discovered.
    pub(crate) fn record_chain(&self, chain_id: u64) -> bool {
        self.log_chain(chain_id);
        self.update(|state| {
            state.set_chain(chain_id);
            state.account.is_some()
        })
    }

    /// `accountsChanged` from the wallet.
    pub async fn handle_accounts_changed(&self, accounts: Vec<Address>) {
        if self.apply_accounts(accounts) {
            self.after_accounts_changed().await;
        }
    }

    pub(crate) async fn after_accounts_changed(&self) {
        let (chain_known, chain_read_at) = {
            let state = self.lock();
            (state.chain_id.is_some(), state.chain_epoch)
        };
        if !chain_known {
            let Ok(gateway) = self.gateway() else { return };
            match gateway.current_chain_id().await {
                Ok(chain_id) => {
                    if self.update(|state| state.accept_chain(chain_read_at, chain_id)) {
                        self.log_chain(chain_id);
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "could not read chain id after account change");
                    return;
                }
            }
        }
        self.refresh_balance().await;
    }

    /// `chainChanged` from the wallet.
    pub async fn handle_chain_changed(&self, chain_id: u64) {
        if self.record_chain(chain_id) {
            self.discover_accounts().await;
        }
    }

    /// Re-read the exposed accounts after a chain change.
    ///
    /// At most one pass runs at a time. A call made while a pass is in
    /// flight only marks that another pass is needed and returns.
    pub(crate) async fn discover_accounts(&self) {
        let Ok(gateway) = self.gateway().cloned() else { return };
        {
            let mut state = self.lock();
            if state.discovery_in_flight {
                state.discovery_pending = state.chain_id;
                tracing::debug!(
                    chain_id = ?state.chain_id,
                    "account discovery in flight, coalescing"
                );
                return;
            }
            state.discovery_in_flight = true;
        }
        let mut guard = DiscoveryGuard {
            manager: self,
            armed: true,
        };

        loop {
            let read_at = self.accounts_epoch();
            match gateway.current_accounts().await {
                Ok(accounts) => {
                    let active = self.update(|state| {
                        state.accept_accounts(read_at, accounts) && state.account.is_some()
                    });
                    if active {
                        self.refresh_balance().await;
                    }
                }
                Err(err) => tracing::warn!(%err, "account discovery failed"),
            }
            // The slot is released under the same lock that found no pending pass.
            let again = {
                let mut state = self.lock();
                let next = state.discovery_pending.take();
                if next.is_none() {
                    state.discovery_in_flight = false;
                }
                next
            };
            match again {
                Some(chain_id) => tracing::debug!(chain_id, "running coalesced account discovery"),
                None => break,
            }
        }
        guard.armed = false;
    }

    /// Refresh the balance of the session account on the session network.
    ///
    /// Failures keep the displayed balance; results older than the last
    /// applied fetch are discarded.
    pub async fn refresh_balance(&self) -> Option<String> {
        let balances = self.inner.balances.as_ref()?;
        let (seq, account, network) = {
            let mut state = self.lock();
            let account = state.account.clone()?;
            let network = self.inner.registry.resolve_by_name(&state.network_name)?.clone();
            state.balance_issued += 1;
            (state.balance_issued, account, network)
        };
        match balances.fetch(Some(&account), &network).await {
            Ok(display) => {
                self.apply_balance(seq, display.clone());
                Some(display)
            }
            Err(err) => {
                tracing::warn!(%err, account = %account, "balance refresh failed");
                None
            }
        }
    }

    /// Manual balance lookup for `address` on the session network.
    ///
    /// When `address` is the session account the result also updates the
    /// session, subject to the same staleness rule as automatic refreshes.
    pub async fn get_balance(&self, address: &Address) -> Result<String> {
        let balances = self
            .inner
            .balances
            .as_ref()
            .ok_or_else(|| SessionError::BalanceUnavailable("no balance source".to_string()))?;
        let (seq, network) = {
            let mut state = self.lock();
            let network = self
                .inner
                .registry
                .resolve_by_name(&state.network_name)
                .cloned()
                .ok_or_else(|| SessionError::UnsupportedNetwork(state.network_name.clone()))?;
            let seq = if state.account.as_ref() == Some(address) {
                state.balance_issued += 1;
                Some(state.balance_issued)
            } else {
                None
            };
            (seq, network)
        };
        let display = balances.fetch(Some(address), &network).await?;
        if let Some(seq) = seq {
            self.apply_balance(seq, display.clone());
        }
        Ok(display)
    }

    fn apply_balance(&self, seq: u64, display: String) {
        self.update(|state| {
            if seq > state.balance_applied {
                state.balance = display;
                state.balance_applied = seq;
            } else {
                tracing::debug!(seq, applied = state.balance_applied, "discarding stale balance");
            }
        });
    }

    /// Forward a transaction to the wallet for signing.
    ///
    /// Always resolves to a receipt or a descriptive failure; the session's
    /// account and network are untouched either way.
    pub async fn submit_transaction(
        &self,
        request: &TransactionRequest,
    ) -> core::result::Result<Receipt, TransactionFailure> {
        let gateway = self.gateway().map_err(TransactionFailure::from)?;
        TransactionSubmitter::new(gateway.clone()).submit(request).await
    }
}

/// Clears the connect bookkeeping if a leading `connect` future is dropped
/// before it settles. Attached callers then see the attempt as abandoned.
struct ConnectGuard<'a> {
    manager: &'a SessionManager,
    armed: bool,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.finish_connect();
        }
    }
}

/// Releases the discovery slot if a running pass is dropped.
struct DiscoveryGuard<'a> {
    manager: &'a SessionManager,
    armed: bool,
}

impl Drop for DiscoveryGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.manager.lock();
        state.discovery_in_flight = false;
        state.discovery_pending = None;
    }
}
