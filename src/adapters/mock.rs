//! In-memory wallet agent.
//!
//! Scriptable stand-in for a browser wallet: fixed accounts and chain,
//! declined or failing prompts, held requests that resolve only when the
//! test releases them, per-method call counts and synthetic events.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use tokio::sync::oneshot;

use super::{methods, WalletEvent, WalletEventHandler, WalletProvider};
use crate::error::{ProviderError, METHOD_NOT_FOUND_CODE};
use crate::listeners::{Listeners, Subscription};
use crate::utils::{parse_chain_id, to_quantity};

/// EIP-1193 code for a request from an account the user never exposed.
pub const UNAUTHORIZED_CODE: i64 = 4100;

/// A request parked until [`Hold::release`] is called or the hold is dropped.
#[must_use]
pub struct Hold {
    tx: Option<oneshot::Sender<()>>,
}

impl Hold {
    pub fn release(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

struct MockState {
    compatible: bool,
    accounts: Vec<String>,
    authorized: bool,
    chain_id: u64,
    legacy_chain_id: bool,
    decline_prompts: bool,
    prompt_failure: Option<ProviderError>,
    add_network_failure: Option<ProviderError>,
    switch_on_add: bool,
    balance_failure: Option<ProviderError>,
    send_failure: Option<ProviderError>,
    balances: HashMap<String, u128>,
    holds: HashMap<String, VecDeque<oneshot::Receiver<()>>>,
    calls: HashMap<String, usize>,
    added_networks: Vec<Value>,
    sent: Vec<Value>,
    tx_nonce: u64,
}

pub struct MockWallet {
    state: Mutex<MockState>,
    listeners: Listeners<WalletEvent>,
}

impl MockWallet {
    /// A compatible wallet on `chain_id` with no accounts.
    pub fn new(chain_id: u64) -> Self {
        Self {
            state: Mutex::new(MockState {
                compatible: true,
                accounts: Vec::new(),
                authorized: false,
                chain_id,
                legacy_chain_id: false,
                decline_prompts: false,
                prompt_failure: None,
                add_network_failure: None,
                switch_on_add: true,
                balance_failure: None,
                send_failure: None,
                balances: HashMap::new(),
                holds: HashMap::new(),
                calls: HashMap::new(),
                added_networks: Vec::new(),
                sent: Vec::new(),
                tx_nonce: 0,
            }),
            listeners: Listeners::new(),
        }
    }

    /// Some other injected agent that is not a usable wallet.
    pub fn incompatible() -> Self {
        let wallet = Self::new(1);
        wallet.state().compatible = false;
        wallet
    }

    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        self.set_accounts(accounts);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        self.state().accounts = accounts.iter().map(|a| a.to_string()).collect();
    }

    /// Mark the accounts as already exposed, as after an earlier session.
    pub fn authorize(&self) {
        self.state().authorized = true;
    }

    /// Change chain silently.
    pub fn set_chain_id(&self, chain_id: u64) {
        self.state().chain_id = chain_id;
    }

    /// Change chain and emit `chainChanged`, as a user switching in the wallet.
    pub fn switch_chain(&self, chain_id: u64) {
        self.set_chain_id(chain_id);
        self.emit_chain_changed(&to_quantity(chain_id as u128));
    }

    pub fn emit_accounts_changed(&self, accounts: &[&str]) {
        let event = WalletEvent::AccountsChanged(accounts.iter().map(|a| a.to_string()).collect());
        self.listeners.emit(&event);
    }

    pub fn emit_chain_changed(&self, chain_id: &str) {
        self.listeners.emit(&WalletEvent::ChainChanged(chain_id.to_string()));
    }

    pub fn decline_prompts(&self, decline: bool) {
        self.state().decline_prompts = decline;
    }

    pub fn fail_prompts(&self, failure: Option<ProviderError>) {
        self.state().prompt_failure = failure;
    }

    pub fn fail_add_network(&self, failure: Option<ProviderError>) {
        self.state().add_network_failure = failure;
    }

    /// Whether `wallet_addEthereumChain` also moves the wallet onto that chain.
    pub fn set_switch_on_add(&self, switch: bool) {
        self.state().switch_on_add = switch;
    }

    /// Answer `eth_chainId` with method-not-found.
    pub fn set_legacy_chain_id(&self, legacy: bool) {
        self.state().legacy_chain_id = legacy;
    }

    pub fn set_balance(&self, address: &str, wei: u128) {
        self.state().balances.insert(address.to_ascii_lowercase(), wei);
    }

    pub fn fail_balance(&self, failure: Option<ProviderError>) {
        self.state().balance_failure = failure;
    }

    pub fn fail_send(&self, failure: Option<ProviderError>) {
        self.state().send_failure = failure;
    }

    /// Park the next call to `method` until the returned hold is released.
    ///
    /// The response is computed when the call arrives; only its delivery
    /// is delayed.
    pub fn hold(&self, method: &str) -> Hold {
        let (tx, rx) = oneshot::channel();
        self.state()
            .holds
            .entry(method.to_string())
            .or_default()
            .push_back(rx);
        Hold { tx: Some(tx) }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    pub fn chain_id(&self) -> u64 {
        self.state().chain_id
    }

    pub fn added_networks(&self) -> Vec<Value> {
        self.state().added_networks.clone()
    }

    pub fn sent_transactions(&self) -> Vec<Value> {
        self.state().sent.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Compute the answer for `method`. Events to emit are returned rather
    /// than emitted so no listener runs under the state lock.
    fn respond(
        &self,
        method: &str,
        params: &Value,
    ) -> (Result<Value, ProviderError>, Option<WalletEvent>) {
        let mut state = self.state();
        match method {
            methods::REQUEST_ACCOUNTS => {
                if state.decline_prompts {
                    return (Err(ProviderError::user_rejected()), None);
                }
                if let Some(err) = state.prompt_failure.clone() {
                    return (Err(err), None);
                }
                state.authorized = true;
                (Ok(json!(state.accounts)), None)
            }
            methods::ACCOUNTS => {
                let exposed: Vec<String> = if state.authorized {
                    state.accounts.clone()
                } else {
                    Vec::new()
                };
                (Ok(json!(exposed)), None)
            }
            methods::CHAIN_ID => {
                if state.legacy_chain_id {
                    let err = ProviderError::new(
                        METHOD_NOT_FOUND_CODE,
                        "the method eth_chainId does not exist",
                    );
                    return (Err(err), None);
                }
                (Ok(json!(to_quantity(state.chain_id as u128))), None)
            }
            methods::NET_VERSION => (Ok(json!(state.chain_id.to_string())), None),
            methods::GET_BALANCE => {
                if let Some(err) = state.balance_failure.clone() {
                    return (Err(err), None);
                }
                let address = params[0].as_str().unwrap_or_default().to_ascii_lowercase();
                let wei = state.balances.get(&address).copied().unwrap_or(0);
                (Ok(json!(to_quantity(wei))), None)
            }
            methods::SEND_TRANSACTION => {
                if let Some(err) = state.send_failure.clone() {
                    return (Err(err), None);
                }
                let tx = params[0].clone();
                let from = tx["from"].as_str().unwrap_or_default();
                let known = state.authorized
                    && state.accounts.iter().any(|a| a.eq_ignore_ascii_case(from));
                if !known {
                    return (
                        Err(ProviderError::new(
                            UNAUTHORIZED_CODE,
                            "The requested account and/or method has not been authorized by the user.",
                        )),
                        None,
                    );
                }
                state.tx_nonce += 1;
                let mut hasher = Keccak256::new();
                hasher.update(tx.to_string().as_bytes());
                hasher.update(state.tx_nonce.to_be_bytes());
                let hash = format!("0x{}", hex::encode(hasher.finalize()));
                state.sent.push(tx);
                (Ok(json!(hash)), None)
            }
            methods::ADD_CHAIN => {
                if let Some(err) = state.add_network_failure.clone() {
                    return (Err(err), None);
                }
                let chain = params[0].clone();
                let requested = chain["chainId"].as_str().and_then(|s| parse_chain_id(s).ok());
                state.added_networks.push(chain);
                match requested {
                    Some(id) if state.switch_on_add && id != state.chain_id => {
                        state.chain_id = id;
                        (
                            Ok(Value::Null),
                            Some(WalletEvent::ChainChanged(to_quantity(id as u128))),
                        )
                    }
                    _ => (Ok(Value::Null), None),
                }
            }
            other => (
                Err(ProviderError::new(
                    METHOD_NOT_FOUND_CODE,
                    format!("the method {} does not exist", other),
                )),
                None,
            ),
        }
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn is_compatible(&self) -> bool {
        self.state().compatible
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let hold = {
            let mut state = self.state();
            *state.calls.entry(method.to_string()).or_default() += 1;
            state.holds.get_mut(method).and_then(|queue| queue.pop_front())
        };
        let (result, event) = self.respond(method, &params);
        if let Some(event) = event {
            self.listeners.emit(&event);
        }
        if let Some(hold) = hold {
            // A dropped hold releases the call as well.
            let _ = hold.await;
        }
        result
    }

    fn subscribe(&self, handler: WalletEventHandler) -> Subscription {
        self.listeners.subscribe(move |event| handler(event))
    }
}
