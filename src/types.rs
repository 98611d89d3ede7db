//! Core types for the wallet session engine.
//!
//! Everything here is a plain value: networks are immutable descriptors,
//! sessions are read-only snapshots, and transaction requests live only for
//! the duration of one submission.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha3::{Digest, Keccak256};

use crate::error::{Result, SessionError};
use crate::utils::{encode_data, parse_decimal_uint, to_quantity, NATIVE_DECIMALS};

/// An account address as reported by the wallet agent.
///
/// The original spelling is kept for display, but equality and hashing are
/// case-insensitive since the network treats addresses that way.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse a `0x`-prefixed 20-byte hex address.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| SessionError::InvalidAddress(input.to_string()))?;
        if digits.len() != 40 || hex::decode(digits).is_err() {
            return Err(SessionError::InvalidAddress(input.to_string()));
        }
        Ok(Self(format!("0x{}", digits)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used for comparison and RPC params.
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// EIP-55 mixed-case checksum rendering.
    pub fn to_checksum(&self) -> String {
        let lower = self.normalized();
        let digits = &lower[2..];
        let hash = Keccak256::digest(digits.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in digits.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl core::str::FromStr for Address {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        Address::parse(s)
    }
}

/// Native currency metadata announced to the wallet agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

fn default_decimals() -> u32 {
    NATIVE_DECIMALS
}

impl NativeCurrency {
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals: NATIVE_DECIMALS,
        }
    }
}

/// A network descriptor. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub currency: NativeCurrency,
}

impl Network {
    pub fn new(name: &str, chain_id: u64, rpc_url: &str, currency: NativeCurrency) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            rpc_url: rpc_url.to_string(),
            explorer_url: None,
            currency,
        }
    }

    pub fn with_explorer(mut self, url: &str) -> Self {
        self.explorer_url = Some(url.to_string());
        self
    }

    /// Chain id in the `0x`-hex form wallet agents expect.
    pub fn chain_id_hex(&self) -> String {
        to_quantity(self.chain_id as u128)
    }

    /// `wallet_addEthereumChain` parameter object.
    pub fn add_chain_params(&self) -> Value {
        let mut params = json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.currency.name,
                "symbol": self.currency.symbol,
                "decimals": self.currency.decimals,
            },
            "rpcUrls": [self.rpc_url],
        });
        if let Some(explorer) = &self.explorer_url {
            params["blockExplorerUrls"] = json!([explorer]);
        }
        params
    }
}

/// Connection status of the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    ConnectedWrongNetwork,
}

impl ConnectionStatus {
    /// True for both connected variants.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected | ConnectionStatus::ConnectedWrongNetwork)
    }
}

/// Read-only snapshot of the reconciled wallet session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub account: Option<Address>,
    pub network_name: String,
    pub status: ConnectionStatus,
    pub balance_display: String,
}

impl Session {
    pub fn disconnected(network_name: &str) -> Self {
        Self {
            account: None,
            network_name: network_name.to_string(),
            status: ConnectionStatus::Disconnected,
            balance_display: String::new(),
        }
    }
}

/// Result of a `connect` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOutcome {
    pub connected: bool,
    pub network_name: String,
}

/// A transaction to forward to the wallet agent for signing.
///
/// `value` and `gas` are unsigned decimal integers in the smallest unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub value: String,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub gas: Option<String>,
}

impl TransactionRequest {
    pub fn new(from: Address, to: Address, value: &str) -> Self {
        Self {
            from,
            to,
            value: value.to_string(),
            data: None,
            gas: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_gas(mut self, gas: &str) -> Self {
        self.gas = Some(gas.to_string());
        self
    }

    /// Encode as the `eth_sendTransaction` parameter object.
    ///
    /// Fails on malformed decimal quantities so they never reach the wallet.
    pub fn to_rpc_object(&self) -> Result<Value> {
        let mut obj = Map::new();
        obj.insert("from".into(), Value::String(self.from.normalized()));
        obj.insert("to".into(), Value::String(self.to.normalized()));
        let value = parse_decimal_uint(&self.value)?;
        obj.insert("value".into(), Value::String(to_quantity(value)));
        if let Some(gas) = &self.gas {
            let gas = parse_decimal_uint(gas)?;
            obj.insert("gas".into(), Value::String(to_quantity(gas)));
        }
        if let Some(data) = &self.data {
            obj.insert("data".into(), Value::String(encode_data(data)));
        }
        Ok(Value::Object(obj))
    }
}

/// Acknowledgement of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_hash: String,
    pub from: Address,
    pub to: Address,
    pub value: String,
}
