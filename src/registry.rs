//! Network registry.
//!
//! Static bidirectional mapping between chain ids and network descriptors,
//! plus the allow-list of networks a user may pick. Read-only after
//! construction, so it is shared behind an `Arc` without locking.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Result, SessionError};
use crate::types::{NativeCurrency, Network};
use crate::utils::MAX_DECIMALS;

/// Moonbase Alpha testnet chain id
pub const MOONBASE_ALPHA_CHAIN_ID: u64 = 1287;

/// Local Moonbeam development node chain id
pub const MOONBEAM_DEV_CHAIN_ID: u64 = 1281;

/// Networks the user may select, by default.
pub const DEFAULT_SUPPORTED: [&str; 3] = ["Moonbase Alpha", "Moonriver", "Moonbeam"];

#[derive(Clone, Debug)]
pub struct NetworkRegistry {
    by_chain_id: BTreeMap<u64, Network>,
    by_name: BTreeMap<String, u64>,
    supported: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    networks: Vec<Network>,
    #[serde(default)]
    supported: Option<Vec<String>>,
}

impl NetworkRegistry {
    /// Build a registry. Chain ids and names must both be unique, and a
    /// currency may have at most [`MAX_DECIMALS`] decimals.
    pub fn new(networks: Vec<Network>, supported: Vec<String>) -> Result<Self> {
        let mut by_chain_id = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for network in networks {
            if by_name.contains_key(&network.name) {
                return Err(SessionError::Config(format!(
                    "duplicate network name: {}",
                    network.name
                )));
            }
            if by_chain_id.contains_key(&network.chain_id) {
                return Err(SessionError::Config(format!(
                    "duplicate chain id: {}",
                    network.chain_id
                )));
            }
            if network.currency.decimals > MAX_DECIMALS {
                return Err(SessionError::Config(format!(
                    "{} decimals for {} exceed {}",
                    network.currency.decimals, network.name, MAX_DECIMALS
                )));
            }
            by_name.insert(network.name.clone(), network.chain_id);
            by_chain_id.insert(network.chain_id, network);
        }
        Ok(Self {
            by_chain_id,
            by_name,
            supported,
        })
    }

    /// The built-in Moonbeam deployment.
    pub fn moonbeam() -> Self {
        let dev = NativeCurrency::new("DEV", "DEV");
        let mut by_chain_id = BTreeMap::new();
        let mut by_name = BTreeMap::new();
        for network in [
            Network::new(
                "Moonbase Alpha",
                MOONBASE_ALPHA_CHAIN_ID,
                "https://rpc.testnet.moonbeam.network",
                dev.clone(),
            )
            .with_explorer("https://moonbase-blockscout.testnet.moonbeam.network/"),
            Network::new("Moonbeam Dev", MOONBEAM_DEV_CHAIN_ID, "http://127.0.0.1:9933", dev),
        ] {
            by_name.insert(network.name.clone(), network.chain_id);
            by_chain_id.insert(network.chain_id, network);
        }
        Self {
            by_chain_id,
            by_name,
            supported: DEFAULT_SUPPORTED.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Load from JSON: `{"networks": [...], "supported": [...]}`.
    ///
    /// Without a `supported` list every registered network is selectable.
    pub fn from_json(input: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(input)
            .map_err(|e| SessionError::Config(format!("invalid registry: {}", e)))?;
        let supported = match file.supported {
            Some(list) => list,
            None => file.networks.iter().map(|n| n.name.clone()).collect(),
        };
        Self::new(file.networks, supported)
    }

    /// Replace the allow-list.
    pub fn with_supported(mut self, supported: Vec<String>) -> Self {
        self.supported = supported;
        self
    }

    /// Exact match on chain id; `None` means "not one of our networks".
    pub fn resolve_by_chain_id(&self, chain_id: u64) -> Option<&Network> {
        self.by_chain_id.get(&chain_id)
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<&Network> {
        self.by_name
            .get(name)
            .and_then(|id| self.by_chain_id.get(id))
    }

    /// Membership in the allow-list, which may name networks absent from
    /// the registry.
    pub fn is_supported(&self, name: &str) -> bool {
        self.supported.iter().any(|s| s == name)
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.by_chain_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_chain_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chain_id.is_empty()
    }
}
