//! Session engine configuration.
//!
//! Defaults mirror the Moonbeam deployment. Environment variables override
//! individual fields so a deployment can retarget without a rebuild.

use std::env;

use serde::{Deserialize, Serialize};

use crate::registry::DEFAULT_SUPPORTED;

/// Network shown before any wallet has reported one.
pub const DEFAULT_NETWORK: &str = "Moonbase Alpha";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Initial `network_name` of the session.
    pub default_network: String,
    /// Allow-list offered to the user.
    pub supported_networks: Vec<String>,
    /// Ask the wallet to register the target network during `connect`.
    pub add_network_on_connect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            supported_networks: DEFAULT_SUPPORTED.iter().map(|s| s.to_string()).collect(),
            add_network_on_connect: true,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `WALLET_SESSION_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var("WALLET_SESSION_DEFAULT_NETWORK") {
            if !name.trim().is_empty() {
                config.default_network = name.trim().to_string();
            }
        }
        if let Ok(list) = env::var("WALLET_SESSION_SUPPORTED_NETWORKS") {
            let parsed: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !parsed.is_empty() {
                config.supported_networks = parsed;
            }
        }
        if let Ok(flag) = env::var("WALLET_SESSION_ADD_NETWORK") {
            config.add_network_on_connect = matches!(flag.trim(), "1" | "true" | "yes");
        }
        config
    }
}
