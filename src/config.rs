use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::confirm::ConfirmerConfig;

/// Blockchain network endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    /// When absent the chain id is resolved by asking the node.
    pub chain_id: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: None,
        }
    }
}

/// Top-level configuration: where to send transactions and how to confirm
/// them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub confirmer: ConfirmerConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.network.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.network.chain_id, None);
        assert_eq!(config.confirmer.confirmation_blocks, 2);
    }

    #[test]
    fn partial_sections_are_filled_in() {
        let config: AppConfig = toml::from_str(
            r#"
            [network]
            name = "sepolia"
            rpc_url = "https://rpc.sepolia.org"
            chain_id = 11155111

            [confirmer]
            workers = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.network.name, "sepolia");
        assert_eq!(config.network.chain_id, Some(11155111));
        assert_eq!(config.confirmer.workers, 4);
        assert_eq!(config.confirmer.timeout_secs, 60);
    }
}
