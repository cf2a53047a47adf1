use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::etherscan::{CacheBackend, Client, Network};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Etherscan API key. Usually left out of the file and taken from
    /// `ETHERSCAN_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Seconds a cached response stays valid
    pub expire_after_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            expire_after_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {:?}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {:?}: {}", path, e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    anyhow!("Failed to create config directory {:?}: {}", parent, e)
                })?;
            }
        }

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {:?}: {}", path, e))?;

        Ok(())
    }

    /// Load configuration with fallback to default
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Self {
        let mut config = match path {
            Some(path) => match Self::load_from_file(path).await {
                Ok(config) => {
                    tracing::info!("Loaded configuration from file");
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load config file, using defaults: {}", e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env_vars();
        config
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_vars(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = lookup("ETHERSCAN_API_KEY") {
            tracing::debug!("Using ETHERSCAN_API_KEY environment variable");
            self.api_key = Some(api_key);
        }

        if let Some(network) = lookup("ETHERSCAN_NETWORK") {
            match network.parse() {
                Ok(network) => self.network = network,
                Err(e) => tracing::warn!("Ignoring ETHERSCAN_NETWORK: {}", e),
            }
        }
    }

    /// Build a client from this configuration
    pub fn client(&self) -> Result<Client> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            anyhow!("No API key configured. Set ETHERSCAN_API_KEY or `api_key` in the config file")
        })?;

        let client = Client::builder(api_key)
            .network(self.network)
            .cache_backend(self.cache.backend.clone())
            .expire_after(Duration::from_secs(self.cache.expire_after_secs))
            .build()?;

        Ok(client)
    }

    /// Get default config file path
    pub fn default_config_path() -> Result<std::path::PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("etherscan-client").join("config.toml"))
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let sample_config = r#"# Etherscan client configuration file

# API key, better provided through the ETHERSCAN_API_KEY environment variable
# api_key = "YOUR_API_KEY_HERE"

# One of: mainnet, ropsten, kovan, rinkeby
network = "mainnet"

[cache]
expire_after_secs = 5

# Where responses are cached: "disabled", "memory", "file" or "sqlite".
# The file backend takes `dir` instead of `path`.
[cache.backend]
type = "sqlite"
path = "/tmp/etherscan_cache.sqlite"

# Environment variables that can be used:
# ETHERSCAN_API_KEY - Your Etherscan API key
# ETHERSCAN_NETWORK - Overrides `network`
"#;
        sample_config.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::generate_sample()).unwrap();

        assert_eq!(config.api_key, None);
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.cache.expire_after_secs, 5);
        assert_eq!(
            config.cache.backend,
            CacheBackend::Sqlite {
                path: PathBuf::from("/tmp/etherscan_cache.sqlite")
            }
        );
    }

    #[test]
    fn test_file_backend_parses() {
        let config: Config =
            toml::from_str("[cache]\nexpire_after_secs = 5\n[cache.backend]\ntype = \"file\"\ndir = \"/var/cache/es\"")
                .unwrap();

        assert_eq!(
            config.cache.backend,
            CacheBackend::File {
                dir: PathBuf::from("/var/cache/es")
            }
        );
    }

    #[test]
    fn test_unknown_network_is_rejected() {
        let result: Result<Config, _> = toml::from_str("network = \"goerli\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_cache_backend_is_rejected() {
        let result: Result<Config, _> =
            toml::from_str("[cache]\nexpire_after_secs = 5\n[cache.backend]\ntype = \"redis\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|name| match name {
            "ETHERSCAN_API_KEY" => Some("secret".to_string()),
            "ETHERSCAN_NETWORK" => Some("rinkeby".to_string()),
            _ => None,
        });

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.network, Network::Rinkeby);

        config.apply_overrides(|name| (name == "ETHERSCAN_NETWORK").then(|| "moon".to_string()));
        assert_eq!(config.network, Network::Rinkeby);
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(Config::default().client().is_err());

        let config = Config {
            api_key: Some("key".to_string()),
            network: Network::Kovan,
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                expire_after_secs: 5,
            },
        };
        let client = config.client().unwrap();
        assert_eq!(client.url(), "https://api-kovan.etherscan.io/api");
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            api_key: None,
            network: Network::Ropsten,
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                expire_after_secs: 30,
            },
        };
        config.save_to_file(&path).await.unwrap();

        let loaded = Config::load_from_file(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_or_default_falls_back() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load_or_default(Some(temp_dir.path().join("missing.toml"))).await;

        assert_eq!(config.network, Network::Mainnet);
    }
}
