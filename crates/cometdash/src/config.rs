use crate::governance::proposals::DEFAULT_PAGE_SIZE;
use crate::paths::DashPaths;
use crate::registry::networks;
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Chain used when neither the CLI nor the node says otherwise.
    pub default_chain_id: u64,
    /// JSON-RPC endpoints keyed by decimal chain id (`"1"`, `"137"`).
    pub urls: BTreeMap<String, String>,
    pub timeout_seconds: u64,
    /// How long a submitted transaction may stay unmined before it counts as failed.
    pub receipt_timeout_seconds: u64,
}

/// Default endpoint per supported chain.
const DEFAULT_RPC_URLS: &[(u64, &str)] = &[
    (networks::ETHEREUM_MAINNET, "https://eth.llamarpc.com"),
    (networks::POLYGON, "https://polygon.llamarpc.com"),
    (networks::ARBITRUM, "https://arbitrum.llamarpc.com"),
    (networks::AVALANCHE, "https://avalanche-c-chain.llamarpc.com"),
    (networks::BSC, "https://bsc.llamarpc.com"),
];

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            default_chain_id: networks::ETHEREUM_MAINNET,
            urls: DEFAULT_RPC_URLS
                .iter()
                .map(|(id, url)| (id.to_string(), (*url).to_owned()))
                .collect(),
            timeout_seconds: 20,
            receipt_timeout_seconds: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub proposals_per_page: u64,
    pub gas_refresh_seconds: u64,
    /// Chain id poll period in watch mode.
    pub watch_poll_seconds: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            proposals_per_page: DEFAULT_PAGE_SIZE,
            gas_refresh_seconds: 60,
            watch_poll_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Environment variable holding a hex signing key. Without one the wallet is read-only.
    pub private_key_env: Option<String>,
    /// Account shown when no signing key is available.
    pub watch_address: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: Some("COMETDASH_PRIVATE_KEY".into()),
            watch_address: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub rpc: RpcConfig,
    pub ui: UiConfig,
    pub wallet: WalletConfig,
}

impl DashConfig {
    /// Read `config.toml` from the config dir. A missing file means defaults; nothing is
    /// written.
    pub fn load(paths: &DashPaths) -> eyre::Result<Self> {
        let path = paths.config_file();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn rpc_url_for(&self, chain_id: u64) -> Option<&str> {
        self.rpc.urls.get(&chain_id.to_string()).map(String::as_str)
    }

    pub const fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_seconds)
    }

    pub const fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.receipt_timeout_seconds)
    }

    /// Never zero: the watch loop's timers need a positive period.
    pub fn gas_refresh(&self) -> Duration {
        Duration::from_secs(self.ui.gas_refresh_seconds.max(1))
    }

    pub fn watch_poll(&self) -> Duration {
        Duration::from_secs(self.ui.watch_poll_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_proxy_chain() {
        let cfg = DashConfig::default();
        for chain in [1_u64, 137, 42161, 43114, 56] {
            assert!(cfg.rpc_url_for(chain).is_some(), "missing rpc url for {chain}");
        }
        assert_eq!(cfg.ui.proposals_per_page, 10);
        assert_eq!(cfg.gas_refresh(), Duration::from_secs(60));
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = DashPaths::at(dir.path().join("cfg"), dir.path().join("data"));
        std::fs::create_dir_all(&paths.config_dir)?;
        std::fs::write(
            paths.config_file(),
            "[rpc.urls]\n\"1\" = \"http://127.0.0.1:8545\"\n\n[ui]\nproposals_per_page = 5\n",
        )?;
        let cfg = DashConfig::load(&paths)?;
        assert_eq!(cfg.rpc_url_for(1), Some("http://127.0.0.1:8545"));
        assert_eq!(cfg.rpc_url_for(137), None, "a urls table replaces the default map");
        assert_eq!(cfg.ui.proposals_per_page, 5);
        assert_eq!(cfg.ui.gas_refresh_seconds, 60);
        assert_eq!(cfg.wallet, WalletConfig::default());
        Ok(())
    }

    #[test]
    fn zero_watch_periods_clamp_to_one_second() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = DashPaths::at(dir.path().to_path_buf(), dir.path().to_path_buf());
        std::fs::write(
            paths.config_file(),
            "[ui]\ngas_refresh_seconds = 0\nwatch_poll_seconds = 0\n",
        )?;
        let cfg = DashConfig::load(&paths)?;
        assert_eq!(cfg.ui.gas_refresh_seconds, 0, "the file value is kept as written");
        assert_eq!(cfg.gas_refresh(), Duration::from_secs(1));
        assert_eq!(cfg.watch_poll(), Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn missing_file_is_default() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = DashPaths::at(dir.path().to_path_buf(), dir.path().to_path_buf());
        assert_eq!(DashConfig::load(&paths)?, DashConfig::default());
        Ok(())
    }

    #[test]
    fn malformed_file_is_an_error() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = DashPaths::at(dir.path().to_path_buf(), dir.path().to_path_buf());
        std::fs::write(paths.config_file(), "[ui\nbroken")?;
        let err = DashConfig::load(&paths).err().map(|e| format!("{e:#}"));
        assert!(err.is_some_and(|e| e.contains("parse")), "parse error expected");
        Ok(())
    }
}
