//! Node configuration, read from `disco.toml` in the data directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use disco_net::{ServerConfig, DEFAULT_LISTEN_ADDR, DEFAULT_TIMEOUT};
use disco_pair::JoinConfig;

use crate::error::{DiscoError, Result};

pub const APP_NAME: &str = "disco";
pub const CONFIG_FILE_NAME: &str = "disco.toml";
pub const CATALOG_FILE_NAME: &str = "disco.db";
pub const STORE_FILE_NAME: &str = "store.db";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const HOUR: Duration = Duration::from_secs(60 * 60);

/// `$XDG_DATA_HOME/disco`, or its platform equivalent.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_NAME))
}

/// Settings of one node. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address `serve` binds when `--address` is not given.
    pub listen_addr: String,
    /// Name peers verify the server certificate against. Fixed at `init`.
    pub server_san: String,
    /// Validity of client certificates issued to joining nodes.
    #[serde(with = "humantime_serde")]
    pub client_cert_ttl: Duration,
    /// Validity of the server certificate minted at every start.
    #[serde(with = "humantime_serde")]
    pub server_cert_ttl: Duration,
    /// Default validity of new invitations.
    #[serde(with = "humantime_serde")]
    pub invite_ttl: Duration,
    pub log_level: String,
    /// Timeout of requests to remote nodes.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            server_san: "localhost".to_string(),
            client_cert_ttl: DAY,
            server_cert_ttl: DAY,
            invite_ttl: HOUR,
            log_level: "info".to_string(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl NodeConfig {
    /// Load the config at `path`, falling back to defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|source| DiscoError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the config to `path` unless a file is already there.
    pub fn write_if_absent(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn server_config(&self, listen_addr: Option<&str>) -> ServerConfig {
        ServerConfig {
            listen_addr: listen_addr.unwrap_or(&self.listen_addr).to_string(),
            server_cert_ttl: self.server_cert_ttl,
        }
    }

    pub fn join_config(&self) -> JoinConfig {
        JoinConfig {
            client_cert_ttl: self.client_cert_ttl,
        }
    }
}
