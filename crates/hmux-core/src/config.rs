use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transfer::TransferOptions;

/// TLS settings applied to every transfer (optional section in config.toml).
///
/// Verification is off by default to match the engine's historical behavior;
/// hosts that need strict validation turn both flags on here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Verify the server certificate chain.
    #[serde(default)]
    pub verify_peer: bool,
    /// Verify that the certificate matches the host name.
    #[serde(default)]
    pub verify_host: bool,
    /// Optional CA bundle used when `verify_peer` is on.
    #[serde(default)]
    pub ca_info: Option<PathBuf>,
}

/// Engine configuration loaded from `~/.config/hmux/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Total timeout in milliseconds used when the host does not pass one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Fixed connect timeout in milliseconds. None = half of the total timeout.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Follow HTTP redirects.
    #[serde(default = "default_follow_redirects")]
    pub follow_redirects: bool,
    /// Maximum redirects to follow (None = libcurl default).
    #[serde(default)]
    pub max_redirections: Option<u32>,
    /// Cap on open connections across all transfers of a context (None = unlimited).
    #[serde(default)]
    pub max_total_connections: Option<usize>,
    /// Cap on open connections per host (None = unlimited).
    #[serde(default)]
    pub max_host_connections: Option<usize>,
    #[serde(default)]
    pub tls: TlsConfig,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_follow_redirects() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            connect_timeout_ms: None,
            follow_redirects: default_follow_redirects(),
            max_redirections: None,
            max_total_connections: None,
            max_host_connections: None,
            tls: TlsConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Per-transfer options for a request with the given total timeout.
    pub fn transfer_options(&self, timeout_ms: u64) -> TransferOptions {
        TransferOptions {
            timeout: Duration::from_millis(timeout_ms),
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            verify_peer: self.tls.verify_peer,
            verify_host: self.tls.verify_host,
            ca_info: self.tls.ca_info.clone(),
            follow_redirects: self.follow_redirects,
            max_redirections: self.max_redirections,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hmux")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    load_or_init_at(&config_path()?)
}

/// Like [`load_or_init`] but at an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: EngineConfig = toml::from_str(&data)?;
    Ok(cfg)
}
