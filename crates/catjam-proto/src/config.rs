use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: SettingsSourceConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// Where the add-on settings snapshot is fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSourceConfig {
    #[serde(default = "default_handle_url")]
    pub handle_url: String,
    #[serde(default = "default_addon_name")]
    pub addon_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Settings refresh + full overlay pass.
    #[serde(default = "default_slow_interval_ms")]
    pub slow_interval_ms: u64,
    /// Gating, reposition and play/pause resync.
    #[serde(default = "default_fast_interval_ms")]
    pub fast_interval_ms: u64,
    #[serde(default = "default_debug_log")]
    pub debug_log: bool,
    #[serde(default = "default_debug_log_interval_ms")]
    pub debug_log_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Asset used when the add-on settings carry no custom URL.
    #[serde(default = "default_asset_url")]
    pub default_asset_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Page source for the harness.  Without a fixture the daemon drives an
/// empty page, which keeps the overlay removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,
}

impl Default for SettingsSourceConfig {
    fn default() -> Self {
        Self {
            handle_url: default_handle_url(),
            addon_name: default_addon_name(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slow_interval_ms: default_slow_interval_ms(),
            fast_interval_ms: default_fast_interval_ms(),
            debug_log: default_debug_log(),
            debug_log_interval_ms: default_debug_log_interval_ms(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            default_asset_url: default_asset_url(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_handle_url() -> String {
    "http://localhost:2007/get_handle".to_string()
}

fn default_addon_name() -> String {
    "CatJamSynced".to_string()
}

fn default_slow_interval_ms() -> u64 {
    2000
}

fn default_fast_interval_ms() -> u64 {
    250
}

fn default_debug_log() -> bool {
    true
}

fn default_debug_log_interval_ms() -> u64 {
    2000
}

fn default_asset_url() -> String {
    "catjam.webm".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8990
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
