use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paging: PagingConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Where the spotifythings server listens.  Both `/api` and `/ws` live on
/// the same host and port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Page sizes used by the search view and the album/tag grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_track_page")]
    pub tracks: u32,
    #[serde(default = "default_album_page")]
    pub albums: u32,
    #[serde(default = "default_row_width")]
    pub grid_row_width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl ServerConfig {
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_base(&self) -> String {
        format!("http://{}", self.authority())
    }

    /// WebSocket URL for an endpoint such as `/ws/app`.
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.authority(), path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            tracks: default_track_page(),
            albums: default_album_page(),
            grid_row_width: default_row_width(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_host() -> String {
    platform::DEFAULT_SERVER_HOST.to_string()
}

fn default_port() -> u16 {
    platform::DEFAULT_SERVER_PORT
}

fn default_track_page() -> u32 {
    50
}

fn default_album_page() -> u32 {
    32
}

fn default_row_width() -> usize {
    4
}

fn default_log_filter() -> String {
    "info,hyper_util=warn,reqwest=warn,tungstenite=warn".to_string()
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
