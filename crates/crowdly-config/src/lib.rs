//! Configuration and token persistence for the Crowdly dashboard.
//!
//! TOML config file + `CROWDLY_*` environment overrides, resolved via
//! XDG / platform conventions, plus a small file-backed store for the
//! session bearer token so a restart can resume without re-login.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod token;

pub use token::TokenStore;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// Top-level TOML configuration for the dashboard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Analytics backend base URL (e.g., "https://analytics.example.com").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Realtime channel URL. Derived from `base_url` when absent.
    pub ws_url: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Dashboard auto-refresh interval in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_refresh_interval() -> u64 {
    60
}

impl Config {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn refresh_interval_duration(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }

    /// Resolve the realtime channel URL: explicit `ws_url` wins,
    /// otherwise `base_url` with its scheme swapped to ws(s).
    pub fn resolved_ws_url(&self) -> Result<url::Url, ConfigError> {
        if let Some(ref ws) = self.ws_url {
            return ws.parse().map_err(|_| ConfigError::Validation {
                field: "ws_url".into(),
                reason: format!("invalid URL: {ws}"),
            });
        }

        let mut url: url::Url = self.base_url.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {}", self.base_url),
        })?;

        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("cannot derive websocket scheme from: {}", self.base_url),
        })?;
        Ok(url)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "crowdly", "crowdly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Resolve the data directory (token file, logs).
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("com", "crowdly", "crowdly")
        .map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("crowdly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// Precedence (lowest to highest): built-in defaults, the TOML file,
/// then `CROWDLY_*` environment variables (e.g. `CROWDLY_BASE_URL`).
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CROWDLY_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning built-in defaults when no file exists.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────
