//! Configuration management for sporlstats.
//!
//! This module loads configuration values from environment variables and the
//! `.env` file in the local data directory, and turns them into typed
//! settings for the Spotify client and for the listening history store.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults (where applicable)
//!
//! Parsing is done by `from_lookup` functions that take any key lookup, so the
//! rules can be exercised without touching the process environment.

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use chrono::TimeDelta;
use thiserror::Error;

use crate::{
    analysis::{AnalysisOptions, metrics::DEFAULT_TOP_ARTISTS, report::DEFAULT_REPORT_SNAPSHOTS},
    management::StoreOptions,
};

pub const APP_NAME: &str = "sporlstats";

const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_SCOPE: &str = "user-read-recently-played user-read-currently-playing user-top-read";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Returns the platform local data directory of the application.
///
/// - Linux: `~/.local/share/sporlstats`
/// - macOS: `~/Library/Application Support/sporlstats`
/// - Windows: `%LOCALAPPDATA%/sporlstats`
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_NAME);
    path
}

/// Location of the cached OAuth token.
pub fn token_path() -> PathBuf {
    data_dir().join("cache/token.json")
}

/// Default directory for exported reports.
pub fn export_dir() -> PathBuf {
    data_dir().join("exports")
}

/// Loads environment variables from the `.env` file in the local data directory.
///
/// Creates the data directory if it doesn't exist. A missing `.env` file is
/// not an error since every value can also come from the environment; a file
/// that exists but cannot be parsed is.
///
/// # Example
///
/// ```
/// use sporlstats::config;
///
/// #[tokio::main]
/// async fn main() {
///     if let Err(e) = config::load_env().await {
///         eprintln!("Configuration error: {}", e);
///     }
/// }
/// ```
pub async fn load_env() -> Result<(), String> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| e.to_string())?;

    let path = dir.join(".env");
    if !path.is_file() {
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| e.to_string())
}

/// Settings needed to talk to the Spotify Web API.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
    pub server_addr: SocketAddr,
}

impl SpotifyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the settings from a key lookup.
    ///
    /// Only `SPOTIFY_API_AUTH_CLIENT_ID` is required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let client_id = lookup("SPOTIFY_API_AUTH_CLIENT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("SPOTIFY_API_AUTH_CLIENT_ID"))?;

        let server_addr = value("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS);
        let server_addr =
            SocketAddr::from_str(&server_addr).map_err(|_| ConfigError::Invalid {
                key: "SERVER_ADDRESS",
                value: server_addr.clone(),
            })?;

        Ok(Self {
            client_id,
            redirect_uri: value("SPOTIFY_API_REDIRECT_URI", DEFAULT_REDIRECT_URI),
            scope: value("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            auth_url: value("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: value("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            api_url: value("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            server_addr,
        })
    }
}

/// Settings of the listening history store and the analysis commands.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryConfig {
    /// Owning account of the stored history (`SPOTIFY_USER_ID`).
    pub account: String,
    pub dedup_tolerance_secs: u32,
    pub write_retries: u32,
    pub report_snapshots: usize,
    pub window_days: u32,
    /// 0 means the whole history counts as known.
    pub discovery_horizon_days: u32,
    pub monitor_interval_secs: u64,
}

impl HistoryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let account = lookup("SPOTIFY_USER_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("SPOTIFY_USER_ID"))?;

        let config = Self {
            account,
            dedup_tolerance_secs: parsed_or(&lookup, "STORE_DEDUP_TOLERANCE_SECS", 2)?,
            write_retries: parsed_or(&lookup, "STORE_WRITE_RETRIES", 5)?,
            report_snapshots: parsed_or(&lookup, "REPORT_SNAPSHOTS", DEFAULT_REPORT_SNAPSHOTS)?,
            window_days: parsed_or(&lookup, "ANALYSIS_WINDOW_DAYS", 7)?,
            discovery_horizon_days: parsed_or(&lookup, "DISCOVERY_HORIZON_DAYS", 0)?,
            monitor_interval_secs: parsed_or(&lookup, "MONITOR_INTERVAL_SECS", 30)?,
        };

        if config.window_days == 0 {
            return Err(ConfigError::Invalid {
                key: "ANALYSIS_WINDOW_DAYS",
                value: "0".to_string(),
            });
        }
        if config.monitor_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "MONITOR_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            dedup_tolerance: TimeDelta::seconds(i64::from(self.dedup_tolerance_secs)),
            write_retries: self.write_retries,
        }
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            discovery_horizon: match self.discovery_horizon_days {
                0 => None,
                days => Some(TimeDelta::days(i64::from(days))),
            },
            top_artists: DEFAULT_TOP_ARTISTS,
        }
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

fn parsed_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}
