// OfflineHLS - Persistent HLS downloads with offline content keys
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Runtime configuration
//!
//! Configuration is plain serde data so it can be loaded from a JSON file
//! shipped with the host application, or assembled in code through
//! [`VaultConfig::builder`]. Endpoint URLs are kept as strings and parsed by
//! [`VaultConfig::validate`], which every service constructor calls.
//!
//! ```json
//! {
//!   "license": {
//!     "license_url": "https://license.example.com/fairplay/license",
//!     "certificate_url": "https://license.example.com/fairplay/cert",
//!     "cache_version": "1",
//!     "session": { "userId": "u", "sessionId": "s", "merchant": "m" }
//!   },
//!   "downloads": { "downloads_root": "/var/mobile/Downloads" }
//! }
//! ```

use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Scheme used by key URLs in protected playlists (`skd://<content id>`)
pub const DEFAULT_KEY_SCHEME: &str = "skd";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default capacity of the download event channel
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Static session-auth fields sent in the `dt-custom-data` header.
///
/// These are supplied by configuration. A real deployment must issue them per
/// session; reusing one fixed token across sessions is a credential-hygiene
/// problem this crate does not solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionAuth {
    pub user_id: String,
    pub session_id: String,
    pub merchant: String,
}

/// License server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// License endpoint (HTTP POST)
    pub license_url: String,
    /// Certificate endpoint (HTTP GET)
    pub certificate_url: String,
    /// Certificate cache version tag; bump to force a refetch
    #[serde(default = "default_cache_version")]
    pub cache_version: String,
    /// Scheme of key URLs this crate services
    #[serde(default = "default_key_scheme")]
    pub key_scheme: String,
    #[serde(default)]
    pub session: SessionAuth,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            license_url: "https://license.example.com/fairplay/license".to_string(),
            certificate_url: "https://license.example.com/fairplay/cert".to_string(),
            cache_version: default_cache_version(),
            key_scheme: default_key_scheme(),
            session: SessionAuth::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

impl LicenseConfig {
    pub fn license_url(&self) -> Result<Url> {
        parse_http_url("license_url", &self.license_url)
    }

    pub fn certificate_url(&self) -> Result<Url> {
        parse_http_url("certificate_url", &self.certificate_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Download bookkeeping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory all persisted asset locations are relative to
    pub downloads_root: PathBuf,
    /// Base URL of the loopback server that serves `downloads_root`
    #[serde(default = "default_origin_base_url")]
    pub origin_base_url: String,
    /// Capacity of the bounded event channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            downloads_root: PathBuf::from("downloads"),
            origin_base_url: default_origin_base_url(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    #[serde(default)]
    pub license: LicenseConfig,
    #[serde(default)]
    pub downloads: DownloadConfig,
    /// SQLite database holding keys, certificates and asset locations
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl VaultConfig {
    pub fn builder() -> VaultConfigBuilder {
        VaultConfigBuilder::new()
    }

    /// Load configuration from a JSON file and validate it
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that endpoints parse and limits are sane
    pub fn validate(&self) -> Result<()> {
        self.license.license_url()?;
        self.license.certificate_url()?;
        parse_http_url("origin_base_url", &self.downloads.origin_base_url)?;

        if self.license.key_scheme.is_empty() {
            return Err(VaultError::invalid_config("key_scheme must not be empty"));
        }
        if self.license.cache_version.is_empty() {
            return Err(VaultError::invalid_config("cache_version must not be empty"));
        }
        if self.downloads.event_capacity == 0 {
            return Err(VaultError::invalid_config("event_capacity must be at least 1"));
        }

        Ok(())
    }
}

/// Builder for VaultConfig
#[derive(Debug, Default)]
pub struct VaultConfigBuilder {
    config: VaultConfig,
}

impl VaultConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn license_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.license.license_url = url.into();
        self
    }

    pub fn certificate_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.license.certificate_url = url.into();
        self
    }

    pub fn cache_version<S: Into<String>>(mut self, version: S) -> Self {
        self.config.license.cache_version = version.into();
        self
    }

    pub fn key_scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.config.license.key_scheme = scheme.into();
        self
    }

    pub fn session(mut self, session: SessionAuth) -> Self {
        self.config.license.session = session;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.license.timeout_secs = timeout.as_secs();
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.license.user_agent = user_agent.into();
        self
    }

    pub fn downloads_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.downloads.downloads_root = root.into();
        self
    }

    pub fn origin_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.downloads.origin_base_url = url.into();
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.downloads.event_capacity = capacity;
        self
    }

    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<VaultConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| VaultError::invalid_config(format!("{}: {} ({})", field, e, raw)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(VaultError::invalid_config(format!(
            "{}: unsupported scheme '{}'",
            field, other
        ))),
    }
}

fn default_cache_version() -> String {
    "1".to_string()
}

fn default_key_scheme() -> String {
    DEFAULT_KEY_SCHEME.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("offline-hls-core/{}", env!("CARGO_PKG_VERSION"))
}

fn default_origin_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}
