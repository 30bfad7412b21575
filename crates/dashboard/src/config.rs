//! Configuration loading for the dashboard
//!
//! Settings are loaded from (in order of priority):
//! 1. An explicit JSON file, when one is given
//! 2. `dashboard.json` in the config directory
//! 3. Built-in defaults
//!
//! Environment variables then override individual fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::stream::ReconnectPolicy;

/// Settings filename in the config directory
pub const CONFIG_FILE: &str = "dashboard.json";

/// Overrides `api_url`
pub const API_URL_ENV: &str = "CHATDESK_API_URL";

/// Overrides `request_timeout_secs`
pub const TIMEOUT_ENV: &str = "CHATDESK_TIMEOUT_SECS";

pub const DEFAULT_API_URL: &str = "http://localhost:4000/api";

/// Live channel reconnect settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Consecutive failures before giving up; null retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            max_attempts: policy.max_attempts,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms)),
            max_attempts: self.max_attempts,
        }
    }
}

/// Dashboard settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Base URL of the backend API
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// How long transient notifications stay visible
    pub notification_ttl_ms: u64,
    pub reconnect: ReconnectConfig,
    /// Messages shown in a sender profile
    pub profile_recent_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            notification_ttl_ms: 2000,
            reconnect: ReconnectConfig::default(),
            profile_recent_limit: 10,
        }
    }
}

impl DashboardConfig {
    /// Load settings, optionally from a specific file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None if config::config_exists(CONFIG_FILE) => config::load_json(CONFIG_FILE)
                .with_context(|| format!("Failed to load {}", CONFIG_FILE))?,
            None => Self::default(),
        };

        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got {:?}", TIMEOUT_ENV, secs))?;
        }
        Ok(())
    }

    /// Write the settings to the default config file
    pub fn save(&self) -> Result<()> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Get the default settings file path (~/.config/chatdesk/dashboard.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }
}
