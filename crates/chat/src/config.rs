//! Runtime configuration for the chat core
//!
//! Loaded from (in order of priority):
//! 1. Environment variables (`PARLEY_BASE_URL`, `PARLEY_AUTH_TOKEN`, `PARLEY_POLL_SECS`)
//! 2. JSON file (~/.config/parley/parley.json)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::gateway::rate_limit::RateLimitConfig;
use crate::scroll::AnchorConfig;

/// Config filename in the Parley config directory
pub const CONFIG_FILE: &str = "parley.json";

pub const BASE_URL_ENV: &str = "PARLEY_BASE_URL";
pub const AUTH_TOKEN_ENV: &str = "PARLEY_AUTH_TOKEN";
pub const POLL_SECS_ENV: &str = "PARLEY_POLL_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Backend API root, e.g. `https://chat.example.com/api/`
    pub base_url: String,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,

    pub contacts_page_size: usize,
    pub messages_page_size: usize,
    /// Leading conversation page fetched by background sync
    pub sync_page_size: usize,
    /// How many leading conversations get a last-message lookup per sync
    pub sync_last_message_lookups: usize,

    pub poll_interval_secs: u64,
    pub poll_max_interval_secs: u64,
    pub poll_backoff_multiplier: f64,

    pub metadata_cache_ttl_secs: u64,

    pub send_min_interval_ms: i64,
    pub send_dedupe_window_ms: i64,
    pub request_budget_per_minute: usize,
    pub lockout_base_secs: i64,
    pub lockout_max_secs: i64,
    pub max_message_length: usize,

    pub history_settle_ms: i64,
    pub scroll_debounce_ms: i64,
    pub bottom_retry_interval_ms: i64,
    pub bottom_retry_attempts: u32,

    /// Lifetime of auto-dismissing warnings
    pub warning_ttl_secs: i64,
    /// Viewports narrower than this count as mobile (no auto-selection)
    pub narrow_viewport_width: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/".to_string(),
            auth_token: None,
            contacts_page_size: 15,
            messages_page_size: 20,
            sync_page_size: 15,
            sync_last_message_lookups: 5,
            poll_interval_secs: 30,
            poll_max_interval_secs: 300,
            poll_backoff_multiplier: 1.5,
            metadata_cache_ttl_secs: 300,
            send_min_interval_ms: 1000,
            send_dedupe_window_ms: 500,
            request_budget_per_minute: 60,
            lockout_base_secs: 60,
            lockout_max_secs: 15 * 60,
            max_message_length: crate::send::MAX_MESSAGE_LENGTH,
            history_settle_ms: 500,
            scroll_debounce_ms: 10,
            bottom_retry_interval_ms: 50,
            bottom_retry_attempts: 20,
            warning_ttl_secs: 5,
            narrow_viewport_width: 768,
        }
    }
}

impl ChatConfig {
    /// Load the config file if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a specific JSON file without environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(token) = lookup(AUTH_TOKEN_ENV) {
            let token = token.trim();
            self.auth_token = (!token.is_empty()).then(|| token.to_string());
        }
        if let Some(secs) = lookup(POLL_SECS_ENV).filter(|v| !v.trim().is_empty()) {
            self.poll_interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", POLL_SECS_ENV))?;
        }
        Ok(())
    }

    /// Parsed API root, always ending in `/` so relative joins keep the path
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("Invalid backend base URL: {}", self.base_url))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::seconds(self.poll_interval_secs.max(1) as i64)
    }

    pub fn poll_max_interval(&self) -> Duration {
        Duration::seconds(self.poll_max_interval_secs.max(self.poll_interval_secs.max(1)) as i64)
    }

    pub fn metadata_cache_ttl(&self) -> Duration {
        Duration::seconds(self.metadata_cache_ttl_secs as i64)
    }

    pub fn send_dedupe_window(&self) -> Duration {
        Duration::milliseconds(self.send_dedupe_window_ms)
    }

    pub fn warning_ttl(&self) -> Duration {
        Duration::seconds(self.warning_ttl_secs)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            min_interval: Duration::milliseconds(self.send_min_interval_ms),
            window: Duration::seconds(60),
            max_requests: self.request_budget_per_minute,
            lockout_base: Duration::seconds(self.lockout_base_secs),
            lockout_max: Duration::seconds(self.lockout_max_secs),
            ..RateLimitConfig::default()
        }
    }

    pub fn anchor(&self) -> AnchorConfig {
        AnchorConfig {
            scroll_debounce: Duration::milliseconds(self.scroll_debounce_ms),
            bottom_retry_interval: Duration::milliseconds(self.bottom_retry_interval_ms),
            bottom_retry_attempts: self.bottom_retry_attempts,
            history_settle: Duration::milliseconds(self.history_settle_ms),
            ..AnchorConfig::default()
        }
    }
}
