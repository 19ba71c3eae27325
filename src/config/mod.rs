//! # Configuration System
//!
//! Explicit configuration value handed to every component at construction.
//! Nothing in the crate reads configuration from ambient globals.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use freshmaker_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let timeout = manager.config().catalog.network_timeout();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// One allowlist rule: every field must match its regular expression
pub type AllowlistRule = BTreeMap<String, String>;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FreshmakerConfig {
    /// Remote image/bundle catalog
    pub catalog: CatalogConfig,

    /// Rebuild identifier generation and eligibility exceptions
    pub rebuild: RebuildConfig,

    /// Bounded retry used around flaky collaborator calls
    pub retry: RetryConfig,

    /// Published module content index
    pub content_index: ContentIndexConfig,

    /// Public API used to render artifact URLs handed to the build system
    pub api: ApiConfig,

    /// Planning pass tuning
    pub planning: PlanningConfig,

    pub logging: LoggingConfig,

    /// Handler name -> rules; an event is handled only if one rule matches
    pub handler_build_allowlist: HashMap<String, Vec<AllowlistRule>>,

    /// Plan and record rebuilds without handing them to the build system
    pub dry_run: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub server_url: String,
    /// Organizations whose index images are traversal roots; empty means all
    pub index_image_organizations: Vec<String>,
    pub network_timeout_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            index_image_organizations: Vec::new(),
            network_timeout_ms: 60_000,
        }
    }
}

impl CatalogConfig {
    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RebuildConfig {
    /// Marker appended to the release of rebuilt image NVRs
    pub rebuilt_nvr_release_suffix: String,
    /// `name-version` of images treated as auto-rebuild eligible regardless of tags
    pub bundle_autorebuild_tag_exceptions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            interval_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.timeout_ms),
            Duration::from_millis(self.interval_ms),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentIndexConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Upper bound on concurrent per-artifact catalog lookups within one pass
    pub max_concurrent_lookups: usize,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl FreshmakerConfig {
    /// Validate the configuration, rejecting values that would only fail later
    pub fn validate(&self) -> ConfigResult<()> {
        if self.catalog.server_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "server_url",
                "catalog",
            ));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("base_url", "api"));
        }
        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(ConfigurationError::invalid_value(
                "api.base_url",
                &self.api.base_url,
                e.to_string(),
            ));
        }
        if self.rebuild.rebuilt_nvr_release_suffix.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "rebuilt_nvr_release_suffix",
                "rebuild",
            ));
        }
        if self.catalog.network_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "catalog.network_timeout_ms",
                0,
                "network timeout must be positive",
            ));
        }
        if self.retry.interval_ms > self.retry.timeout_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.interval_ms",
                self.retry.interval_ms,
                format!(
                    "retry interval must not exceed the retry timeout ({} ms)",
                    self.retry.timeout_ms
                ),
            ));
        }
        if self.planning.max_concurrent_lookups == 0 {
            return Err(ConfigurationError::invalid_value(
                "planning.max_concurrent_lookups",
                0,
                "at least one concurrent lookup is required",
            ));
        }
        for (handler, rules) in &self.handler_build_allowlist {
            for rule in rules {
                for (field, pattern) in rule {
                    if let Err(e) = regex::Regex::new(pattern) {
                        return Err(ConfigurationError::invalid_value(
                            format!("handler_build_allowlist.{handler}.{field}"),
                            pattern,
                            e.to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
