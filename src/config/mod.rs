//! Recovery configuration
//!
//! Loaded from a JSON file. Every field has a default, so `{}` is a valid
//! configuration:
//!
//! ```json
//! {
//!   "tenant": "acme",
//!   "consider_elements_older_than_ms": 3600000,
//!   "discovery_page_size": 1000,
//!   "batch_restart_size": 1000,
//!   "on_demand_batch_size": 100,
//!   "recovery_cron": "0 */2 * * * *"
//! }
//! ```

mod errors;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observability::{log_event, Event};
use crate::schedule::RecoverySchedule;

pub use errors::{ConfigError, ConfigResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Tag applied to every metric and log line
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Only elements untouched for longer than this are candidates
    #[serde(default = "default_older_than_ms")]
    pub consider_elements_older_than_ms: u64,

    /// Page size used when paging through candidate ids
    #[serde(default = "default_page_size")]
    pub discovery_page_size: usize,

    /// Number of elements recovered per transaction
    #[serde(default = "default_batch_restart_size")]
    pub batch_restart_size: usize,

    /// Hydration sub-batch of the on-demand re-drive
    #[serde(default = "default_on_demand_batch_size")]
    pub on_demand_batch_size: usize,

    /// Cron expression of the periodic recovery (seconds field optional)
    #[serde(default = "default_recovery_cron")]
    pub recovery_cron: String,
}

fn default_tenant() -> String {
    "default".to_string()
}
fn default_older_than_ms() -> u64 {
    3_600_000
} // 1h
fn default_page_size() -> usize {
    1000
}
fn default_batch_restart_size() -> usize {
    1000
}
fn default_on_demand_batch_size() -> usize {
    100
}
fn default_recovery_cron() -> String {
    "0 */2 * * * *".to_string()
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            tenant: default_tenant(),
            consider_elements_older_than_ms: default_older_than_ms(),
            discovery_page_size: default_page_size(),
            batch_restart_size: default_batch_restart_size(),
            on_demand_batch_size: default_on_demand_batch_size(),
            recovery_cron: default_recovery_cron(),
        }
    }
}

impl RecoveryConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;

        let path_str = path.to_string_lossy();
        log_event(
            Event::ConfigLoaded,
            &[("path", path_str.as_ref()), ("tenant", config.tenant.as_str())],
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: RecoveryConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.tenant.trim().is_empty() {
            return Err(ConfigError::invalid("tenant must not be empty"));
        }
        if self.discovery_page_size == 0 {
            return Err(ConfigError::invalid("discovery_page_size must be > 0"));
        }
        if self.batch_restart_size == 0 {
            return Err(ConfigError::invalid("batch_restart_size must be > 0"));
        }
        if self.on_demand_batch_size == 0 {
            return Err(ConfigError::invalid("on_demand_batch_size must be > 0"));
        }
        RecoverySchedule::parse(&self.recovery_cron)?;
        Ok(())
    }

    pub fn age_threshold(&self) -> Duration {
        Duration::from_millis(self.consider_elements_older_than_ms)
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_batch_restart_size(mut self, size: usize) -> Self {
        self.batch_restart_size = size;
        self
    }

    pub fn with_discovery_page_size(mut self, size: usize) -> Self {
        self.discovery_page_size = size;
        self
    }

    /// Metric tags for this tenant
    pub fn tags(&self) -> [(&str, &str); 1] {
        [("tenant", self.tenant.as_str())]
    }
}
