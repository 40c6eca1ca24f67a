//! # Configuration
//!
//! [`MinerConfig`] is assembled by [`ConfigManager`] from layered sources:
//! `config/miner.toml`, then `config/miner.<environment>.toml`, then
//! `MINER__<SECTION>__<KEY>` environment variables. Every field has a default,
//! so an empty configuration directory yields a working development setup.

pub mod loader;

pub use loader::ConfigManager;

use crate::constants::{defaults, TASK_ID_PLACEHOLDER};
use crate::dispatch::DispatchMode;
use crate::error::{MinerError, MinerResult};
use crate::state_machine::ImportGuardKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub database: DatabaseConfig,
    pub dispatch: DispatchConfig,
    pub import: ImportConfig,
    pub pmml: PmmlConfig,
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// Origin of the continue-import endpoint
    pub base_url: String,
    /// Path template containing `{task_id}`
    pub import_path: String,
    pub request_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Http,
            base_url: defaults::DISPATCH_BASE_URL.to_string(),
            import_path: defaults::IMPORT_PATH.to_string(),
            request_timeout_ms: 5000,
            queue_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub guard: ImportGuardKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmmlConfig {
    pub application_name: String,
    pub application_version: String,
    pub copyright_holder: String,
    /// Fixed number of decimals for floating values; shortest round-trip when unset
    pub float_precision: Option<usize>,
}

impl Default for PmmlConfig {
    fn default() -> Self {
        Self {
            application_name: defaults::APPLICATION_NAME.to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            copyright_holder: defaults::COPYRIGHT_HOLDER.to_string(),
            float_precision: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::RULES_DEFAULT_LIMIT,
            max_limit: defaults::RULES_MAX_LIMIT,
        }
    }
}

impl RulesConfig {
    /// Requested page size bounded by `max_limit`; zero or missing means the default
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(0) | None => self.default_limit,
            Some(limit) => limit.min(self.max_limit),
        }
    }
}

impl MinerConfig {
    /// Load using the detected environment and the default configuration directory
    pub fn load() -> MinerResult<Self> {
        Ok(ConfigManager::load()?.config().clone())
    }

    pub fn validate(&self) -> MinerResult<()> {
        if self.dispatch.mode == DispatchMode::Http && self.dispatch.base_url.trim().is_empty() {
            return Err(MinerError::ConfigurationError(
                "dispatch.base_url must be set for http dispatch".to_string(),
            ));
        }
        if !self.dispatch.import_path.contains(TASK_ID_PLACEHOLDER) {
            return Err(MinerError::ConfigurationError(format!(
                "dispatch.import_path must contain {TASK_ID_PLACEHOLDER}"
            )));
        }
        if self.rules.max_limit == 0 {
            return Err(MinerError::ConfigurationError(
                "rules.max_limit must be greater than zero".to_string(),
            ));
        }
        if self.rules.default_limit > self.rules.max_limit {
            return Err(MinerError::ConfigurationError(format!(
                "rules.default_limit ({}) exceeds rules.max_limit ({})",
                self.rules.default_limit, self.rules.max_limit
            )));
        }
        Ok(())
    }
}
