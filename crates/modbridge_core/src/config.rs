//! Bridge configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe logging, runtime, queue, registry and storage settings.
//! - Reject invalid settings before any bridge resource is created.
//!
//! # Invariants
//! - Every section is optional; missing sections use defaults.
//! - Unknown keys are rejected.
//! - Declared queue names are non-blank, unique, and not reserved.

use crate::logging::{default_log_level, normalize_level};
use crate::module::{DEFAULT_QUEUE_LABEL, MAIN_QUEUE_LABEL};
use crate::queue::runtime::{RuntimeConfig, DEFAULT_THREAD_NAME};
use crate::queue::QueueSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub logging: LoggingConfig,
    pub runtime: RuntimeSection,
    pub queues: Vec<QueueSpec>,
    pub registry: RegistryConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeSection {
    /// Detected from available parallelism when unset.
    pub worker_threads: Option<usize>,
    pub thread_name: String,
    pub stack_size: Option<usize>,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Lets a later package replace a module of the same name.
    pub allow_overrides: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite file for the key-value store; in-memory when unset.
    pub path: Option<PathBuf>,
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl BridgeConfig {
    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.logging.level)
            .map_err(|err| ConfigError::invalid("logging.level", err.to_string()))?;
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::invalid(
                    "logging.dir",
                    format!("must be an absolute path, got `{}`", dir.display()),
                ));
            }
        }

        if let Some(threads) = self.runtime.worker_threads {
            if !(1..=1024).contains(&threads) {
                return Err(ConfigError::invalid(
                    "runtime.worker_threads",
                    format!("must be within 1..=1024, got {threads}"),
                ));
            }
        }
        if self.runtime.thread_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "runtime.thread_name",
                "must not be blank",
            ));
        }

        let mut seen = BTreeSet::new();
        for (index, queue) in self.queues.iter().enumerate() {
            let field = format!("queues[{index}].name");
            let name = queue.name.trim();
            if name.is_empty() {
                return Err(ConfigError::invalid(field, "must not be blank"));
            }
            if name == MAIN_QUEUE_LABEL || name == DEFAULT_QUEUE_LABEL {
                return Err(ConfigError::invalid(
                    field,
                    format!("`{name}` is a reserved queue label"),
                ));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::invalid(
                    field,
                    format!("queue `{name}` is declared more than once"),
                ));
            }
        }
        Ok(())
    }

    /// Runtime profile with unset values filled from defaults.
    pub fn runtime_config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::default().with_thread_name(self.runtime.thread_name.clone());
        if let Some(threads) = self.runtime.worker_threads {
            config = config.with_worker_threads(threads);
        }
        if let Some(stack_size) = self.runtime.stack_size {
            config = config.with_stack_size(stack_size);
        }
        config
    }
}
