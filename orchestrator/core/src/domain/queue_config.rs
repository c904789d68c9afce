// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Command Queue Configuration Types
//
// Defines the configuration manifest for a command queue instance:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Concurrency bound and batch fast/slow threshold
// - Retry backoff defaults
// - Event bus buffering

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "swarmflow.dev/v1";
pub const KIND: &str = "CommandQueueConfig";

/// Top-level Kubernetes-style queue configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfigManifest {
    /// API version (must be "swarmflow.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CommandQueueConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: QueueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable queue name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Queue settings (content under spec:)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Upper bound on commands executing at once
    #[serde(default = "default_max_concurrent_commands")]
    pub max_concurrent_commands: usize,

    /// Batch commands estimated below this run in the parallel "fast" group
    #[serde(default = "default_fast_command_threshold_ms")]
    pub fast_command_threshold_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Broadcast buffer for queue events before slow subscribers lag
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Exponential backoff without jitter: attempt `n` failing waits
/// `base_delay_ms * 2^(n-1)` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay_ms: base_delay.as_millis() as u64,
        }
    }

    /// Delay after the given 1-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl QueueConfig {
    pub fn fast_command_threshold(&self) -> Duration {
        Duration::from_millis(self.fast_command_threshold_ms)
    }
}

// Default value functions
fn default_max_concurrent_commands() -> usize {
    5
}

fn default_fast_command_threshold_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_event_capacity() -> usize {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_commands: default_max_concurrent_commands(),
            fast_command_threshold_ms: default_fast_command_threshold_ms(),
            retry: RetryPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for QueueConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "command-queue".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: QueueConfig::default(),
        }
    }
}

impl QueueConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SWARMFLOW_CONFIG_PATH environment variable
    /// 2. ./swarmflow-config.yaml (working directory)
    /// 3. ~/.swarmflow/config.yaml (user home)
    /// 4. /etc/swarmflow/config.yaml (system, Unix) or C:\ProgramData\Swarmflow\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SWARMFLOW_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./swarmflow-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".swarmflow").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/swarmflow/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Swarmflow\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = explicit_path {
            tracing::info!("Loading queue configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load queue config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading queue configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::debug!("No queue configuration file found. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_override::<usize>("SWARMFLOW_MAX_CONCURRENT_COMMANDS") {
            self.spec.max_concurrent_commands = value;
        }
        if let Some(value) = env_override::<u32>("SWARMFLOW_RETRY_MAX_ATTEMPTS") {
            self.spec.retry.max_retries = value;
        }
        if let Some(value) = env_override::<u64>("SWARMFLOW_RETRY_BASE_DELAY_MS") {
            self.spec.retry.base_delay_ms = value;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.max_concurrent_commands == 0 {
            anyhow::bail!("spec.max_concurrent_commands must be greater than 0");
        }

        if self.spec.retry.max_retries == 0 {
            anyhow::bail!("spec.retry.max_retries must be greater than 0");
        }

        if self.spec.event_capacity == 0 {
            anyhow::bail!("spec.event_capacity must be greater than 0");
        }

        Ok(())
    }
}

fn env_override<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            tracing::info!("Environment override: {}={}", name, raw);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Ignoring.", name, raw);
            None
        }
    }
}
