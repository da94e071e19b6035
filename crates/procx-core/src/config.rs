//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! counting_enabled = true
//! default_job_retries = 3
//! logging_profile = "production"
//!
//! [async_executor]
//! worker_count = 4
//! lock_time_ms = 300000
//!
//! [async_history_executor]
//! max_jobs_per_acquisition = 16
//! ```

use crate::errors::{ProcxError, Result};
use crate::logging_facility::Profile;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Keep denormalized job counters on executions
    pub counting_enabled: bool,
    /// Produce history facts and queue them as history jobs at commit
    pub async_history_enabled: bool,
    pub default_job_retries: i32,
    pub logging_profile: Profile,
    pub async_executor: ExecutorConfig,
    pub async_history_executor: ExecutorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            counting_enabled: true,
            async_history_enabled: true,
            default_job_retries: 3,
            logging_profile: Profile::Development,
            async_executor: ExecutorConfig::default(),
            async_history_executor: ExecutorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    pub activate: bool,
    /// Jobs executed concurrently
    pub worker_count: usize,
    pub max_jobs_per_acquisition: usize,
    /// Pause between acquisition cycles that found nothing
    pub acquire_wait_ms: u64,
    /// How long an acquired job stays locked
    pub lock_time_ms: u64,
    pub reset_expired_interval_ms: u64,
    pub reset_expired_batch_size: usize,
    /// Lock owner written on acquired jobs; generated when absent
    pub lock_owner: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            activate: true,
            worker_count: 4,
            max_jobs_per_acquisition: 8,
            acquire_wait_ms: 1_000,
            lock_time_ms: 300_000,
            reset_expired_interval_ms: 60_000,
            reset_expired_batch_size: 32,
            lock_owner: None,
        }
    }
}

/// Upper bound for `lock_time_ms`: 30 days
pub const MAX_LOCK_TIME_MS: u64 = 30 * 24 * 60 * 60 * 1_000;

impl ExecutorConfig {
    fn validate(&self, section: &str) -> Result<()> {
        let positive = [
            ("worker_count", self.worker_count as u64),
            ("max_jobs_per_acquisition", self.max_jobs_per_acquisition as u64),
            ("acquire_wait_ms", self.acquire_wait_ms),
            ("lock_time_ms", self.lock_time_ms),
            ("reset_expired_interval_ms", self.reset_expired_interval_ms),
            ("reset_expired_batch_size", self.reset_expired_batch_size as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ProcxError::InvalidConfig {
                    message: format!("{}.{} must be greater than zero", section, name),
                });
            }
        }
        if self.lock_time_ms > MAX_LOCK_TIME_MS {
            return Err(ProcxError::InvalidConfig {
                message: format!("{}.lock_time_ms must not exceed {}", section, MAX_LOCK_TIME_MS),
            });
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_job_retries < 0 {
            return Err(ProcxError::InvalidConfig {
                message: "default_job_retries must not be negative".to_string(),
            });
        }
        self.async_executor.validate("async_executor")?;
        self.async_history_executor
            .validate("async_history_executor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.counting_enabled);
        assert_eq!(config.default_job_retries, 3);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            counting_enabled = false
            logging_profile = "production"

            [async_history_executor]
            worker_count = 2
            lock_owner = "node-a"
            "#,
        )
        .unwrap();

        assert!(!config.counting_enabled);
        assert_eq!(config.logging_profile, Profile::Production);
        assert_eq!(config.async_history_executor.worker_count, 2);
        assert_eq!(
            config.async_history_executor.lock_owner.as_deref(),
            Some("node-a")
        );
        assert_eq!(config.async_executor.worker_count, 4);
    }

    #[test]
    fn test_zero_worker_count_rejected() {
        let err = EngineConfig::from_toml_str("[async_executor]\nworker_count = 0").unwrap_err();
        assert!(matches!(err, ProcxError::InvalidConfig { message } if message.contains("async_executor.worker_count")));
    }

    #[test]
    fn test_oversized_lock_time_rejected() {
        let err = EngineConfig::from_toml_str("[async_history_executor]\nlock_time_ms = 9223372036854775807").unwrap_err();
        assert!(matches!(err, ProcxError::InvalidConfig { message } if message.contains("async_history_executor.lock_time_ms")));
        let at_bound = format!("[async_executor]\nlock_time_ms = {}", MAX_LOCK_TIME_MS);
        assert!(EngineConfig::from_toml_str(&at_bound).is_ok());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = EngineConfig::from_toml_str("count_enabled = true").unwrap_err();
        assert!(matches!(err, ProcxError::InvalidConfig { .. }));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "default_job_retries = 5").unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().default_job_retries, 5);
    }
}
