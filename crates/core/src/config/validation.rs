//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::loader::ReleasePolicy;
use thiserror::Error;

const MAX_DELAY_MS: u64 = 60_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - any of the loader delays exceeds one minute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (field, value) in [
            ("settle_delay_ms", self.settle_delay_ms),
            ("release_delay_ms", self.release_delay_ms),
            ("ready_delay_ms", self.ready_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must not exceed 1 minute (60000ms)".into(),
                });
            }
        }

        if self.release_policy == ReleasePolicy::Delayed && self.release_delay_ms < self.ready_delay_ms {
            tracing::warn!(
                release_delay_ms = self.release_delay_ms,
                ready_delay_ms = self.ready_delay_ms,
                "handles are released before slots count as ready"
            );
        }

        Ok(())
    }
}
