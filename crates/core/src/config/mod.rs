//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (INSTAPAGE_*)
//! 2. TOML config file (if INSTAPAGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::KeyStrategy;
use crate::loader::{LoaderConfig, MaterializerConfig, ReleasePolicy};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via INSTAPAGE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per resource.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay before revalidating served content, and before signaling a
    /// reload once drift is stored.
    #[serde(default = "default_delay_ms")]
    pub settle_delay_ms: u64,

    /// Lifetime of an ephemeral handle under the delayed release policy.
    #[serde(default = "default_delay_ms")]
    pub release_delay_ms: u64,

    /// Delay between binding a slot and counting it toward page readiness.
    #[serde(default = "default_delay_ms")]
    pub ready_delay_ms: u64,

    #[serde(default)]
    pub release_policy: ReleasePolicy,

    #[serde(default)]
    pub key_strategy: KeyStrategy,

    /// Share one fetch between concurrent loads of the same key.
    #[serde(default = "default_true")]
    pub coalesce_fetches: bool,

    /// Revalidate icons too; they are treated as immutable by default.
    #[serde(default)]
    pub revalidate_icons: bool,

    /// Permit `file://` locators.
    ///
    /// Set via INSTAPAGE_ALLOW_LOCAL_FILES environment variable.
    #[serde(default)]
    pub allow_local_files: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./instapage-cache.sqlite")
}

fn default_user_agent() -> String {
    "instapage/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_delay_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            settle_delay_ms: default_delay_ms(),
            release_delay_ms: default_delay_ms(),
            ready_delay_ms: default_delay_ms(),
            release_policy: ReleasePolicy::default(),
            key_strategy: KeyStrategy::default(),
            coalesce_fetches: true,
            revalidate_icons: false,
            allow_local_files: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Engine settings derived from this configuration.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            key_strategy: self.key_strategy,
            coalesce_fetches: self.coalesce_fetches,
            revalidate_icons: self.revalidate_icons,
            materializer: MaterializerConfig {
                release_policy: self.release_policy,
                release_delay: Duration::from_millis(self.release_delay_ms),
                ready_delay: Duration::from_millis(self.ready_delay_ms),
            },
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("INSTAPAGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("INSTAPAGE_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
