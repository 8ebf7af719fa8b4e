use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::{DEFAULT_GROUP, DEFAULT_REGION, FormatPreference, SubjectDefaults};
use crate::monitor::fetcher::RetryPolicy;
use crate::monitor::scheduler::SchedulerSettings;
use crate::notifications::dispatcher::DispatchTimeouts;
use crate::schedule::{DEFAULT_DATA_BASE_URL, DEFAULT_IMAGES_BASE_URL, ScheduleEndpoints};

pub const ENV_PREFIX: &str = "POWERWATCH_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Process-wide settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub store_path: String,
    pub log_dir: String,
    pub images_base_url: String,
    pub data_base_url: String,
    pub telegram_bot_token: Option<String>,

    pub probe_timeout_secs: u64,
    pub fetch_max_attempts: u32,
    pub fetch_retry_delay_secs: u64,
    pub fetch_attempt_timeout_secs: u64,

    pub notify_timeout_liveness_secs: u64,
    pub notify_timeout_content_secs: u64,

    pub default_liveness_interval_secs: u64,
    pub default_content_interval_secs: u64,
    pub default_format: FormatPreference,
    pub default_region: String,
    pub default_group: String,

    pub content_subject_spacing_ms: u64,
    pub idle_poll_secs: u64,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug, PartialEq, Eq)]
pub struct PartialAppConfig {
    store_path: Option<String>,
    log_dir: Option<String>,
    images_base_url: Option<String>,
    data_base_url: Option<String>,
    telegram_bot_token: Option<String>,
    probe_timeout_secs: Option<u64>,
    fetch_max_attempts: Option<u32>,
    fetch_retry_delay_secs: Option<u64>,
    fetch_attempt_timeout_secs: Option<u64>,
    notify_timeout_liveness_secs: Option<u64>,
    notify_timeout_content_secs: Option<u64>,
    default_liveness_interval_secs: Option<u64>,
    default_content_interval_secs: Option<u64>,
    default_format: Option<FormatPreference>,
    default_region: Option<String>,
    default_group: Option<String>,
    content_subject_spacing_ms: Option<u64>,
    idle_poll_secs: Option<u64>,
}

fn default_store_path() -> String {
    "graphenko-chats.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) if Path::new(path_str).exists() => {
                let contents = fs::read_to_string(path_str).map_err(|source| ConfigError::Read {
                    path: path_str.to_string(),
                    source,
                })?;
                toml::from_str(&contents)?
            }
            _ => PartialAppConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialAppConfig = envy::prefixed(ENV_PREFIX).from_env()?;

        // 3. Merge: environment overrides file
        Self::merge(file_config, env_config)
    }

    pub fn merge(file: PartialAppConfig, env: PartialAppConfig) -> Result<Self, ConfigError> {
        let config = AppConfig {
            store_path: env.store_path.or(file.store_path).unwrap_or_else(default_store_path),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            images_base_url: env
                .images_base_url
                .or(file.images_base_url)
                .unwrap_or_else(|| DEFAULT_IMAGES_BASE_URL.to_string()),
            data_base_url: env
                .data_base_url
                .or(file.data_base_url)
                .unwrap_or_else(|| DEFAULT_DATA_BASE_URL.to_string()),
            telegram_bot_token: env
                .telegram_bot_token
                .or(file.telegram_bot_token)
                .filter(|token| !token.trim().is_empty()),
            probe_timeout_secs: env.probe_timeout_secs.or(file.probe_timeout_secs).unwrap_or(5),
            fetch_max_attempts: env.fetch_max_attempts.or(file.fetch_max_attempts).unwrap_or(3),
            fetch_retry_delay_secs: env
                .fetch_retry_delay_secs
                .or(file.fetch_retry_delay_secs)
                .unwrap_or(10),
            fetch_attempt_timeout_secs: env
                .fetch_attempt_timeout_secs
                .or(file.fetch_attempt_timeout_secs)
                .unwrap_or(30),
            notify_timeout_liveness_secs: env
                .notify_timeout_liveness_secs
                .or(file.notify_timeout_liveness_secs)
                .unwrap_or(10),
            notify_timeout_content_secs: env
                .notify_timeout_content_secs
                .or(file.notify_timeout_content_secs)
                .unwrap_or(30),
            default_liveness_interval_secs: env
                .default_liveness_interval_secs
                .or(file.default_liveness_interval_secs)
                .unwrap_or(30),
            default_content_interval_secs: env
                .default_content_interval_secs
                .or(file.default_content_interval_secs)
                .unwrap_or(60),
            default_format: env.default_format.or(file.default_format).unwrap_or_default(),
            default_region: env
                .default_region
                .or(file.default_region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            default_group: env
                .default_group
                .or(file.default_group)
                .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            content_subject_spacing_ms: env
                .content_subject_spacing_ms
                .or(file.content_subject_spacing_ms)
                .unwrap_or(1000),
            idle_poll_secs: env.idle_poll_secs.or(file.idle_poll_secs).unwrap_or(60),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("fetch_max_attempts", u64::from(self.fetch_max_attempts)),
            ("fetch_attempt_timeout_secs", self.fetch_attempt_timeout_secs),
            ("notify_timeout_liveness_secs", self.notify_timeout_liveness_secs),
            ("notify_timeout_content_secs", self.notify_timeout_content_secs),
            ("default_liveness_interval_secs", self.default_liveness_interval_secs),
            ("default_content_interval_secs", self.default_content_interval_secs),
            ("idle_poll_secs", self.idle_poll_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be at least 1")));
        }
        let non_empty = [
            ("default_region", &self.default_region),
            ("default_group", &self.default_group),
        ];
        if let Some((name, _)) = non_empty.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("{name} must not be empty")));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_max_attempts,
            retry_delay: Duration::from_secs(self.fetch_retry_delay_secs),
            attempt_timeout: Duration::from_secs(self.fetch_attempt_timeout_secs),
        }
    }

    pub fn dispatch_timeouts(&self) -> DispatchTimeouts {
        DispatchTimeouts {
            liveness: Duration::from_secs(self.notify_timeout_liveness_secs),
            content: Duration::from_secs(self.notify_timeout_content_secs),
        }
    }

    pub fn subject_defaults(&self) -> SubjectDefaults {
        SubjectDefaults {
            check_interval_liveness: self.default_liveness_interval_secs,
            check_interval_content: self.default_content_interval_secs,
            format_preference: self.default_format,
            region: self.default_region.clone(),
            group: self.default_group.clone(),
        }
    }

    pub fn endpoints(&self) -> ScheduleEndpoints {
        ScheduleEndpoints {
            images_base_url: self.images_base_url.clone(),
            data_base_url: self.data_base_url.clone(),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            endpoints: self.endpoints(),
            content_subject_spacing: Duration::from_millis(self.content_subject_spacing_ms),
            idle_poll: Duration::from_secs(self.idle_poll_secs),
            dispatch_timeouts: self.dispatch_timeouts(),
        }
    }
}
