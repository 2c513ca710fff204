//! Settings file for the `jobmesh` binary.
//!
//! A TOML document with the queue options, the consumer groups to start,
//! recurring schedules and one-shot jobs enqueued at startup. `${VAR}`
//! references are replaced with environment variables before parsing.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use jobmesh_queue::{QueueConfig, Recurrence, RecurringOptions, StandardCron};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

fn default_stats_interval_secs() -> u64 {
    10
}

fn default_consumers() -> usize {
    1
}

fn default_max_retries() -> u32 {
    3
}

/// Root of the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub queue: QueueConfig,

    /// Seconds between stats log lines (0 disables).
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    #[serde(default)]
    pub groups: Vec<GroupSettings>,

    #[serde(default)]
    pub recurring: Vec<RecurringSettings>,

    #[serde(default)]
    pub jobs: Vec<JobSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            stats_interval_secs: default_stats_interval_secs(),
            groups: Vec::new(),
            recurring: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

/// A consumer group and how many logging consumers join it.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSettings {
    pub name: String,

    #[serde(default = "default_consumers")]
    pub consumers: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fail every Nth delivery to exercise retries (0 never fails).
    #[serde(default)]
    pub fail_every: u32,
}

/// A recurring schedule. Exactly one of `interval_seconds` and `cron` is set.
#[derive(Debug, Clone, Deserialize)]
pub struct RecurringSettings {
    pub id: String,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub interval_seconds: Option<f64>,

    #[serde(default)]
    pub cron: Option<String>,

    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RecurringSettings {
    pub fn to_options(&self) -> Result<RecurringOptions, SettingsError> {
        let recurrence = match (&self.interval_seconds, &self.cron) {
            (Some(seconds), None) => Recurrence::Interval(*seconds),
            (None, Some(expression)) => Recurrence::Cron(expression.clone()),
            _ => {
                return Err(SettingsError::InvalidValue {
                    field: format!("recurring.{}", self.id),
                    message: "set exactly one of interval_seconds or cron".to_string(),
                });
            }
        };
        Ok(RecurringOptions {
            job_id: self.id.clone(),
            priority: self.priority,
            recurrence,
        })
    }
}

/// A job enqueued once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSettings {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load settings from a string.
    pub fn load_str(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_vars(content)?;
        let settings: Settings = toml::from_str(&expanded)?;
        Ok(settings)
    }

    /// Check everything the queue would otherwise reject at runtime.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.queue
            .validate()
            .map_err(|e| SettingsError::InvalidValue {
                field: "queue".to_string(),
                message: e.to_string(),
            })?;

        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    field: "groups.name".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            if group.consumers == 0 {
                return Err(SettingsError::InvalidValue {
                    field: format!("groups.{}.consumers", group.name),
                    message: "must be at least 1".to_string(),
                });
            }
        }

        for recurring in &self.recurring {
            let options = recurring.to_options()?;
            let invalid = |message: String| SettingsError::InvalidValue {
                field: format!("recurring.{}", recurring.id),
                message,
            };
            match options.recurrence {
                Recurrence::Interval(seconds) if !seconds.is_finite() || seconds <= 0.0 => {
                    return Err(invalid(format!("interval must be positive, got {}", seconds)));
                }
                Recurrence::Interval(_) => {}
                Recurrence::Cron(expression) => {
                    StandardCron::parse(&expression).map_err(|e| invalid(e.to_string()))?;
                }
            }
        }

        Ok(())
    }
}

/// Replace `${VAR}` with the value of environment variable `VAR`.
fn expand_env_vars(content: &str) -> Result<String, SettingsError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| SettingsError::InvalidValue {
        field: "pattern".to_string(),
        message: e.to_string(),
    })?;

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name)
            .map_err(|_| SettingsError::EnvVarNotSet(var_name.to_string()))?;
        result = result.replace(&cap[0], &var_value);
    }
    Ok(result)
}
