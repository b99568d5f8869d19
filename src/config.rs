use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::utils::get_env_with_prefix;

/// Ledger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Renewals may stack the expiration up to this many years past today.
    #[serde(default = "default_renewal_window_years")]
    pub renewal_window_years: u32,
    /// Days granted on top of every purchased period.
    #[serde(default = "default_extra_days")]
    pub extra_days: u32,
    /// Currency settled by this ledger, lower case.
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Post-commit task queue settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasksConfig {
    /// Tasks that may wait in the queue before new ones are dropped.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Attempts after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base retry delay (exponential backoff: base * 2^attempt)
    #[serde(default = "default_retry_backoff_millis")]
    pub retry_backoff_millis: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            renewal_window_years: default_renewal_window_years(),
            extra_days: default_extra_days(),
            currency: default_currency(),
            logging: LoggingConfig::default(),
            tasks: TasksConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_retries: default_max_retries(),
            retry_backoff_millis: default_retry_backoff_millis(),
        }
    }
}

fn default_renewal_window_years() -> u32 {
    3
}

fn default_extra_days() -> u32 {
    1
}

fn default_currency() -> String {
    "cny".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_capacity() -> usize {
    1024
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_millis() -> u64 {
    500
}

/// Builder for LedgerConfig with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct LedgerConfigBuilder {
    config: LedgerConfig,
}

impl LedgerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: LedgerConfig::default(),
        }
    }

    pub fn with_renewal_window_years(mut self, years: u32) -> Self {
        self.config.renewal_window_years = years;
        self
    }

    pub fn with_extra_days(mut self, days: u32) -> Self {
        self.config.extra_days = days;
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.config.currency = currency.into().to_lowercase();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    pub fn with_tasks(mut self, tasks: TasksConfig) -> Self {
        self.config.tasks = tasks;
        self
    }

    /// Load configuration from environment variables with SUBS_ prefix
    pub fn from_env(mut self) -> Self {
        if let Some(years) = get_env_with_prefix("RENEWAL_WINDOW_YEARS") {
            if let Ok(y) = years.parse() {
                self.config.renewal_window_years = y;
            }
        }
        if let Some(days) = get_env_with_prefix("EXTRA_DAYS") {
            if let Ok(d) = days.parse() {
                self.config.extra_days = d;
            }
        }
        if let Some(currency) = get_env_with_prefix("CURRENCY") {
            self.config.currency = currency.to_lowercase();
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Some(capacity) = get_env_with_prefix("TASKS_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.config.tasks.capacity = c;
            }
        }
        if let Some(retries) = get_env_with_prefix("TASKS_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                self.config.tasks.max_retries = r;
            }
        }
        if let Some(backoff) = get_env_with_prefix("TASKS_RETRY_BACKOFF_MILLIS") {
            if let Ok(b) = backoff.parse() {
                self.config.tasks.retry_backoff_millis = b;
            }
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Config`] for an unknown log level, an empty
    /// currency, a zero renewal window or a zero queue capacity.
    pub fn build(self) -> Result<LedgerConfig> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(LedgerError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        if self.config.renewal_window_years == 0 {
            return Err(LedgerError::config(
                "Renewal window must be at least one year",
            ));
        }

        if self.config.currency.is_empty() {
            return Err(LedgerError::config("Currency must not be empty"));
        }

        if self.config.tasks.capacity == 0 {
            return Err(LedgerError::config(
                "Task queue capacity must be greater than 0",
            ));
        }

        Ok(self.config)
    }
}

impl Default for LedgerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfigBuilder::new().build().unwrap();
        assert_eq!(config.renewal_window_years, 3);
        assert_eq!(config.extra_days, 1);
        assert_eq!(config.currency, "cny");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.tasks.max_retries, 3);
    }

    #[test]
    fn test_builder_validation() {
        assert!(
            LedgerConfigBuilder::new()
                .with_log_level("loud")
                .build()
                .is_err()
        );
        assert!(
            LedgerConfigBuilder::new()
                .with_renewal_window_years(0)
                .build()
                .is_err()
        );
        assert!(
            LedgerConfigBuilder::new()
                .with_tasks(TasksConfig {
                    capacity: 0,
                    ..TasksConfig::default()
                })
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_currency_is_lowercased() {
        let config = LedgerConfigBuilder::new()
            .with_currency("CNY")
            .build()
            .unwrap();
        assert_eq!(config.currency, "cny");
    }

    #[test]
    fn test_from_env() {
        unsafe {
            std::env::set_var("SUBS_RENEWAL_WINDOW_YEARS", "5");
            std::env::set_var("SUBS_TASKS_CAPACITY", "not-a-number");
        }
        let config = LedgerConfigBuilder::new().from_env().build().unwrap();
        assert_eq!(config.renewal_window_years, 5);
        assert_eq!(config.tasks.capacity, 1024);
        unsafe {
            std::env::remove_var("SUBS_RENEWAL_WINDOW_YEARS");
            std::env::remove_var("SUBS_TASKS_CAPACITY");
        }
    }

    #[test]
    fn test_deserialize_partial() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{"renewal_window_years": 2, "tasks": {"capacity": 8}}"#)
                .unwrap();
        assert_eq!(config.renewal_window_years, 2);
        assert_eq!(config.extra_days, 1);
        assert_eq!(config.tasks.capacity, 8);
        assert_eq!(config.tasks.retry_backoff_millis, 500);
    }
}
