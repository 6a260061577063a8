use serde::{Deserialize, Serialize};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output JSON format.
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Periodic status table logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Seconds between status logs. Zero disables them.
    #[serde(default = "default_log_interval")]
    pub log_interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            log_interval_secs: default_log_interval(),
        }
    }
}

fn default_log_interval() -> u64 {
    300
}
