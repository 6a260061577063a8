mod dispatcher;
mod job;
mod logging;

pub use dispatcher::DispatcherConfig;
pub use job::JobConfig;
pub use logging::{LoggingConfig, StatusConfig};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{CuratorError, Result};
use crate::job::JobFamilies;

/// Root configuration for Curator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Periodic status reporting.
    #[serde(default)]
    pub status: StatusConfig,

    /// Named dispatchers (one worker pool each).
    #[serde(default)]
    pub dispatchers: Vec<DispatcherConfig>,

    /// Duplicate suppression families.
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Registered jobs.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl CuratorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CuratorError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;

        toml::from_str(&content)
            .map_err(|e| CuratorError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Look up a dispatcher by name.
    pub fn dispatcher(&self, name: &str) -> Option<&DispatcherConfig> {
        self.dispatchers.iter().find(|d| d.name == name)
    }

    /// Check cross-references and triggers.
    pub fn validate(&self) -> Result<()> {
        if self.dispatchers.is_empty() {
            return Err(CuratorError::Config(
                "at least one [[dispatchers]] entry is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for dispatcher in &self.dispatchers {
            if dispatcher.name.trim().is_empty() {
                return Err(CuratorError::Config("dispatcher name is empty".to_string()));
            }
            if !names.insert(dispatcher.name.as_str()) {
                return Err(CuratorError::Config(format!(
                    "duplicate dispatcher '{}'",
                    dispatcher.name
                )));
            }
        }

        for job in &self.jobs {
            if self.dispatcher(&job.dispatcher).is_none() {
                return Err(CuratorError::Config(format!(
                    "job '{}' references unknown dispatcher '{}'",
                    job.name, job.dispatcher
                )));
            }
            job.validate()?;
        }

        JobFamilies::from_config(&self.dedup)?;
        Ok(())
    }
}

/// Dedup configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Declared job families.
    #[serde(default)]
    pub families: Vec<FamilyConfig>,
}

/// One family of mutually exclusive job names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyConfig {
    /// Family key, usually the shared target entity.
    pub key: String,

    /// Job names belonging to the family.
    pub members: Vec<String>,
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CuratorError::Config(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    use crate::schedule::{Schedule, ScheduleKind};

    const FULL: &str = r#"
        [logging]
        level = "debug"
        json_format = true

        [status]
        log_interval_secs = 60

        [[dispatchers]]
        name = "search"
        max_workers = 2
        max_queue = 50

        [[dispatchers]]
        name = "data"

        [[dedup.families]]
        key = "missing_MoviesEN"
        members = ["searchmissinginc_MoviesEN", "searchmissingfull_MoviesEN"]

        [[jobs]]
        name = "searchmissinginc_MoviesEN"
        dispatcher = "search"
        interval_secs = 3600
        command = ["true"]

        [[jobs]]
        name = "searchmissingfull_MoviesEN"
        dispatcher = "search"
        cron = "0 0 3 * * *"
        timezone = "Europe/Berlin"
        command = ["true"]

        [[jobs]]
        name = "scan_library"
        dispatcher = "data"
        delay_secs = 5
        command = ["true"]
    "#;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [[dispatchers]]
            name = "data"
        "#;

        let config = assert_ok!(CuratorConfig::parse_toml(toml));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.status.log_interval_secs, 300);
        assert_eq!(config.dispatchers[0].max_workers, 1);
        assert_eq!(config.dispatchers[0].max_queue, 100);
        assert!(config.jobs.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let config = CuratorConfig::parse_toml(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.dispatchers.len(), 2);
        assert_eq!(config.dispatcher("search").unwrap().max_workers, 2);
        assert_eq!(config.dedup.families[0].members.len(), 2);

        let interval = config.jobs[0].schedule().unwrap().unwrap();
        assert!(matches!(interval, Schedule::Interval { every } if every == Duration::from_secs(3600)));

        let cron = config.jobs[1].schedule().unwrap().unwrap();
        assert_eq!(cron.kind(), ScheduleKind::Cron);

        assert!(config.jobs[2].schedule().unwrap().is_none());
        assert_eq!(config.jobs[2].delay(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CURATOR_TEST_API", "http://localhost:7878/api");

        let toml = r#"
            [[dispatchers]]
            name = "data"

            [[jobs]]
            name = "refresh_feeds"
            dispatcher = "data"
            interval_secs = 60
            command = ["curl", "${CURATOR_TEST_API}"]
        "#;

        let config = CuratorConfig::parse_toml(toml).unwrap();
        assert_eq!(config.jobs[0].command[1], "http://localhost:7878/api");

        std::env::remove_var("CURATOR_TEST_API");
    }

    #[test]
    fn test_validate_requires_dispatcher() {
        let config = CuratorConfig::default();
        assert!(matches!(config.validate(), Err(CuratorError::Config(_))));
    }

    #[test]
    fn test_validate_duplicate_dispatcher() {
        let toml = r#"
            [[dispatchers]]
            name = "data"

            [[dispatchers]]
            name = "data"
        "#;
        let err = CuratorConfig::parse_toml(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("duplicate dispatcher"));
    }

    #[test]
    fn test_validate_unknown_dispatcher() {
        let toml = r#"
            [[dispatchers]]
            name = "data"

            [[jobs]]
            name = "refresh_feeds"
            dispatcher = "feeds"
            interval_secs = 60
            command = ["true"]
        "#;
        let err = CuratorConfig::parse_toml(toml).unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("unknown dispatcher"));
    }

    #[test]
    fn test_validate_family_conflict() {
        let toml = r#"
            [[dispatchers]]
            name = "search"

            [[dedup.families]]
            key = "a"
            members = ["searchmissinginc_MoviesEN"]

            [[dedup.families]]
            key = "b"
            members = ["searchmissinginc_MoviesEN"]
        "#;
        let err = CuratorConfig::parse_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, CuratorError::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = assert_err!(CuratorConfig::parse_toml("[[dispatchers]\nname = "));
        assert!(err.to_string().starts_with("Configuration error: Failed to parse config"));
    }
}
