use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CuratorError, Result};
use crate::schedule::{CronSchedule, Schedule};

/// A configured job and its trigger.
///
/// Exactly one of `interval_secs`, `cron` and `delay_secs` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job key, used for dedup and dashboards.
    pub name: String,

    /// Dispatcher the job is submitted to.
    pub dispatcher: String,

    /// Fixed interval in seconds.
    #[serde(default)]
    pub interval_secs: Option<u64>,

    /// Cron expression (five, six or seven fields).
    #[serde(default)]
    pub cron: Option<String>,

    /// IANA timezone for `cron`. Defaults to UTC.
    #[serde(default)]
    pub timezone: Option<String>,

    /// One-shot delay after startup, in seconds.
    #[serde(default)]
    pub delay_secs: Option<u64>,

    /// Program and arguments to execute.
    #[serde(default)]
    pub command: Vec<String>,
}

impl JobConfig {
    /// Build the recurring schedule, or `None` for a one-shot job.
    pub fn schedule(&self) -> Result<Option<Schedule>> {
        if let Some(secs) = self.interval_secs {
            return Schedule::interval(Duration::from_secs(secs)).map(Some);
        }

        match (&self.cron, &self.timezone) {
            (Some(expr), Some(tz)) => Ok(Some(Schedule::Cron(CronSchedule::with_timezone(
                expr, tz,
            )?))),
            (Some(expr), None) => Schedule::cron(expr).map(Some),
            (None, _) => Ok(None),
        }
    }

    /// One-shot delay, if this job is not recurring.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_secs.map(Duration::from_secs)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let triggers = [
            self.interval_secs.is_some(),
            self.cron.is_some(),
            self.delay_secs.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if triggers != 1 {
            return Err(CuratorError::Config(format!(
                "job '{}' must set exactly one of interval_secs, cron or delay_secs",
                self.name
            )));
        }
        if self.timezone.is_some() && self.cron.is_none() {
            return Err(CuratorError::Config(format!(
                "job '{}' sets a timezone without a cron expression",
                self.name
            )));
        }
        if self.command.is_empty() {
            return Err(CuratorError::Config(format!(
                "job '{}' has an empty command",
                self.name
            )));
        }

        self.schedule()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobConfig {
        JobConfig {
            name: "refresh_feeds".to_string(),
            dispatcher: "data".to_string(),
            interval_secs: None,
            cron: None,
            timezone: None,
            delay_secs: None,
            command: vec!["true".to_string()],
        }
    }

    #[test]
    fn test_requires_exactly_one_trigger() {
        assert!(job().validate().is_err());

        let both = JobConfig {
            interval_secs: Some(60),
            delay_secs: Some(1),
            ..job()
        };
        assert!(both.validate().is_err());

        let interval = JobConfig {
            interval_secs: Some(60),
            ..job()
        };
        interval.validate().unwrap();
    }

    #[test]
    fn test_zero_interval_rejected() {
        let zero = JobConfig {
            interval_secs: Some(0),
            ..job()
        };
        assert!(matches!(zero.validate(), Err(CuratorError::InvalidSchedule(_))));
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let bad = JobConfig {
            cron: Some("every tuesday".to_string()),
            ..job()
        };
        assert!(bad.validate().unwrap_err().is_invalid_cron());
    }

    #[test]
    fn test_timezone_requires_cron() {
        let tz = JobConfig {
            interval_secs: Some(60),
            timezone: Some("Europe/Berlin".to_string()),
            ..job()
        };
        assert!(matches!(tz.validate(), Err(CuratorError::Config(_))));
    }

    #[test]
    fn test_empty_command_rejected() {
        let empty = JobConfig {
            delay_secs: Some(0),
            command: Vec::new(),
            ..job()
        };
        assert!(empty.validate().is_err());
    }
}
