use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

use crate::error::{CuratorError, Result};

/// A parsed cron schedule evaluated in a fixed timezone.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    /// The normalized cron expression (always carries a seconds field).
    expression: String,
    /// Parsed schedule.
    schedule: ::cron::Schedule,
    /// Timezone the expression is evaluated in.
    timezone: Tz,
}

impl CronSchedule {
    /// Parse an expression evaluated in UTC.
    pub fn new(expression: &str) -> Result<Self> {
        Self::parse(expression, Tz::UTC)
    }

    /// Parse an expression evaluated in the named IANA timezone.
    pub fn with_timezone(expression: &str, timezone: &str) -> Result<Self> {
        let tz: Tz = timezone.parse().map_err(|_| {
            CuratorError::InvalidSchedule(format!("unknown timezone '{}'", timezone))
        })?;
        Self::parse(expression, tz)
    }

    fn parse(expression: &str, timezone: Tz) -> Result<Self> {
        let normalized = normalize_cron_expression(expression);

        let schedule =
            ::cron::Schedule::from_str(&normalized).map_err(|e| CuratorError::InvalidCron {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: normalized,
            schedule,
            timezone,
        })
    }

    /// Get the cron expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Get the evaluation timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Get the first match strictly after the given time.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Get up to `count` matches after the given time.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .take(count)
            .map(|dt| dt.with_timezone(&Utc))
            .collect()
    }

    /// Get all matches between two times.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let local_start = start.with_timezone(&self.timezone);
        self.schedule
            .after(&local_start)
            .map(|dt| dt.with_timezone(&Utc))
            .take_while(|dt| *dt < end)
            .collect()
    }
}

/// Normalize a cron expression to include seconds.
fn normalize_cron_expression(expr: &str) -> String {
    let parts: Vec<&str> = expr.split_whitespace().collect();

    match parts.len() {
        5 => format!("0 {}", parts.join(" ")),
        _ => parts.join(" "), // Let the parser handle the rest
    }
}
