//! Recurrence definitions for scheduled jobs.

mod cron;

pub use self::cron::CronSchedule;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{CuratorError, Result};

/// Kind of recurrence backing a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Interval,
    Cron,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Cron => "cron",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a recurring job fires.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fire every `every`, starting one period after registration.
    Interval { every: Duration },
    /// Fire on each match of a cron expression.
    Cron(CronSchedule),
}

impl Schedule {
    /// Create an interval schedule. A zero period is rejected.
    pub fn interval(every: Duration) -> Result<Self> {
        if every.is_zero() {
            return Err(CuratorError::InvalidSchedule(
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self::Interval { every })
    }

    /// Create a cron schedule evaluated in UTC.
    pub fn cron(expression: &str) -> Result<Self> {
        CronSchedule::new(expression).map(Self::Cron)
    }

    /// Get the schedule kind.
    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::Interval { .. } => ScheduleKind::Interval,
            Self::Cron(_) => ScheduleKind::Cron,
        }
    }

    /// Earliest fire time strictly after `from`.
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Interval { every } => {
                let step = chrono::Duration::from_std(*every).ok()?;
                from.checked_add_signed(step)
            }
            Self::Cron(cron) => cron.next_after(from),
        }
    }

    /// Up to `count` fire times after `from`.
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        match self {
            Self::Cron(cron) => cron.upcoming(from, count),
            Self::Interval { .. } => {
                let mut times = Vec::with_capacity(count);
                let mut cursor = from;
                while times.len() < count {
                    match self.next_after(cursor) {
                        Some(next) => {
                            times.push(next);
                            cursor = next;
                        }
                        None => break,
                    }
                }
                times
            }
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { every } => write!(f, "every {}", format_duration(*every)),
            Self::Cron(cron) if cron.timezone() == Tz::UTC => {
                write!(f, "cron {}", cron.expression())
            }
            Self::Cron(cron) => write!(f, "cron {} ({})", cron.expression(), cron.timezone()),
        }
    }
}

/// Compact human form, e.g. `1h30m`, `45s`, `250ms`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    if total == 0 {
        return format!("{}ms", d.as_millis());
    }

    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{}s", seconds));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_rejected() {
        let err = Schedule::interval(Duration::ZERO).unwrap_err();
        assert!(matches!(err, CuratorError::InvalidSchedule(_)));
    }

    #[test]
    fn test_interval_next_after() {
        let schedule = Schedule::interval(Duration::from_secs(90)).unwrap();
        let from = Utc::now();
        assert_eq!(
            schedule.next_after(from),
            Some(from + chrono::Duration::seconds(90))
        );
        assert_eq!(schedule.kind(), ScheduleKind::Interval);
    }

    #[test]
    fn test_interval_upcoming() {
        let schedule = Schedule::interval(Duration::from_secs(60)).unwrap();
        let from = Utc::now();
        let times = schedule.upcoming(from, 3);
        assert_eq!(times.len(), 3);
        assert_eq!(times[2], from + chrono::Duration::seconds(180));
    }

    #[test]
    fn test_cron_kind_and_display() {
        let schedule = Schedule::cron("0 */15 * * * *").unwrap();
        assert_eq!(schedule.kind(), ScheduleKind::Cron);
        assert_eq!(schedule.to_string(), "cron 0 */15 * * * *");

        let berlin = Schedule::Cron(CronSchedule::with_timezone("0 0 3 * * *", "Europe/Berlin").unwrap());
        assert_eq!(berlin.to_string(), "cron 0 0 3 * * * (Europe/Berlin)");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(Schedule::interval(Duration::from_secs(120)).unwrap().to_string(), "every 2m");
    }

    #[test]
    fn test_kind_serialization() {
        assert_eq!(serde_json::to_string(&ScheduleKind::Cron).unwrap(), "\"cron\"");
        assert_eq!(ScheduleKind::Interval.to_string(), "interval");
    }
}
