use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use curator_core::schedule::Schedule;
use uuid::Uuid;

/// A registered recurring schedule and its run bookkeeping.
#[derive(Debug, Clone)]
pub struct JobSchedule {
    /// Schedule ID, carried by every job it produces.
    pub id: Uuid,
    /// Name of the jobs it produces.
    pub job_name: String,
    /// Owning dispatcher.
    pub queue: String,
    /// Recurrence.
    pub schedule: Schedule,
    /// Registration time. Interval fire times are `anchor + k * every`.
    pub anchor: DateTime<Utc>,
    /// ID of the most recent execution.
    pub last_job_id: Option<Uuid>,
    /// When the most recent execution started.
    pub last_run: Option<DateTime<Utc>>,
    /// Next expected fire time.
    pub next_run: Option<DateTime<Utc>>,
    /// True while an execution is inside a worker.
    pub is_running: bool,
    /// Started executions.
    pub runs: u64,
}

impl JobSchedule {
    /// Create a schedule whose first fire time is computed from `now`.
    pub fn new(
        job_name: impl Into<String>,
        queue: impl Into<String>,
        schedule: Schedule,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            job_name: job_name.into(),
            queue: queue.into(),
            schedule,
            anchor: now,
            last_job_id: None,
            last_run: None,
            next_run: None,
            is_running: false,
            runs: 0,
        };
        entry.next_run = entry.next_after(now);
        entry
    }

    /// First fire time strictly after `after`.
    ///
    /// Intervals stay on the grid started at `anchor`, the same phase the
    /// ticker fires on, however late a run started.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.schedule {
            Schedule::Interval { every } => {
                let step = chrono::Duration::from_std(*every).ok()?;
                let step_ns = step.num_nanoseconds().filter(|ns| *ns > 0)?;
                let first = self.anchor + step;
                if after < first {
                    return Some(first);
                }
                let periods = (after - first).num_nanoseconds()? / step_ns + 1;
                let offset = step_ns.checked_mul(periods)?;
                first.checked_add_signed(chrono::Duration::nanoseconds(offset))
            }
            Schedule::Cron(_) => self.schedule.next_after(after),
        }
    }
}

/// Process-wide table of recurring schedules.
#[derive(Debug, Clone, Default)]
pub struct ScheduleRegistry {
    schedules: Arc<RwLock<HashMap<Uuid, JobSchedule>>>,
}

impl ScheduleRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, JobSchedule>> {
        self.schedules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, JobSchedule>> {
        self.schedules.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a schedule.
    pub fn add(&self, schedule: JobSchedule) {
        self.write().insert(schedule.id, schedule);
    }

    /// Remove a schedule.
    pub fn remove(&self, id: Uuid) -> Option<JobSchedule> {
        self.write().remove(&id)
    }

    /// Find a schedule by job name.
    pub fn find(&self, job_name: &str) -> Option<JobSchedule> {
        self.read()
            .values()
            .find(|s| s.job_name == job_name)
            .cloned()
    }

    /// Get a schedule by ID.
    pub fn get(&self, id: Uuid) -> Option<JobSchedule> {
        self.read().get(&id).cloned()
    }

    /// Replace the recurrence of every schedule for `job_name`.
    ///
    /// Only the bookkeeping changes; a running ticker or cron runner keeps
    /// its own timer.
    pub fn update(&self, job_name: &str, schedule: Schedule) -> bool {
        let now = Utc::now();
        let mut found = false;
        for entry in self
            .write()
            .values_mut()
            .filter(|s| s.job_name == job_name)
        {
            entry.schedule = schedule.clone();
            entry.next_run = entry.next_after(entry.last_run.unwrap_or(now).max(now));
            found = true;
        }
        found
    }

    /// Record that an execution of this schedule started.
    pub fn mark_running(&self, id: Uuid, job_id: Uuid, at: DateTime<Utc>) -> bool {
        match self.write().get_mut(&id) {
            Some(entry) => {
                entry.is_running = true;
                entry.last_run = Some(at);
                entry.last_job_id = Some(job_id);
                entry.runs += 1;
                entry.next_run = entry.next_after(at);
                true
            }
            None => false,
        }
    }

    /// Move `next_run` to the first fire time after `now`.
    pub fn advance(&self, id: Uuid, now: DateTime<Utc>) -> bool {
        match self.write().get_mut(&id) {
            Some(entry) => {
                entry.next_run = entry.next_after(now);
                true
            }
            None => false,
        }
    }

    /// Record that the current execution returned.
    pub fn mark_finished(&self, id: Uuid) -> bool {
        match self.write().get_mut(&id) {
            Some(entry) => {
                entry.is_running = false;
                true
            }
            None => false,
        }
    }

    /// Set the next expected fire time.
    pub fn set_next_run(&self, id: Uuid, at: Option<DateTime<Utc>>) -> bool {
        match self.write().get_mut(&id) {
            Some(entry) => {
                entry.next_run = at;
                true
            }
            None => false,
        }
    }

    /// All schedules, ordered by job name.
    pub fn snapshot(&self) -> Vec<JobSchedule> {
        let mut schedules: Vec<JobSchedule> = self.read().values().cloned().collect();
        schedules.sort_by(|a, b| a.job_name.cmp(&b.job_name).then_with(|| a.id.cmp(&b.id)));
        schedules
    }

    /// Get the number of registered schedules.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn interval(secs: u64) -> Schedule {
        Schedule::interval(Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn test_empty_registry() {
        let registry = ScheduleRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.find("refresh_feeds").is_none());
    }

    #[test]
    fn test_new_schedule_next_run() {
        let now = Utc::now();
        let schedule = JobSchedule::new("refresh_feeds", "data", interval(60), now);
        assert_eq!(schedule.next_run, Some(now + chrono::Duration::seconds(60)));
        assert!(!schedule.is_running);
        assert_eq!(schedule.runs, 0);
    }

    #[test]
    fn test_running_bookkeeping() {
        let registry = ScheduleRegistry::new();
        let schedule = JobSchedule::new("refresh_feeds", "data", interval(60), Utc::now());
        let id = schedule.id;
        registry.add(schedule);

        let job_id = Uuid::new_v4();
        let at = Utc::now();
        assert!(registry.mark_running(id, job_id, at));

        let entry = registry.get(id).unwrap();
        assert!(entry.is_running);
        assert_eq!(entry.last_run, Some(at));
        assert_eq!(entry.last_job_id, Some(job_id));
        assert_eq!(entry.runs, 1);
        assert!(entry.next_run.unwrap() > at);

        assert!(registry.mark_finished(id));
        assert!(!registry.get(id).unwrap().is_running);

        registry.remove(id);
        assert!(!registry.mark_running(id, job_id, at));
        assert!(!registry.mark_finished(id));
    }

    #[test]
    fn test_interval_next_run_keeps_phase() {
        let registry = ScheduleRegistry::new();
        let anchor = Utc::now();
        let schedule = JobSchedule::new("refresh_feeds", "data", interval(10), anchor);
        let id = schedule.id;
        registry.add(schedule);
        let tick = |k: i64| anchor + chrono::Duration::seconds(10 * k);

        // A run that starts late does not shift the grid.
        let late = tick(1) + chrono::Duration::seconds(3);
        registry.mark_running(id, Uuid::new_v4(), late);
        assert_eq!(registry.get(id).unwrap().next_run, Some(tick(2)));

        // The ticker advancing at its tick agrees with the worker.
        assert!(registry.advance(id, tick(1)));
        assert_eq!(registry.get(id).unwrap().next_run, Some(tick(2)));

        // Missed periods are skipped.
        registry.advance(id, tick(5) + chrono::Duration::milliseconds(1));
        assert_eq!(registry.get(id).unwrap().next_run, Some(tick(6)));

        registry.remove(id);
        assert!(!registry.advance(id, anchor));
    }

    #[test]
    fn test_update_by_name() {
        let registry = ScheduleRegistry::new();
        registry.add(JobSchedule::new("scan_library", "data", interval(60), Utc::now()));

        assert!(registry.update("scan_library", interval(600)));
        let entry = registry.find("scan_library").unwrap();
        assert!(matches!(entry.schedule, Schedule::Interval { every } if every == Duration::from_secs(600)));
        assert!(entry.next_run.unwrap() > Utc::now() + chrono::Duration::seconds(500));

        assert!(!registry.update("missing", interval(600)));
    }

    #[test]
    fn test_snapshot_sorted_by_name() {
        let registry = ScheduleRegistry::new();
        registry.add(JobSchedule::new("scan_library", "data", interval(60), Utc::now()));
        registry.add(JobSchedule::new("refresh_feeds", "data", interval(60), Utc::now()));

        let names: Vec<String> = registry.snapshot().into_iter().map(|s| s.job_name).collect();
        assert_eq!(names, vec!["refresh_feeds", "scan_library"]);
    }
}
