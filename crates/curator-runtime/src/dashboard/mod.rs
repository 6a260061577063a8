mod table;

pub use table::{render_queue_table, render_schedule_table};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::registry::Registries;

/// One recurring schedule as shown to operators.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRow {
    pub job: String,
    pub queue: String,
    pub schedule: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub runs: u64,
}

/// One queued or executing job.
#[derive(Debug, Clone, Serialize)]
pub struct QueueRow {
    pub job: String,
    pub queue: String,
    pub id: Uuid,
    pub state: String,
    pub added: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
}

/// Aggregate counts for a status line.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub schedules: usize,
    pub running_schedules: usize,
    pub queued: usize,
    pub executing: usize,
    pub next_run: Option<DateTime<Utc>>,
}

/// Schedule rows ordered by job name.
pub fn schedule_rows(registries: &Registries) -> Vec<ScheduleRow> {
    registries
        .schedules
        .snapshot()
        .into_iter()
        .map(|s| ScheduleRow {
            job: s.job_name,
            queue: s.queue,
            schedule: s.schedule.to_string(),
            last_run: s.last_run,
            next_run: s.next_run,
            is_running: s.is_running,
            runs: s.runs,
        })
        .collect()
}

/// Queue rows ordered by submission time.
pub fn queue_rows(registries: &Registries) -> Vec<QueueRow> {
    registries
        .queue
        .snapshot()
        .into_iter()
        .map(|j| QueueRow {
            state: j.state().as_str().to_string(),
            job: j.name,
            queue: j.queue,
            id: j.id,
            added: j.added,
            started: j.started,
        })
        .collect()
}

/// Summarize both registries.
pub fn summary(registries: &Registries) -> StatusSummary {
    let schedules = registries.schedules.snapshot();
    let jobs = registries.queue.snapshot();
    let executing = jobs.iter().filter(|j| j.is_started()).count();

    StatusSummary {
        schedules: schedules.len(),
        running_schedules: schedules.iter().filter(|s| s.is_running).count(),
        queued: jobs.len() - executing,
        executing,
        next_run: schedules.iter().filter_map(|s| s.next_run).min(),
    }
}
