use chrono::Utc;
use curator_core::job::JobFn;
use curator_core::schedule::{CronSchedule, Schedule};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::registry::{JobSchedule, ScheduleRegistry};
use crate::jobs::Submitter;

/// Handle to a cron recurrence.
#[derive(Debug, Clone)]
pub struct DispatchCron {
    id: Uuid,
    cancel: CancellationToken,
    schedules: ScheduleRegistry,
}

impl DispatchCron {
    pub(crate) fn spawn(
        submitter: Submitter,
        name: String,
        run: JobFn,
        cron: CronSchedule,
        cancel: CancellationToken,
    ) -> Self {
        let schedules = submitter.registries().schedules.clone();
        let entry = JobSchedule::new(
            name.as_str(),
            submitter.queue(),
            Schedule::Cron(cron.clone()),
            Utc::now(),
        );
        let id = entry.id;
        schedules.add(entry);

        tracing::info!(
            dispatcher = %submitter.queue(),
            schedule_id = %id,
            job = %name,
            cron = %cron.expression(),
            timezone = %cron.timezone(),
            "Cron schedule registered"
        );

        let token = cancel.clone();
        let registry = schedules.clone();
        tokio::spawn(async move {
            // Last fire time; a wakeup slightly ahead of the wall clock must
            // not fire the same match twice.
            let mut cursor = Utc::now();

            loop {
                let now = Utc::now();
                let Some(next) = cron.next_after(cursor.max(now)) else {
                    tracing::warn!(schedule_id = %id, job = %name, "Cron has no upcoming match");
                    registry.set_next_run(id, None);
                    break;
                };
                registry.set_next_run(id, Some(next));

                let wait = (next - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                let job = submitter.job(&name, run.clone()).with_scheduler(id);
                let submitted = tokio::select! {
                    _ = token.cancelled() => break,
                    submitted = submitter.submit(job) => submitted,
                };
                if let Err(e) = submitted {
                    tracing::debug!(schedule_id = %id, job = %name, error = %e, "Cron runner stopping");
                    break;
                }

                cursor = next;
            }
        });

        Self {
            id,
            cancel,
            schedules,
        }
    }

    /// Schedule ID carried by every job this runner produces.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Check whether the runner was stopped.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the runner. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
        if self.schedules.remove(self.id).is_some() {
            tracing::debug!(schedule_id = %self.id, "Cron schedule removed");
        }
    }
}

/// A running recurrence of either kind.
#[derive(Debug, Clone)]
pub enum Recurrence {
    Ticker(super::DispatchTicker),
    Cron(DispatchCron),
}

impl Recurrence {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Ticker(t) => t.id(),
            Self::Cron(c) => c.id(),
        }
    }

    pub fn stop(&self) {
        match self {
            Self::Ticker(t) => t.stop(),
            Self::Cron(c) => c.stop(),
        }
    }
}
