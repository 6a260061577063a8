use std::time::Duration;

use chrono::Utc;
use curator_core::job::JobFn;
use curator_core::schedule::Schedule;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::registry::{JobSchedule, ScheduleRegistry};
use crate::jobs::Submitter;

/// Handle to a fixed-interval recurrence.
///
/// Stopping it ends future submissions and removes the schedule. Jobs
/// already queued or running are unaffected.
#[derive(Debug, Clone)]
pub struct DispatchTicker {
    id: Uuid,
    cancel: CancellationToken,
    schedules: ScheduleRegistry,
}

impl DispatchTicker {
    pub(crate) fn spawn(
        submitter: Submitter,
        name: String,
        run: JobFn,
        every: Duration,
        cancel: CancellationToken,
    ) -> Self {
        let schedules = submitter.registries().schedules.clone();
        let entry = JobSchedule::new(
            name.as_str(),
            submitter.queue(),
            Schedule::Interval { every },
            Utc::now(),
        );
        let id = entry.id;
        schedules.add(entry);

        tracing::info!(
            dispatcher = %submitter.queue(),
            schedule_id = %id,
            job = %name,
            every_ms = every.as_millis() as u64,
            "Interval schedule registered"
        );

        let token = cancel.clone();
        let registry = schedules.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                registry.advance(id, Utc::now());

                let job = submitter.job(&name, run.clone()).with_scheduler(id);
                let submitted = tokio::select! {
                    _ = token.cancelled() => break,
                    submitted = submitter.submit(job) => submitted,
                };
                if let Err(e) = submitted {
                    tracing::debug!(schedule_id = %id, job = %name, error = %e, "Ticker stopping");
                    break;
                }
            }
        });

        Self {
            id,
            cancel,
            schedules,
        }
    }

    /// Schedule ID carried by every job this ticker produces.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Check whether the ticker was stopped.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the ticker. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
        if self.schedules.remove(self.id).is_some() {
            tracing::debug!(schedule_id = %self.id, "Interval schedule removed");
        }
    }
}
