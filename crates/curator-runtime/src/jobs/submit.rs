use curator_core::error::{CuratorError, Result};
use curator_core::job::{Job, JobFn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::registry::Registries;

/// Pushes jobs into one dispatcher's queue.
///
/// Shared by direct submissions, delayed submissions, tickers and cron
/// runners. Holds a sender only while the dispatcher is active.
#[derive(Clone)]
pub(crate) struct Submitter {
    queue: String,
    tx: mpsc::Sender<Job>,
    registries: Registries,
}

impl Submitter {
    pub(crate) fn new(queue: impl Into<String>, tx: mpsc::Sender<Job>, registries: Registries) -> Self {
        Self {
            queue: queue.into(),
            tx,
            registries,
        }
    }

    pub(crate) fn queue(&self) -> &str {
        &self.queue
    }

    pub(crate) fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Build a job owned by this queue.
    pub(crate) fn job(&self, name: &str, run: JobFn) -> Job {
        Job::new(self.queue.clone(), name, run)
    }

    /// Wait for queue capacity, record the job, then enqueue it.
    ///
    /// Dropping the future before it resolves leaves no registry entry.
    pub(crate) async fn submit(&self, job: Job) -> Result<Uuid> {
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| CuratorError::NotActive(self.queue.clone()))?;

        let id = job.id;
        tracing::debug!(
            dispatcher = %self.queue,
            job_id = %id,
            job = %job.name,
            "Job queued"
        );
        self.registries.queue.add(job.info());
        permit.send(job);
        Ok(id)
    }
}
