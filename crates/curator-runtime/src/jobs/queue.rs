use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use curator_core::job::{JobFamilies, JobInfo};
use uuid::Uuid;

/// Process-wide table of jobs that are queued or executing.
///
/// Entries are keyed by job ID so two submissions sharing a name never
/// overwrite each other. Cloning yields another handle to the same table.
#[derive(Debug, Clone, Default)]
pub struct QueueRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobInfo>>>,
}

impl QueueRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, JobInfo>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, JobInfo>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a job. An entry with the same ID is replaced.
    pub fn add(&self, info: JobInfo) {
        self.write().insert(info.id, info);
    }

    /// Remove a job, returning its last known state.
    pub fn remove(&self, id: Uuid) -> Option<JobInfo> {
        self.write().remove(&id)
    }

    /// Find a job by name, preferring one that has started.
    pub fn find(&self, name: &str) -> Option<JobInfo> {
        let jobs = self.read();
        let mut matches = jobs.values().filter(|j| j.name == name);
        let first = matches.next()?;
        if first.is_started() {
            return Some(first.clone());
        }
        Some(matches.find(|j| j.is_started()).unwrap_or(first).clone())
    }

    /// Get a job by ID.
    pub fn get(&self, id: Uuid) -> Option<JobInfo> {
        self.read().get(&id).cloned()
    }

    /// Apply `f` to a job in place. Returns false if it is not present.
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut JobInfo)) -> bool {
        match self.write().get_mut(&id) {
            Some(info) => {
                f(info);
                true
            }
            None => false,
        }
    }

    /// Mark a job as picked up by a worker.
    pub fn mark_started(&self, id: Uuid, at: DateTime<Utc>) -> bool {
        self.update(id, |info| info.started = Some(at))
    }

    /// Mark `job` as started unless another job of its family already is.
    ///
    /// The family check and the mark happen under one write lock, so of two
    /// same-family jobs racing here exactly one wins. The loser gets the
    /// running job back. A job missing from the table is inserted.
    pub fn try_start(
        &self,
        job: &JobInfo,
        families: &JobFamilies,
        at: DateTime<Utc>,
    ) -> Result<(), JobInfo> {
        let mut jobs = self.write();
        if let Some(running) = jobs
            .values()
            .find(|j| j.id != job.id && j.is_started() && families.same_family(&j.name, &job.name))
        {
            return Err(running.clone());
        }

        jobs.entry(job.id)
            .or_insert_with(|| job.clone())
            .started = Some(at);
        Ok(())
    }

    /// Find a started job, other than `exclude`, in the same family as `name`.
    pub fn find_started_in_family(
        &self,
        families: &JobFamilies,
        name: &str,
        exclude: Uuid,
    ) -> Option<JobInfo> {
        self.read()
            .values()
            .find(|j| j.id != exclude && j.is_started() && families.same_family(&j.name, name))
            .cloned()
    }

    /// All jobs, oldest submission first.
    pub fn snapshot(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.read().values().cloned().collect();
        jobs.sort_by(|a, b| a.added.cmp(&b.added).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Jobs belonging to one dispatcher, oldest first.
    pub fn for_queue(&self, queue: &str) -> Vec<JobInfo> {
        let mut jobs = self.snapshot();
        jobs.retain(|j| j.queue == queue);
        jobs
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if no job is tracked.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
