use chrono::{DateTime, Utc};
use curator_core::job::JobInfo;

use crate::registry::Registries;

/// Outcome of the duplicate check for a dequeued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    /// Hand the job to a worker.
    Proceed,
    /// A job of the same family is already executing.
    Duplicate { running: JobInfo },
}

/// Drops a job when an equivalent one is already running.
#[derive(Clone)]
pub struct DedupPolicy {
    registries: Registries,
}

impl DedupPolicy {
    pub fn new(registries: Registries) -> Self {
        Self { registries }
    }

    /// Check a candidate against the started jobs in the queue registry.
    pub fn check(&self, candidate: &JobInfo) -> DedupDecision {
        match self.registries.queue.find_started_in_family(
            &self.registries.families,
            &candidate.name,
            candidate.id,
        ) {
            Some(running) => DedupDecision::Duplicate { running },
            None => DedupDecision::Proceed,
        }
    }

    /// Mark a candidate as started, or report the family member in its way.
    ///
    /// Unlike [`DedupPolicy::check`], this is atomic with the started mark.
    /// It is the authoritative decision, taken by the worker right before
    /// the body runs.
    pub fn claim(&self, candidate: &JobInfo, at: DateTime<Utc>) -> DedupDecision {
        match self
            .registries
            .queue
            .try_start(candidate, &self.registries.families, at)
        {
            Ok(()) => DedupDecision::Proceed,
            Err(running) => DedupDecision::Duplicate { running },
        }
    }
}
