mod family;

pub use family::JobFamilies;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Future returned by a job body.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A reusable job body. Recurring schedules invoke it once per firing.
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Wrap an async closure as a job body.
pub fn job_fn<F, Fut>(f: F) -> JobFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as JobFuture)
}

/// Wrap a synchronous closure as a job body run on the blocking thread pool.
///
/// A panic in `f` is re-raised on the awaiting task so the worker's panic
/// handling sees it.
pub fn blocking<F>(f: F) -> JobFn
where
    F: Fn() + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move || {
        let f = f.clone();
        Box::pin(async move {
            if let Err(e) = tokio::task::spawn_blocking(move || f()).await {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }) as JobFuture
    })
}

/// Lifecycle state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for a free worker.
    Queued,
    /// Executing inside a worker.
    Running,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
        }
    }
}

/// One unit of schedulable work.
#[derive(Clone)]
pub struct Job {
    /// Name of the owning dispatcher.
    pub queue: String,
    /// Unique execution ID.
    pub id: Uuid,
    /// When the job was submitted.
    pub added: DateTime<Utc>,
    /// When a worker began executing it.
    pub started: Option<DateTime<Utc>>,
    /// Human job key, shared by recurring executions.
    pub name: String,
    /// Schedule that produced this execution, if any.
    pub scheduler_id: Option<Uuid>,
    run: JobFn,
}

impl Job {
    /// Create a new one-shot job.
    pub fn new(queue: impl Into<String>, name: impl Into<String>, run: JobFn) -> Self {
        Self {
            queue: queue.into(),
            id: Uuid::new_v4(),
            added: Utc::now(),
            started: None,
            name: name.into(),
            scheduler_id: None,
            run,
        }
    }

    /// Link this execution to a recurring schedule.
    pub fn with_scheduler(mut self, scheduler_id: Uuid) -> Self {
        self.scheduler_id = Some(scheduler_id);
        self
    }

    /// Check if a worker has picked this job up.
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Build the future for one execution of the body.
    pub fn run(&self) -> JobFuture {
        (self.run)()
    }

    /// Metadata view without the body.
    pub fn info(&self) -> JobInfo {
        JobInfo {
            queue: self.queue.clone(),
            id: self.id,
            added: self.added,
            started: self.started,
            name: self.name.clone(),
            scheduler_id: self.scheduler_id,
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("queue", &self.queue)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("added", &self.added)
            .field("started", &self.started)
            .field("scheduler_id", &self.scheduler_id)
            .finish_non_exhaustive()
    }
}

/// Job metadata as held by registries and returned in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub queue: String,
    pub id: Uuid,
    pub added: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub name: String,
    pub scheduler_id: Option<Uuid>,
}

impl JobInfo {
    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    pub fn state(&self) -> JobState {
        if self.is_started() {
            JobState::Running
        } else {
            JobState::Queued
        }
    }
}
