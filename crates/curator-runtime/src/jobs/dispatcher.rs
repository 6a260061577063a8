use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use curator_core::error::{CuratorError, Result};
use curator_core::job::{Job, JobFn, JobInfo};
use curator_core::schedule::{CronSchedule, Schedule};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dedup::{DedupDecision, DedupPolicy};
use super::submit::Submitter;
use super::worker::{Worker, WorkerSlot};
use crate::registry::Registries;
use crate::schedule::{DispatchCron, DispatchTicker, Recurrence};

/// Dispatcher lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Active,
    Stopped,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Stopped => "stopped",
        }
    }
}

/// Result of a drain after stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainResult {
    /// All workers finished.
    Completed,
    /// Timeout reached with this many workers still busy.
    Timeout(usize),
}

struct Inner {
    lifecycle: Lifecycle,
    submitter: Option<Submitter>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    tickers: Vec<DispatchTicker>,
    crons: Vec<DispatchCron>,
}

/// A named worker pool with its own job queue.
///
/// Jobs submitted through any of the `dispatch*` methods are queued, checked
/// against the dedup policy, then handed to the next idle worker.
pub struct Dispatcher {
    name: String,
    max_workers: usize,
    max_queue: usize,
    registries: Registries,
    inner: Mutex<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher. Nothing runs until [`Dispatcher::start`].
    pub fn new(
        name: impl Into<String>,
        max_workers: usize,
        max_queue: usize,
        registries: Registries,
    ) -> Self {
        let name = name.into();
        if max_workers == 0 {
            tracing::warn!(dispatcher = %name, "max_workers is 0, using 1");
        }
        if max_queue == 0 {
            tracing::warn!(dispatcher = %name, "max_queue is 0, using 1");
        }

        Self {
            name,
            max_workers: max_workers.max(1),
            max_queue: max_queue.max(1),
            registries,
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::Created,
                submitter: None,
                shutdown: CancellationToken::new(),
                tasks: Vec::new(),
                tickers: Vec::new(),
                crons: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn max_queue(&self) -> usize {
        self.max_queue
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lock().lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn not_active(&self) -> CuratorError {
        CuratorError::NotActive(self.name.clone())
    }

    fn active(&self) -> Result<(Submitter, CancellationToken)> {
        let inner = self.lock();
        match (&inner.lifecycle, &inner.submitter) {
            (Lifecycle::Active, Some(submitter)) => Ok((submitter.clone(), inner.shutdown.clone())),
            _ => Err(self.not_active()),
        }
    }

    /// Spawn the workers and the dispatch loop. Must run inside a tokio runtime.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.lifecycle != Lifecycle::Created {
            tracing::warn!(
                dispatcher = %self.name,
                lifecycle = inner.lifecycle.as_str(),
                "Dispatcher can only be started once"
            );
            return;
        }

        let (pool_tx, pool_rx) = mpsc::channel::<WorkerSlot>(self.max_workers);
        let (queue_tx, queue_rx) = mpsc::channel::<Job>(self.max_queue);
        let shutdown = inner.shutdown.clone();

        for id in 0..self.max_workers {
            let worker = Worker::new(
                id,
                self.name.as_str(),
                pool_tx.clone(),
                self.registries.clone(),
                shutdown.clone(),
            );
            inner.tasks.push(tokio::spawn(worker.run()));
        }
        drop(pool_tx);

        let dispatch_loop = DispatchLoop {
            name: self.name.clone(),
            jobs: queue_rx,
            pool: Arc::new(tokio::sync::Mutex::new(pool_rx)),
            dedup: DedupPolicy::new(self.registries.clone()),
            registries: self.registries.clone(),
            shutdown,
        };
        inner.tasks.push(tokio::spawn(dispatch_loop.run()));

        inner.submitter = Some(Submitter::new(
            self.name.as_str(),
            queue_tx,
            self.registries.clone(),
        ));
        inner.lifecycle = Lifecycle::Active;

        tracing::info!(
            dispatcher = %self.name,
            max_workers = self.max_workers,
            max_queue = self.max_queue,
            "Dispatcher started"
        );
    }

    /// Stop recurrences, workers and the dispatch loop.
    ///
    /// Jobs already inside a worker run to completion. The ticker and cron
    /// lists are cleared; worker and loop handles are kept until
    /// [`Dispatcher::shutdown`] drains them, since those tasks may still be
    /// finishing a job. Does nothing unless the dispatcher is active.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.lifecycle != Lifecycle::Active {
            return;
        }

        for ticker in inner.tickers.drain(..) {
            ticker.stop();
        }
        for cron in inner.crons.drain(..) {
            cron.stop();
        }

        inner.shutdown.cancel();
        inner.submitter = None;
        inner.lifecycle = Lifecycle::Stopped;

        tracing::info!(dispatcher = %self.name, "Dispatcher stopped");
    }

    /// Stop, then wait up to `drain_timeout` for in-flight jobs.
    pub async fn shutdown(&self, drain_timeout: Duration) -> DrainResult {
        self.stop();

        let tasks = std::mem::take(&mut self.lock().tasks);
        let deadline = tokio::time::Instant::now() + drain_timeout;
        let poll_interval = Duration::from_millis(50);

        let result = loop {
            let remaining = tasks.iter().filter(|t| !t.is_finished()).count();
            if remaining == 0 {
                break DrainResult::Completed;
            }
            if tokio::time::Instant::now() >= deadline {
                break DrainResult::Timeout(remaining);
            }
            tokio::time::sleep(poll_interval).await;
        };

        match result {
            DrainResult::Completed => {
                tracing::info!(dispatcher = %self.name, "All in-flight jobs completed");
            }
            DrainResult::Timeout(remaining) => {
                tracing::warn!(
                    dispatcher = %self.name,
                    remaining,
                    "Drain timeout reached with tasks still running"
                );
            }
        }
        result
    }

    /// Queue a job for immediate execution.
    ///
    /// Waits while the queue is full. Returns the job ID.
    pub async fn dispatch(&self, name: &str, run: JobFn) -> Result<Uuid> {
        let (submitter, _) = self.active()?;
        submitter.submit(submitter.job(name, run)).await
    }

    /// Queue a job after `delay`.
    ///
    /// Only the active check is reported. A submission that fails after the
    /// delay is logged, and stopping the dispatcher cancels pending delays.
    pub fn dispatch_in(&self, name: &str, run: JobFn, delay: Duration) -> Result<()> {
        let (submitter, shutdown) = self.active()?;
        let name = name.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(dispatcher = %submitter.queue(), job = %name, "Delayed job cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if let Err(e) = submitter.submit(submitter.job(&name, run)).await {
                tracing::warn!(
                    dispatcher = %submitter.queue(),
                    job = %name,
                    error = %e,
                    "Delayed job dropped"
                );
            }
        });

        Ok(())
    }

    /// Queue a job every `every`, starting one period from now.
    pub fn dispatch_every(&self, name: &str, run: JobFn, every: Duration) -> Result<DispatchTicker> {
        let (submitter, shutdown) = self.active()?;
        if every.is_zero() {
            return Err(CuratorError::InvalidSchedule(
                "interval must be greater than zero".to_string(),
            ));
        }

        let ticker = DispatchTicker::spawn(
            submitter,
            name.to_string(),
            run,
            every,
            shutdown.child_token(),
        );
        self.track(Recurrence::Ticker(ticker.clone()))?;
        Ok(ticker)
    }

    /// Queue a job at every match of a cron expression (UTC).
    ///
    /// Five-field expressions get a leading seconds field of `0`.
    pub fn dispatch_cron(&self, name: &str, run: JobFn, expression: &str) -> Result<DispatchCron> {
        self.active()?;
        let cron = CronSchedule::new(expression)?;
        self.spawn_cron(name, run, cron)
    }

    /// Register a recurrence of either kind.
    pub fn dispatch_schedule(&self, name: &str, run: JobFn, schedule: Schedule) -> Result<Recurrence> {
        match schedule {
            Schedule::Interval { every } => self.dispatch_every(name, run, every).map(Recurrence::Ticker),
            Schedule::Cron(cron) => self.spawn_cron(name, run, cron).map(Recurrence::Cron),
        }
    }

    fn spawn_cron(&self, name: &str, run: JobFn, cron: CronSchedule) -> Result<DispatchCron> {
        let (submitter, shutdown) = self.active()?;
        let runner = DispatchCron::spawn(
            submitter,
            name.to_string(),
            run,
            cron,
            shutdown.child_token(),
        );
        self.track(Recurrence::Cron(runner.clone()))?;
        Ok(runner)
    }

    // A stop can land between spawning a recurrence and recording it.
    fn track(&self, recurrence: Recurrence) -> Result<()> {
        let mut inner = self.lock();
        if inner.lifecycle != Lifecycle::Active {
            drop(inner);
            recurrence.stop();
            return Err(self.not_active());
        }
        match recurrence {
            Recurrence::Ticker(t) => inner.tickers.push(t),
            Recurrence::Cron(c) => inner.crons.push(c),
        }
        Ok(())
    }

    /// Jobs of this dispatcher that are queued or executing.
    pub fn queued(&self) -> Vec<JobInfo> {
        self.registries.queue.for_queue(&self.name)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drains the job queue and hands each job to a free worker.
struct DispatchLoop {
    name: String,
    jobs: mpsc::Receiver<Job>,
    pool: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkerSlot>>>,
    dedup: DedupPolicy,
    registries: Registries,
    shutdown: CancellationToken,
}

impl DispatchLoop {
    async fn run(mut self) {
        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                job = self.jobs.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            if let DedupDecision::Duplicate { running } = self.dedup.check(&job.info()) {
                tracing::debug!(
                    dispatcher = %self.name,
                    job_id = %job.id,
                    job = %job.name,
                    running_id = %running.id,
                    running = %running.name,
                    "Duplicate job dropped"
                );
                self.registries.queue.remove(job.id);
                continue;
            }

            tokio::spawn(forward(
                job,
                self.pool.clone(),
                self.registries.clone(),
                self.shutdown.clone(),
            ));
        }

        // Whatever is still queued will never run.
        self.jobs.close();
        while let Some(job) = self.jobs.recv().await {
            self.registries.queue.remove(job.id);
        }
    }
}

/// Wait for an idle worker and hand `job` over.
async fn forward(
    mut job: Job,
    pool: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkerSlot>>>,
    registries: Registries,
    shutdown: CancellationToken,
) {
    let mut pool = tokio::select! {
        _ = shutdown.cancelled() => {
            registries.queue.remove(job.id);
            return;
        }
        pool = pool.lock() => pool,
    };

    loop {
        let slot = tokio::select! {
            _ = shutdown.cancelled() => None,
            slot = pool.recv() => slot,
        };

        match slot {
            Some(slot) => match slot.send(job) {
                Ok(()) => {
                    tracing::trace!("Job handed to worker");
                    return;
                }
                // The worker closed its slot on shutdown.
                Err(returned) => job = returned,
            },
            None => {
                registries.queue.remove(job.id);
                return;
            }
        }
    }
}
