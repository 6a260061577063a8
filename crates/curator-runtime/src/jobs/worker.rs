use std::time::Instant;

use chrono::Utc;
use curator_core::job::Job;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::dedup::{DedupDecision, DedupPolicy};
use crate::registry::Registries;

/// A one-shot handle a worker offers to the pool while idle.
pub(crate) type WorkerSlot = oneshot::Sender<Job>;

/// A single pool member. Executes one job at a time.
pub struct Worker {
    id: usize,
    dispatcher: String,
    pool: mpsc::Sender<WorkerSlot>,
    registries: Registries,
    dedup: DedupPolicy,
    shutdown: CancellationToken,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        dispatcher: impl Into<String>,
        pool: mpsc::Sender<WorkerSlot>,
        registries: Registries,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            dispatcher: dispatcher.into(),
            pool,
            dedup: DedupPolicy::new(registries.clone()),
            registries,
            shutdown,
        }
    }

    /// Run the worker until the dispatcher shuts down.
    pub async fn run(self) {
        tracing::debug!(
            dispatcher = %self.dispatcher,
            worker_id = self.id,
            "Worker started"
        );

        loop {
            let (slot, mut assigned) = oneshot::channel();

            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                registered = self.pool.send(slot) => {
                    if registered.is_err() {
                        break;
                    }
                }
            }

            let job = tokio::select! {
                job = &mut assigned => match job {
                    Ok(job) => job,
                    // Slot dropped unused: the pool was torn down.
                    Err(_) => break,
                },
                _ = self.shutdown.cancelled() => {
                    assigned.close();
                    // A forwarder may have handed over a job just before close.
                    if let Ok(job) = assigned.try_recv() {
                        self.execute(job).await;
                    }
                    break;
                }
            };

            self.execute(job).await;
        }

        tracing::debug!(
            dispatcher = %self.dispatcher,
            worker_id = self.id,
            "Worker stopped"
        );
    }

    async fn execute(&self, job: Job) {
        let now = Utc::now();
        if let DedupDecision::Duplicate { running } = self.dedup.claim(&job.info(), now) {
            tracing::debug!(
                dispatcher = %self.dispatcher,
                worker_id = self.id,
                job_id = %job.id,
                job = %job.name,
                running_id = %running.id,
                running = %running.name,
                "Duplicate job dropped"
            );
            self.registries.queue.remove(job.id);
            return;
        }

        if let Some(schedule_id) = job.scheduler_id {
            self.registries
                .schedules
                .mark_running(schedule_id, job.id, now);
        }

        tracing::debug!(
            dispatcher = %self.dispatcher,
            worker_id = self.id,
            job_id = %job.id,
            job = %job.name,
            "Job started"
        );

        let start = Instant::now();
        let result = tokio::spawn(job.run()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                tracing::debug!(
                    dispatcher = %self.dispatcher,
                    worker_id = self.id,
                    job_id = %job.id,
                    job = %job.name,
                    duration_ms,
                    "Job completed"
                );
            }
            Err(e) if e.is_panic() => {
                tracing::error!(
                    dispatcher = %self.dispatcher,
                    worker_id = self.id,
                    job_id = %job.id,
                    job = %job.name,
                    duration_ms,
                    panic = %panic_message(e.into_panic()),
                    "Job panicked"
                );
            }
            Err(e) => {
                tracing::warn!(
                    dispatcher = %self.dispatcher,
                    worker_id = self.id,
                    job_id = %job.id,
                    job = %job.name,
                    error = %e,
                    "Job was cancelled"
                );
            }
        }

        if let Some(schedule_id) = job.scheduler_id {
            self.registries.schedules.mark_finished(schedule_id);
        }
        self.registries.queue.remove(job.id);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use curator_core::job::job_fn;
    use curator_core::schedule::Schedule;

    use crate::schedule::JobSchedule;

    fn spawn_worker(
        registries: &Registries,
    ) -> (
        mpsc::Receiver<WorkerSlot>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let (pool_tx, pool_rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let worker = Worker::new(0, "test", pool_tx, registries.clone(), shutdown.clone());
        (pool_rx, shutdown, tokio::spawn(worker.run()))
    }

    #[tokio::test]
    async fn test_worker_executes_and_cleans_up() {
        let registries = Registries::new();
        let (mut pool, shutdown, handle) = spawn_worker(&registries);

        let schedule = JobSchedule::new(
            "refresh_feeds",
            "test",
            Schedule::interval(Duration::from_secs(60)).unwrap(),
            Utc::now(),
        );
        let schedule_id = schedule.id;
        registries.schedules.add(schedule);

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let job = Job::new(
            "test",
            "refresh_feeds",
            job_fn(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )
        .with_scheduler(schedule_id);
        let job_id = job.id;
        registries.queue.add(job.info());

        let slot = pool.recv().await.unwrap();
        assert!(slot.send(job).is_ok());

        // The worker offers a new slot once the job is done.
        let _next = pool.recv().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registries.queue.get(job_id).is_none());

        let entry = registries.schedules.get(schedule_id).unwrap();
        assert!(!entry.is_running);
        assert_eq!(entry.runs, 1);
        assert_eq!(entry.last_job_id, Some(job_id));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_survives_panic() {
        let registries = Registries::new();
        let (mut pool, shutdown, handle) = spawn_worker(&registries);

        let boom = Job::new("test", "boom", job_fn(|| async { panic!("boom") }));
        let boom_id = boom.id;
        registries.queue.add(boom.info());
        assert!(pool.recv().await.unwrap().send(boom).is_ok());

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let ok = Job::new(
            "test",
            "ok",
            job_fn(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        assert!(pool.recv().await.unwrap().send(ok).is_ok());
        let _next = pool.recv().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registries.queue.get(boom_id).is_none());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_drops_job_whose_twin_started() {
        let registries = Registries::new();
        let (mut pool, shutdown, handle) = spawn_worker(&registries);

        // Started elsewhere, e.g. by another worker of the pool.
        let running = Job::new("test", "scan_library", job_fn(|| async {}));
        registries.queue.add(running.info());
        registries.queue.mark_started(running.id, Utc::now());

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let twin = Job::new(
            "test",
            "scan_library",
            job_fn(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );
        let twin_id = twin.id;
        registries.queue.add(twin.info());

        assert!(pool.recv().await.unwrap().send(twin).is_ok());
        let _next = pool.recv().await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registries.queue.get(twin_id).is_none());
        assert!(registries.queue.get(running.id).is_some());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_worker_exits_on_shutdown() {
        let registries = Registries::new();
        let (mut pool, shutdown, handle) = spawn_worker(&registries);

        let slot = pool.recv().await.unwrap();
        shutdown.cancel();
        handle.await.unwrap();

        // The closed slot no longer accepts work.
        let job = Job::new("test", "late", job_fn(|| async {}));
        assert!(slot.send(job).is_err());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("boom".to_string())), "boom");
        assert_eq!(panic_message(Box::new(42)), "unknown panic payload");
    }
}
