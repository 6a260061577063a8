//! Curator runtime: dispatchers and jobs built from configuration.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use curator_core::config::CuratorConfig;
use curator_core::error::{CuratorError, Result};
use curator_core::job::{JobFamilies, JobFn};
use curator_runtime::dashboard;
use curator_runtime::{Dispatcher, DrainResult, Recurrence, Registries};

use crate::command::command_job;

/// The assembled scheduling runtime.
pub struct Curator {
    config: CuratorConfig,
    registries: Registries,
    dispatchers: Vec<Arc<Dispatcher>>,
    drain_timeout: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl Curator {
    /// Create a new builder.
    pub fn builder() -> CuratorBuilder {
        CuratorBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &CuratorConfig {
        &self.config
    }

    /// Get the shared registries.
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Look up a dispatcher by name.
    pub fn dispatcher(&self, name: &str) -> Option<Arc<Dispatcher>> {
        self.dispatchers.iter().find(|d| d.name() == name).cloned()
    }

    /// Start every dispatcher and register every configured job.
    ///
    /// Returns the recurrences created for interval and cron jobs.
    pub fn start(&self) -> Result<Vec<Recurrence>> {
        for dispatcher in &self.dispatchers {
            dispatcher.start();
        }

        let mut recurrences = Vec::new();
        for job in &self.config.jobs {
            let dispatcher = self.dispatcher(&job.dispatcher).ok_or_else(|| {
                CuratorError::Config(format!("unknown dispatcher '{}'", job.dispatcher))
            })?;
            let body: JobFn = command_job(&job.name, job.command.clone());

            match (job.schedule()?, job.delay()) {
                (Some(schedule), _) => {
                    recurrences.push(dispatcher.dispatch_schedule(&job.name, body, schedule)?);
                }
                (None, Some(delay)) => {
                    dispatcher.dispatch_in(&job.name, body, delay)?;
                    tracing::info!(job = %job.name, delay_secs = delay.as_secs(), "One-shot job scheduled");
                }
                (None, None) => {
                    tracing::warn!(job = %job.name, "Job has no trigger, skipping");
                }
            }
        }

        Ok(recurrences)
    }

    /// Start, log status periodically, and shut down on Ctrl-C.
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            dispatchers = self.dispatchers.len(),
            jobs = self.config.jobs.len(),
            "Curator starting"
        );
        self.start()?;

        let status_interval = self.config.status.log_interval_secs;
        let reporter = (status_interval > 0).then(|| {
            let registries = self.registries.clone();
            tokio::spawn(report_status(registries, Duration::from_secs(status_interval)))
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("Received shutdown notification");
            }
        }

        if let Some(reporter) = reporter {
            reporter.abort();
        }

        tracing::info!("Starting graceful shutdown...");
        self.shutdown_dispatchers().await;
        tracing::info!("Curator stopped");
        Ok(())
    }

    /// Request shutdown of a running [`Curator::run`].
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get a handle that can request shutdown from another task.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Stop every dispatcher and wait for in-flight jobs.
    pub async fn shutdown_dispatchers(&self) -> Vec<(String, DrainResult)> {
        // Stop all before draining any.
        for dispatcher in &self.dispatchers {
            dispatcher.stop();
        }

        let mut results = Vec::with_capacity(self.dispatchers.len());
        for dispatcher in &self.dispatchers {
            let result = dispatcher.shutdown(self.drain_timeout).await;
            results.push((dispatcher.name().to_string(), result));
        }
        results
    }
}

async fn report_status(registries: Registries, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let summary = dashboard::summary(&registries);
        tracing::info!(
            schedules = summary.schedules,
            running = summary.running_schedules,
            queued = summary.queued,
            executing = summary.executing,
            next_run = ?summary.next_run,
            "Scheduler status"
        );
        tracing::debug!(
            "Schedules:\n{}",
            dashboard::render_schedule_table(&dashboard::schedule_rows(&registries))
        );
        if summary.queued + summary.executing > 0 {
            tracing::debug!(
                "Queue:\n{}",
                dashboard::render_queue_table(&dashboard::queue_rows(&registries))
            );
        }
    }
}

/// Builder for configuring the Curator runtime.
pub struct CuratorBuilder {
    config: Option<CuratorConfig>,
    drain_timeout: Duration,
}

impl CuratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            drain_timeout: Duration::from_secs(30),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: CuratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// How long shutdown waits for running jobs.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Validate the configuration and build the runtime.
    pub fn build(self) -> Result<Curator> {
        let config = self
            .config
            .ok_or_else(|| CuratorError::Config("Configuration is required".to_string()))?;
        config.validate()?;

        let registries = Registries::with_families(JobFamilies::from_config(&config.dedup)?);
        let dispatchers = config
            .dispatchers
            .iter()
            .map(|d| {
                Arc::new(Dispatcher::new(
                    d.name.as_str(),
                    d.max_workers,
                    d.max_queue,
                    registries.clone(),
                ))
            })
            .collect();

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Curator {
            config,
            registries,
            dispatchers,
            drain_timeout: self.drain_timeout,
            shutdown_tx,
        })
    }
}

impl Default for CuratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
