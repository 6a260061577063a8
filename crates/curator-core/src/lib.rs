pub mod config;
pub mod error;
pub mod job;
pub mod schedule;

pub use config::{CuratorConfig, DedupConfig, DispatcherConfig, FamilyConfig, JobConfig};
pub use error::{CuratorError, Result};
pub use job::{blocking, job_fn, Job, JobFamilies, JobFn, JobFuture, JobInfo, JobState};
pub use schedule::{CronSchedule, Schedule, ScheduleKind};
