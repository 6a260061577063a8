pub mod dashboard;
pub mod jobs;
pub mod registry;
pub mod schedule;

pub use jobs::{DedupDecision, DedupPolicy, Dispatcher, DrainResult, Lifecycle, QueueRegistry};
pub use registry::Registries;
pub use schedule::{DispatchCron, DispatchTicker, JobSchedule, Recurrence, ScheduleRegistry};
