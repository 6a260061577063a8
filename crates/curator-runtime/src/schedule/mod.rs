mod registry;
mod runner;
mod ticker;

pub use registry::{JobSchedule, ScheduleRegistry};
pub use runner::{DispatchCron, Recurrence};
pub use ticker::DispatchTicker;
