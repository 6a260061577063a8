use std::sync::Arc;

use curator_core::job::JobFamilies;

use crate::jobs::QueueRegistry;
use crate::schedule::ScheduleRegistry;

/// Shared state handed to every dispatcher and worker.
///
/// Built once at startup. Clones share the same underlying tables.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    /// Jobs queued or executing.
    pub queue: QueueRegistry,
    /// Recurring schedules.
    pub schedules: ScheduleRegistry,
    /// Duplicate suppression families.
    pub families: Arc<JobFamilies>,
}

impl Registries {
    /// Create empty registries with no declared families.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty registries with the given families.
    pub fn with_families(families: JobFamilies) -> Self {
        Self {
            families: Arc::new(families),
            ..Self::default()
        }
    }
}
