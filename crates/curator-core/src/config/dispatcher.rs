use serde::{Deserialize, Serialize};

/// A named dispatcher and its pool sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Dispatcher name, referenced by jobs.
    pub name: String,

    /// Concurrent workers.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Queue capacity before submissions wait.
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
}

fn default_max_workers() -> usize {
    1
}

fn default_max_queue() -> usize {
    100
}
