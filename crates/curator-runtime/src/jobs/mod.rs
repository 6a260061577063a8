mod dedup;
mod dispatcher;
mod queue;
mod submit;
mod worker;

pub use dedup::{DedupDecision, DedupPolicy};
pub use dispatcher::{Dispatcher, DrainResult, Lifecycle};
pub use queue::QueueRegistry;
pub(crate) use submit::Submitter;
pub use worker::Worker;
