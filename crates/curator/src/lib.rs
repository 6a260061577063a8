//! Curator: a job scheduling and dispatch engine for media-library automation.
//!
//! Jobs are organized into named dispatchers, each owning a bounded worker
//! pool. Work is submitted immediately, after a delay, on a fixed interval or
//! on a cron schedule, and equivalent jobs never run concurrently.

pub mod command;
mod runtime;

pub use curator_core;
pub use curator_runtime;

pub use runtime::{Curator, CuratorBuilder};
