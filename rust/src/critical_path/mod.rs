//! Critical Path Method over fixed-duration project tasks.
//!
//! Computes earliest/latest start and finish dates for every task from typed,
//! lagged dependencies, then reports per-task slack and the set of tasks
//! that cannot slip without moving the project end date.

mod calculation;
mod types;

pub use calculation::compute_critical_path;
pub use types::{CriticalPathError, CriticalPathResult, TaskTiming};
