//! Result and error types for the critical path calculation.

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors raised while validating or scheduling calculator input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriticalPathError {
    #[error("Task {task_id} ends ({end_date}) before it starts ({start_date})")]
    InvalidTaskDuration {
        task_id: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    /// A lag or duration pushed a date outside the supported calendar.
    #[error("Dates for task {task_id} fall outside the supported calendar range")]
    DateOutOfRange { task_id: String },
}

/// Earliest/latest dates of one task after both passes.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskTiming {
    #[pyo3(get)]
    pub earliest_start: NaiveDate,
    #[pyo3(get)]
    pub earliest_finish: NaiveDate,
    #[pyo3(get)]
    pub latest_start: NaiveDate,
    #[pyo3(get)]
    pub latest_finish: NaiveDate,
    /// latest_start - earliest_start, in whole days.
    #[pyo3(get)]
    pub slack: i64,
}

impl TaskTiming {
    /// Zero or negative slack. Negative slack means the network is already behind.
    pub fn is_critical(&self) -> bool {
        self.slack <= 0
    }
}

#[pymethods]
impl TaskTiming {
    #[getter(is_critical)]
    fn py_is_critical(&self) -> bool {
        self.is_critical()
    }

    fn __repr__(&self) -> String {
        format!(
            "TaskTiming(es={}, ef={}, ls={}, lf={}, slack={})",
            self.earliest_start,
            self.earliest_finish,
            self.latest_start,
            self.latest_finish,
            self.slack
        )
    }
}

/// Output of [`compute_critical_path`](super::compute_critical_path).
// Note: std collections here for PyO3 interface compatibility
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct CriticalPathResult {
    /// Tasks whose slack is <= 0.
    #[pyo3(get)]
    pub critical_task_ids: HashSet<String>,
    /// Slack in days for every task that was analysed.
    #[pyo3(get)]
    pub slack: HashMap<String, i64>,
    /// Days from the earliest ES to the project end date.
    #[pyo3(get)]
    pub duration: i64,
    #[pyo3(get)]
    pub task_timings: HashMap<String, TaskTiming>,
    #[pyo3(get)]
    pub project_start: Option<NaiveDate>,
    #[pyo3(get)]
    pub project_end: Option<NaiveDate>,
}

impl CriticalPathResult {
    pub fn is_critical(&self, task_id: &str) -> bool {
        self.critical_task_ids.contains(task_id)
    }

    pub fn slack_for(&self, task_id: &str) -> Option<i64> {
        self.slack.get(task_id).copied()
    }
}

#[pymethods]
impl CriticalPathResult {
    #[pyo3(name = "is_critical")]
    fn py_is_critical(&self, task_id: &str) -> bool {
        self.is_critical(task_id)
    }

    #[pyo3(name = "slack_for")]
    fn py_slack_for(&self, task_id: &str) -> Option<i64> {
        self.slack_for(task_id)
    }

    fn __repr__(&self) -> String {
        format!(
            "CriticalPathResult(critical={}, tasks={}, duration={})",
            self.critical_task_ids.len(),
            self.slack.len(),
            self.duration
        )
    }
}
