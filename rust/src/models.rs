//! Project task and dependency types consumed by the critical path calculator.

use chrono::NaiveDate;
use pyo3::prelude::*;
use std::fmt;

/// How a predecessor constrains its dependent task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DependencyType {
    StartToStart,
    #[default]
    FinishToStart,
    FinishToFinish,
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartToStart => "start_to_start",
            Self::FinishToStart => "finish_to_start",
            Self::FinishToFinish => "finish_to_finish",
            Self::StartToFinish => "start_to_finish",
        }
    }

    /// Parse the stored wire value. Unrecognized values fall back to finish-to-start.
    pub fn parse(value: &str) -> Self {
        match value {
            "start_to_start" => Self::StartToStart,
            "finish_to_finish" => Self::FinishToFinish,
            "start_to_finish" => Self::StartToFinish,
            _ => Self::FinishToStart,
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `task_id` cannot be placed until `depends_on_task_id` allows it.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Dependency {
    #[pyo3(get, set)]
    pub task_id: String,
    #[pyo3(get, set)]
    pub depends_on_task_id: String,
    pub dependency_type: DependencyType,
    /// Offset applied to the constraint date; negative values are lead time.
    #[pyo3(get, set)]
    pub lag_days: i64,
}

impl Dependency {
    pub fn finish_to_start(task_id: &str, depends_on_task_id: &str, lag_days: i64) -> Self {
        Self {
            task_id: task_id.to_string(),
            depends_on_task_id: depends_on_task_id.to_string(),
            dependency_type: DependencyType::FinishToStart,
            lag_days,
        }
    }
}

#[pymethods]
impl Dependency {
    #[new]
    #[pyo3(signature = (task_id, depends_on_task_id, dependency_type="finish_to_start", lag_days=0))]
    fn new(
        task_id: String,
        depends_on_task_id: String,
        dependency_type: &str,
        lag_days: i64,
    ) -> Self {
        Self {
            task_id,
            depends_on_task_id,
            dependency_type: DependencyType::parse(dependency_type),
            lag_days,
        }
    }

    #[getter(dependency_type)]
    fn py_dependency_type(&self) -> &'static str {
        self.dependency_type.as_str()
    }

    #[setter(dependency_type)]
    fn py_set_dependency_type(&mut self, value: &str) {
        self.dependency_type = DependencyType::parse(value);
    }

    fn __repr__(&self) -> String {
        format!(
            "Dependency(task_id={:?}, depends_on_task_id={:?}, type={}, lag_days={})",
            self.task_id, self.depends_on_task_id, self.dependency_type, self.lag_days
        )
    }
}

/// A scheduled project task. Its duration is fixed for the analysis.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Task {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub start_date: NaiveDate,
    #[pyo3(get, set)]
    pub end_date: NaiveDate,
    #[pyo3(get, set)]
    pub status: String,
    #[pyo3(get, set)]
    pub progress: Option<f64>,
}

impl Task {
    /// Whole days between start and end. Negative for inverted date ranges.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

#[pymethods]
impl Task {
    #[new]
    #[pyo3(signature = (id, start_date, end_date, status=None, progress=None))]
    fn new(
        id: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
        status: Option<String>,
        progress: Option<f64>,
    ) -> Self {
        Self {
            id,
            start_date,
            end_date,
            status: status.unwrap_or_else(|| "not_started".to_string()),
            progress,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, start={}, end={}, status={:?})",
            self.id, self.start_date, self.end_date, self.status
        )
    }
}
