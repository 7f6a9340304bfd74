//! Rust core of the fieldops service desk: critical path analysis for
//! project schedules and inbound email threading for the help desk.
//!
//! Both algorithms are usable directly from Rust and are exposed to Python
//! as the `fieldops.rust` extension module.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::{NaiveDateTime, Utc};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

pub mod critical_path;
mod config;
mod interner;
pub mod logging;
mod models;
pub mod threading;

pub use config::{CriticalPathConfig, ThreadingConfig};
pub use critical_path::{compute_critical_path, CriticalPathError, CriticalPathResult, TaskTiming};
pub use models::{Dependency, DependencyType, Task};
pub use threading::{
    extract_threading_headers, EmailIdentifiers, InMemoryHelpdeskStore, IncomingEmail,
    IngestOutcome, RawMessage, ThreadResolver, ThreadingError, Ticket,
};

/// Compute earliest/latest dates, slack and the critical task set.
///
/// # Arguments
/// * `tasks` - List of tasks with fixed start/end dates
/// * `dependencies` - List of dependencies between tasks; unknown task ids are ignored
/// * `config` - Optional CriticalPathConfig (verbosity, duration validation)
///
/// # Returns
/// * CriticalPathResult with critical_task_ids, slack, duration and per-task timings
///
/// # Raises
/// * ValueError if a task ends before it starts and validation is enabled
/// * ValueError if a lag moves a date outside the supported calendar
#[pyfunction]
#[pyo3(name = "compute_critical_path", signature = (tasks, dependencies, config=None))]
fn py_compute_critical_path(
    tasks: Vec<Task>,
    dependencies: Vec<Dependency>,
    config: Option<CriticalPathConfig>,
) -> PyResult<CriticalPathResult> {
    let config = config.unwrap_or_default();
    compute_critical_path(&tasks, &dependencies, &config)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Extract threading identifiers from a provider message.
///
/// # Arguments
/// * `provider_message_id` - Provider-assigned message id
/// * `headers` - List of (name, value) header pairs
/// * `internet_message_id` - Envelope Message-ID, if the provider exposes it separately
/// * `conversation_id` - Provider conversation id
#[pyfunction]
#[pyo3(name = "extract_threading_headers", signature = (provider_message_id, headers, internet_message_id=None, conversation_id=None))]
fn py_extract_threading_headers(
    provider_message_id: String,
    headers: Vec<(String, String)>,
    internet_message_id: Option<String>,
    conversation_id: Option<String>,
) -> EmailIdentifiers {
    extract_threading_headers(&RawMessage {
        provider_message_id,
        internet_message_id,
        conversation_id,
        subject: String::new(),
        headers,
    })
}

fn store_error(err: impl std::fmt::Display) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

/// Help desk tickets and messages held in process, with email threading.
#[pyclass(name = "HelpdeskIndex")]
pub struct PyHelpdeskIndex {
    resolver: ThreadResolver<InMemoryHelpdeskStore>,
}

#[pymethods]
impl PyHelpdeskIndex {
    #[new]
    #[pyo3(signature = (config=None))]
    fn new(config: Option<ThreadingConfig>) -> Self {
        Self {
            resolver: ThreadResolver::new(InMemoryHelpdeskStore::new(), config.unwrap_or_default()),
        }
    }

    /// Register an existing ticket (e.g. loaded from the database).
    #[pyo3(signature = (tenant_id, email_account_id, subject, provider_conversation_id=None, is_archived=false, created_at=None))]
    fn add_ticket(
        &self,
        tenant_id: String,
        email_account_id: String,
        subject: String,
        provider_conversation_id: Option<String>,
        is_archived: bool,
        created_at: Option<NaiveDateTime>,
    ) -> PyResult<Ticket> {
        use crate::threading::MessageStoreWrite;

        self.resolver
            .store()
            .insert_ticket(threading::NewTicket {
                tenant_id,
                subject,
                email_account_id,
                provider_conversation_id,
                is_archived,
                created_at: created_at.unwrap_or_else(|| Utc::now().naive_utc()),
            })
            .map_err(store_error)
    }

    fn message_exists(&self, provider_message_id: &str) -> PyResult<bool> {
        self.resolver
            .message_exists(provider_message_id)
            .map_err(store_error)
    }

    /// Return the ticket the email belongs to, or None for a new thread.
    fn find_existing_ticket(
        &self,
        email_account_id: &str,
        identifiers: EmailIdentifiers,
        subject: &str,
    ) -> PyResult<Option<Ticket>> {
        self.resolver
            .find_existing_ticket(email_account_id, &identifiers, subject)
            .map_err(store_error)
    }

    /// Ingest an email; returns ("created" | "appended" | "duplicate", ticket_id).
    #[pyo3(signature = (tenant_id, email_account_id, email, received_at=None))]
    fn ingest(
        &self,
        tenant_id: &str,
        email_account_id: &str,
        email: IncomingEmail,
        received_at: Option<NaiveDateTime>,
    ) -> PyResult<(&'static str, Option<String>)> {
        let received_at = received_at.unwrap_or_else(|| Utc::now().naive_utc());
        let outcome = self
            .resolver
            .ingest(tenant_id, email_account_id, &email, received_at)
            .map_err(store_error)?;
        Ok((outcome.kind(), outcome.ticket_id().map(str::to_string)))
    }

    fn __repr__(&self) -> String {
        let tickets = self
            .resolver
            .store()
            .ticket_count()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| "?".to_string());
        format!("HelpdeskIndex(tickets={})", tickets)
    }
}

/// The fieldops.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Critical path types
    m.add_class::<Task>()?;
    m.add_class::<Dependency>()?;
    m.add_class::<TaskTiming>()?;
    m.add_class::<CriticalPathResult>()?;

    // Threading types
    m.add_class::<EmailIdentifiers>()?;
    m.add_class::<IncomingEmail>()?;
    m.add_class::<Ticket>()?;
    m.add_class::<PyHelpdeskIndex>()?;

    // Config types
    m.add_class::<CriticalPathConfig>()?;
    m.add_class::<ThreadingConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(py_compute_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(py_extract_threading_headers, m)?)?;

    Ok(())
}
