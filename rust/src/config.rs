//! Configuration types for the critical path calculator and the email thread resolver.

use pyo3::prelude::*;

/// Configuration for the critical path calculation.
#[pyclass]
#[derive(Clone, Debug)]
pub struct CriticalPathConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// Reject tasks whose end date precedes their start date.
    ///
    /// When disabled, negative durations flow through the passes unchanged.
    #[pyo3(get, set)]
    pub validate_durations: bool,
}

impl Default for CriticalPathConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            validate_durations: true,
        }
    }
}

#[pymethods]
impl CriticalPathConfig {
    #[new]
    #[pyo3(signature = (verbosity=0, validate_durations=true))]
    fn new(verbosity: u8, validate_durations: bool) -> Self {
        Self {
            verbosity,
            validate_durations,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "CriticalPathConfig(verbosity={}, validate_durations={})",
            self.verbosity, self.validate_durations
        )
    }
}

/// Configuration for inbound email threading.
#[pyclass]
#[derive(Clone, Debug)]
pub struct ThreadingConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
    /// Subject prefixes that mark a reply, compared case-insensitively.
    #[pyo3(get, set)]
    pub reply_prefixes: Vec<String>,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            reply_prefixes: vec!["re:".to_string()],
        }
    }
}

impl ThreadingConfig {
    /// Strip a single leading reply prefix (and the whitespace after it).
    ///
    /// Returns `None` when the subject does not start with a reply prefix
    /// or nothing follows it.
    pub fn strip_reply_prefix<'a>(&self, subject: &'a str) -> Option<&'a str> {
        self.reply_prefixes.iter().find_map(|prefix| {
            let head = subject.get(..prefix.len())?;
            if head.eq_ignore_ascii_case(prefix) {
                Some(subject[prefix.len()..].trim_start()).filter(|rest| !rest.is_empty())
            } else {
                None
            }
        })
    }
}

#[pymethods]
impl ThreadingConfig {
    #[new]
    #[pyo3(signature = (verbosity=0, reply_prefixes=None))]
    fn new(verbosity: u8, reply_prefixes: Option<Vec<String>>) -> Self {
        let defaults = Self::default();
        Self {
            verbosity,
            reply_prefixes: reply_prefixes.unwrap_or(defaults.reply_prefixes),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "ThreadingConfig(verbosity={}, reply_prefixes={:?})",
            self.verbosity, self.reply_prefixes
        )
    }
}
