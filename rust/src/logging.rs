//! Verbosity-gated stderr logging shared by the resolver and the CPM calculator.
//!
//! Levels:
//! - 0: SILENT
//! - 1: CHANGES (ticket created/appended, critical path summary)
//! - 2: CHECKS (resolver strategy attempts, skipped dangling dependencies)
//! - 3: DEBUG (per-task timings, cycle cut-offs)
//!
//! Nothing is formatted when the configured verbosity is below the level.

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Emit a line to stderr when `$verbosity` reaches `$level`.
#[macro_export]
macro_rules! log_at {
    ($level:expr, $verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $level {
            eprintln!("[fieldops] {}", format_args!($($arg)*));
        }
    };
}

/// Ticket matches, ticket creation, message appends, critical path summaries.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_CHANGES, $verbosity, $($arg)*)
    };
}

/// Individual resolver strategies and skipped graph edges.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_CHECKS, $verbosity, $($arg)*)
    };
}

/// Per-task CPM internals.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_DEBUG, $verbosity, $($arg)*)
    };
}
