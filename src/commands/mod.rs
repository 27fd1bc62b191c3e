//! CLI command implementations.
//!
//! Commands orchestrate the reader and the formatter to perform user tasks.

pub mod dump;
pub mod models;

// Re-export main command functions
pub use dump::{args_from_positionals, execute_dump, resolve_trace_path, validate_args};
pub use models::DumpArgs;

/// One-line usage message printed on a bad invocation
pub fn usage_line() -> String {
    format!("Usage: {} <lttng session directory>", env!("CARGO_PKG_NAME"))
}
