//! Dump command implementation.
//!
//! The dump command:
//! 1. Resolves the trace directory inside the session
//! 2. Opens the trace (metadata + stream files)
//! 3. Prints one formatted line per event, in chronological order

use crate::commands::models::DumpArgs;
use crate::output::write_events;
use crate::reader;
use crate::utils::error::UsageError;
use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Execute the dump command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Dump command arguments
/// * `sink` - Where the event lines go (stdout from the CLI)
///
/// # Returns
/// Number of events printed
///
/// # Errors
/// * Trace directory missing or metadata invalid (nothing is written)
/// * Decoding failure mid-stream (lines before it are kept)
/// * Write failures on the sink
///
/// # Example
/// ```ignore
/// let args = DumpArgs::new("/tmp/lttng-session");
/// execute_dump(&args, std::io::stdout().lock())?;
/// ```
pub fn execute_dump(args: &DumpArgs, sink: impl Write) -> Result<u64> {
    let start_time = Instant::now();

    let trace_path = resolve_trace_path(args);
    info!("Opening trace: {}", trace_path.display());

    let handle = reader::open(&trace_path)
        .with_context(|| format!("Cannot add trace {}", trace_path.display()))?;
    debug!(
        "Trace {} has {} stream file(s), CTF {}.{}",
        handle.path().display(),
        handle.stream_count(),
        handle.metadata().major,
        handle.metadata().minor
    );

    let printed = write_events(handle.events(), sink)
        .with_context(|| format!("Failed to dump events from {}", trace_path.display()))?;

    info!(
        "Printed {} event(s) in {:.2}s",
        printed,
        start_time.elapsed().as_secs_f64()
    );
    Ok(printed)
}

/// Join the configured sub-path onto the session directory
///
/// **Public** - the reader expects the directory holding `metadata`
pub fn resolve_trace_path(args: &DumpArgs) -> PathBuf {
    if args.subpath.as_os_str().is_empty() {
        args.session_dir.clone()
    } else {
        args.session_dir.join(&args.subpath)
    }
}

/// Validate dump arguments
///
/// **Public** - can be called before execute_dump for early validation
pub fn validate_args(args: &DumpArgs) -> Result<(), UsageError> {
    if args.session_dir.as_os_str().is_empty() {
        return Err(UsageError::EmptySessionDir);
    }
    Ok(())
}

/// Build arguments from the positional values given on the command line
///
/// Exactly one session directory is accepted.
pub fn args_from_positionals(
    positionals: Vec<PathBuf>,
    subpath: PathBuf,
) -> Result<DumpArgs, UsageError> {
    let count = positionals.len();
    let mut positionals = positionals.into_iter();
    match (positionals.next(), positionals.next()) {
        (Some(session_dir), None) => {
            let args = DumpArgs::new(session_dir).with_subpath(subpath);
            validate_args(&args)?;
            Ok(args)
        }
        _ => Err(UsageError::WrongArgumentCount(count)),
    }
}
