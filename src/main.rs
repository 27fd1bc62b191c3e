//! ctf-dump CLI
//!
//! Prints one line per event of an LTTng/CTF trace session:
//! `[<level>:<timestamp>] <task>.<subtask>: <text>`

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use ctf_dump::commands::{args_from_positionals, execute_dump, usage_line};
use ctf_dump::utils::config::{DEFAULT_TRACE_SUBPATH, TRACE_SUBPATH_ENV};
use env_logger::Env;
use log::debug;
use std::ffi::OsString;
use std::path::PathBuf;

/// ctf-dump - print the events of an LTTng/CTF trace session
#[derive(Parser, Debug)]
#[command(name = "ctf-dump")]
#[command(version, about, long_about = None)]
struct Cli {
    /// LTTng session directory
    #[arg(value_name = "SESSION_DIR")]
    session_dirs: Vec<PathBuf>,

    /// Trace location inside the session (domain/uid/arch); empty for the session itself
    #[arg(long, env = TRACE_SUBPATH_ENV, value_parser = clap::value_parser!(OsString))]
    subpath: Option<OsString>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    // Parse CLI arguments; any invocation error prints the usage line
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => exit_with_usage(),
    };

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // An empty environment value selects the session directory, like `--subpath ""`
    let subpath = cli
        .subpath
        .or_else(|| std::env::var_os(TRACE_SUBPATH_ENV))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRACE_SUBPATH));

    let args = match args_from_positionals(cli.session_dirs, subpath) {
        Ok(args) => args,
        Err(e) => {
            debug!("Invalid invocation: {}", e);
            exit_with_usage()
        }
    };

    // Execute dump
    let stdout = std::io::stdout();
    execute_dump(&args, stdout.lock())?;

    Ok(())
}

/// Print the usage line to stdout and exit with status 1
fn exit_with_usage() -> ! {
    println!("{}", usage_line());
    std::process::exit(1)
}
