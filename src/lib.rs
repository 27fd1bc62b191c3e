//! ctf-dump
//!
//! Native reader for LTTng/CTF trace sessions and a formatter that
//! renders each event as one human-readable line.
//!
//! This crate provides the core implementation for the
//! `ctf-dump` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! ctf-dump /path/to/lttng-session
//! ```
//!
//! As a library:
//!
//! ```ignore
//! let handle = ctf_dump::reader::open("session/ust/uid/1000/64-bit")?;
//! for event in handle.events() {
//!     println!("{}", ctf_dump::output::format_event(&event?));
//! }
//! ```

pub mod commands;
pub mod output;
pub mod parser;
pub mod reader;
pub mod utils;
