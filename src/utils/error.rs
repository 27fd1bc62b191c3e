//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use thiserror::Error;

/// Errors caused by a bad command-line invocation
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("Expected exactly one session directory, got {0}")]
    WrongArgumentCount(usize),

    #[error("Session directory cannot be empty")]
    EmptySessionDir,
}

/// Errors that can occur while opening a trace directory
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Trace directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No metadata file in trace directory: {0}")]
    MissingMetadata(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid trace metadata: {0}")]
    Metadata(#[from] MetadataError),
}

/// Errors in the TSDL metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Lexer error: {0}")]
    Lex(String),

    #[error("Syntax error: expected {expected}, found {found}")]
    Syntax { expected: String, found: String },

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid metadata packet: {0}")]
    Packet(String),

    #[error("Invalid declaration: {0}")]
    Invalid(String),
}

/// Errors that can occur while decoding event streams
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read stream {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected end of data in {path} at bit {offset}")]
    UnexpectedEnd { path: PathBuf, offset: u64 },

    #[error("Bad packet magic {magic:#x} in {path}")]
    BadMagic { path: PathBuf, magic: u64 },

    #[error("Unknown stream class {id} in {path}")]
    UnknownStream { path: PathBuf, id: u64 },

    #[error("Unknown event id {id} for stream class {stream_id} in {path}")]
    UnknownEvent {
        path: PathBuf,
        stream_id: u64,
        id: u64,
    },

    #[error("Malformed packet in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Errors that can occur while writing formatted events
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to decode event: {0}")]
    Decode(#[from] DecodeError),
}
