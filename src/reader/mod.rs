//! Trace reader: opens a trace directory and yields its events in
//! chronological order.
//!
//! The reader owns every file handle. Streams are released as soon as they
//! are exhausted, and all remaining ones when the handle or its event
//! sequence is dropped.

mod merge;

pub use merge::Events;

use crate::parser::{load_metadata, StreamCursor, TraceMetadata};
use crate::utils::config::METADATA_FILE_NAME;
use crate::utils::error::OpenError;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// An opened trace: parsed metadata plus one cursor per stream file
#[derive(Debug)]
pub struct TraceHandle {
    path: PathBuf,
    metadata: TraceMetadata,
    streams: Vec<StreamCursor>,
}

/// Open the trace stored in `path`
///
/// **Public** - main entry point for reading
///
/// # Arguments
/// * `path` - Directory containing the `metadata` file and stream files
///
/// # Errors
/// * `OpenError::NotFound` - `path` does not exist
/// * `OpenError::NotADirectory` - `path` is a file
/// * `OpenError::MissingMetadata` - no `metadata` file
/// * `OpenError::Metadata` - the metadata is malformed
/// * `OpenError::Io` - a stream file cannot be opened
///
/// # Example
/// ```ignore
/// let handle = open("session/ust/uid/1000/64-bit")?;
/// for event in handle.events() {
///     println!("{}", event?.name());
/// }
/// ```
pub fn open(path: impl AsRef<Path>) -> Result<TraceHandle, OpenError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(OpenError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(OpenError::NotADirectory(path.to_path_buf()));
    }

    let metadata = load_metadata(path)?;
    debug!(
        "Metadata declares {} stream class(es), {} event class(es)",
        metadata.streams.len(),
        metadata.event_class_count()
    );

    let streams = stream_files(path)?
        .iter()
        .map(|file| {
            StreamCursor::open(file).map_err(|source| OpenError::Io {
                path: file.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        "Opened trace {} ({} stream file(s))",
        path.display(),
        streams.len()
    );

    Ok(TraceHandle {
        path: path.to_path_buf(),
        metadata,
        streams,
    })
}

/// Stream files of a trace directory, sorted by name.
///
/// Everything except `metadata`, hidden files and sub-directories.
fn stream_files(dir: &Path) -> Result<Vec<PathBuf>, OpenError> {
    let io_error = |source| OpenError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == METADATA_FILE_NAME || name.starts_with('.') {
            continue;
        }
        if entry.file_type().map_err(io_error)?.is_file() {
            debug!("Found stream file {}", name);
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

impl TraceHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &TraceMetadata {
        &self.metadata
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Consume the handle into its single-pass event sequence
    pub fn events(self) -> Events {
        Events::new(self.metadata, self.streams)
    }
}

impl IntoIterator for TraceHandle {
    type Item = Result<crate::parser::Event, crate::utils::error::DecodeError>;
    type IntoIter = Events;

    fn into_iter(self) -> Events {
        self.events()
    }
}

/// Free-function form of [`TraceHandle::events`]
pub fn events(handle: TraceHandle) -> Events {
    handle.events()
}
