use crate::utils::config::DEFAULT_TRACE_SUBPATH;
use std::path::PathBuf;

/// Arguments for the dump command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct DumpArgs {
    /// LTTng session root directory
    pub session_dir: PathBuf,

    /// Location of the trace inside the session (empty = the session itself)
    pub subpath: PathBuf,
}

impl DumpArgs {
    /// Arguments for `session_dir` with the default sub-path
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_subpath(mut self, subpath: impl Into<PathBuf>) -> Self {
        self.subpath = subpath.into();
        self
    }
}

impl Default for DumpArgs {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::new(),
            subpath: PathBuf::from(DEFAULT_TRACE_SUBPATH),
        }
    }
}
