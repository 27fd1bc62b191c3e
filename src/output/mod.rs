//! Rendering of decoded events as text lines.
//!
//! This module handles:
//! - Deriving the level label from the event name
//! - Extracting the timestamp, task, subtask and text fields
//! - Writing one line per event to a sink

pub mod line;
pub mod printer;

// Re-export main functions
pub use line::{format_event, level_of, FormattedLine};
pub use printer::write_events;
