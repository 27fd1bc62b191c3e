//! Formatting of one event into one text line.

use crate::parser::{Event, FieldValue};
use crate::utils::config::{
    LEVEL_PREFIX, SUBTASK_FIELD, TASK_FIELD, TEXT_FIELD, TIMESTAMP_FIELD, UNSET_PLACEHOLDER,
};
use std::fmt;

/// The printable parts of one event
///
/// Renders as `[<level>:<timestamp>] <task>.<subtask>: <text>`, with
/// missing fields shown as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedLine<'a> {
    pub level: &'a str,
    pub timestamp: Option<&'a FieldValue>,
    pub task: Option<&'a FieldValue>,
    pub subtask: Option<&'a FieldValue>,
    pub text: Option<&'a FieldValue>,
}

impl<'a> FormattedLine<'a> {
    /// Extract the line parts from an event
    pub fn from_event(event: &'a Event) -> Self {
        Self {
            level: level_of(event.name()),
            timestamp: event.get(TIMESTAMP_FIELD),
            task: event.get(TASK_FIELD),
            subtask: event.get(SUBTASK_FIELD),
            text: event.get(TEXT_FIELD),
        }
    }
}

impl fmt::Display for FormattedLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{}] {}.{}: {}",
            self.level,
            Slot(self.timestamp),
            Slot(self.task),
            Slot(self.subtask),
            Slot(self.text)
        )
    }
}

/// A field value or the unset placeholder
struct Slot<'a>(Option<&'a FieldValue>);

impl fmt::Display for Slot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str(UNSET_PLACEHOLDER),
        }
    }
}

/// Event name with the tracepoint provider prefix removed, if present
pub fn level_of(name: &str) -> &str {
    name.strip_prefix(LEVEL_PREFIX).unwrap_or(name)
}

/// Format one event as a single output line (no trailing newline)
pub fn format_event(event: &Event) -> String {
    FormattedLine::from_event(event).to_string()
}
