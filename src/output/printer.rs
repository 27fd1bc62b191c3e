//! Streaming of formatted event lines to an output sink.

use super::line::FormattedLine;
use crate::parser::Event;
use crate::utils::error::{DecodeError, OutputError};
use log::debug;
use std::io::{BufWriter, Write};

/// Write one line per event, in the order the events arrive
///
/// **Public** - used by the dump command with stdout as sink
///
/// # Arguments
/// * `events` - Event sequence from the reader
/// * `sink` - Output destination
///
/// # Returns
/// Number of lines written
///
/// # Errors
/// * `OutputError::Decode` - the reader failed; lines already written stay written
/// * `OutputError::WriteFailed` - the sink rejected a write
pub fn write_events<I, W>(events: I, sink: W) -> Result<u64, OutputError>
where
    I: IntoIterator<Item = Result<Event, DecodeError>>,
    W: Write,
{
    let mut writer = BufWriter::new(sink);
    let mut written = 0u64;

    for event in events {
        let event = match event {
            Ok(event) => event,
            Err(error) => {
                // Flush what was decoded before the failure
                writer.flush()?;
                return Err(OutputError::Decode(error));
            }
        };
        writeln!(writer, "{}", FormattedLine::from_event(&event))?;
        written += 1;
    }

    writer.flush()?;
    debug!("Wrote {} line(s)", written);
    Ok(written)
}
