//! Chronological merge of per-stream event sequences.

use crate::parser::{Event, StreamCursor, TraceMetadata};
use crate::utils::error::DecodeError;
use log::debug;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Lazy, single-pass sequence of events across all streams of a trace.
///
/// Each stream contributes at most one pending event; the earliest one is
/// yielded next, ties going to the stream whose file name sorts first. The
/// first decoding error ends the sequence.
pub struct Events {
    metadata: TraceMetadata,
    streams: Vec<Option<StreamCursor>>,
    pending: Vec<Option<Event>>,
    heap: BinaryHeap<Reverse<(u64, usize)>>,
    primed: bool,
    deferred_error: Option<DecodeError>,
    finished: bool,
    yielded: u64,
}

impl Events {
    pub(crate) fn new(metadata: TraceMetadata, streams: Vec<StreamCursor>) -> Self {
        let count = streams.len();
        Self {
            metadata,
            streams: streams.into_iter().map(Some).collect(),
            pending: (0..count).map(|_| None).collect(),
            heap: BinaryHeap::with_capacity(count),
            primed: false,
            deferred_error: None,
            finished: false,
            yielded: 0,
        }
    }

    /// Pull the next event of stream `index` into the heap
    fn refill(&mut self, index: usize) -> Result<(), DecodeError> {
        let Some(cursor) = self.streams[index].as_mut() else {
            return Ok(());
        };

        match cursor.next_event(&self.metadata)? {
            Some(event) => {
                self.heap.push(Reverse((event.timestamp(), index)));
                self.pending[index] = Some(event);
            }
            None => {
                // Exhausted: release the file handle now
                self.streams[index] = None;
            }
        }
        Ok(())
    }

    fn prime(&mut self) -> Result<(), DecodeError> {
        self.primed = true;
        for index in 0..self.streams.len() {
            self.refill(index)?;
        }
        Ok(())
    }

    fn fail(&mut self, error: DecodeError) -> Option<Result<Event, DecodeError>> {
        self.finished = true;
        self.streams.clear();
        self.pending.clear();
        self.heap.clear();
        Some(Err(error))
    }
}

impl Iterator for Events {
    type Item = Result<Event, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(error) = self.deferred_error.take() {
            return self.fail(error);
        }
        if !self.primed {
            if let Err(error) = self.prime() {
                return self.fail(error);
            }
        }

        let Some(Reverse((_, index))) = self.heap.pop() else {
            self.finished = true;
            debug!("Event sequence exhausted after {} event(s)", self.yielded);
            return None;
        };

        let event = self.pending[index].take()?;
        // The event in hand is still returned; a refill error surfaces on the next call
        if let Err(error) = self.refill(index) {
            self.deferred_error = Some(error);
        }

        self.yielded += 1;
        Some(Ok(event))
    }
}

impl std::iter::FusedIterator for Events {}
