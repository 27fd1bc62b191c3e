//! Sequential decoding of one stream file: packets, then events within
//! each packet.

use super::bits::BitReader;
use super::decoder::{decode_struct, DecodeFailure, DecodeState, Lookup};
use super::event::{find_field, find_last, Event, FieldValue, Scope};
use super::metadata::{StreamClass, TraceMetadata};
use super::types::StructType;
use crate::utils::config::STREAM_PACKET_MAGIC;
use crate::utils::error::DecodeError;
use log::{debug, trace};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Bytes read up front to decode a packet's header and context
const PACKET_PROBE_SIZE: u64 = 4096;

type Fields = Vec<(String, FieldValue)>;

/// The packet currently being walked
struct Packet {
    data: Vec<u8>,
    /// Bit position of the next event
    pos: u64,
    content_bits: u64,
    stream_id: u64,
    header: Fields,
    context: Fields,
    clock: u64,
}

/// Cursor over the events of one stream file, in file order
pub struct StreamCursor {
    path: PathBuf,
    file: File,
    file_len: u64,
    /// Byte offset of the next packet
    next_packet: u64,
    packet: Option<Packet>,
    /// Clock carried across packets without `timestamp_begin`
    clock: u64,
    packets_read: u64,
}

impl StreamCursor {
    /// Open a stream file
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            file_len,
            next_packet: 0,
            packet: None,
            clock: 0,
            packets_read: 0,
        })
    }

    /// Decode the next event, or `None` once the file is exhausted
    ///
    /// **Public** - driven by the reader's chronological merge
    ///
    /// # Errors
    /// * `DecodeError::Io` - the file cannot be read
    /// * `DecodeError::UnexpectedEnd` - a field crosses the end of its packet
    /// * `DecodeError::BadMagic` / `UnknownStream` / `UnknownEvent` / `Malformed`
    pub fn next_event(&mut self, meta: &TraceMetadata) -> Result<Option<Event>, DecodeError> {
        loop {
            let in_packet = self.packet.as_ref().map(|p| p.pos < p.content_bits);
            match in_packet {
                Some(true) => return self.decode_event(meta).map(Some),
                Some(false) => {
                    if let Some(packet) = self.packet.take() {
                        self.clock = packet.clock;
                    }
                }
                None if self.next_packet >= self.file_len => return Ok(None),
                None => self.load_packet(meta)?,
            }
        }
    }

    fn read_at(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, DecodeError> {
        let mut buf = vec![0u8; len as usize];
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut buf))
            .map_err(|source| DecodeError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(buf)
    }

    fn failure(&self, base: u64, failure: DecodeFailure) -> DecodeError {
        match failure {
            DecodeFailure::OutOfBounds { offset } => DecodeError::UnexpectedEnd {
                path: self.path.clone(),
                offset: base * 8 + offset,
            },
            DecodeFailure::Invalid(reason) => self.malformed(reason),
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    /// Decode the packet header and context at `next_packet`, then load the packet
    fn load_packet(&mut self, meta: &TraceMetadata) -> Result<(), DecodeError> {
        let offset = self.next_packet;
        let remaining = self.file_len - offset;

        // Header and context are decoded from a growing probe of the packet start
        let mut probe_len = PACKET_PROBE_SIZE.min(remaining);
        let (header, context, stream_id, body_start) = loop {
            let probe = self.read_at(offset, probe_len)?;
            match self.decode_preamble(meta, &probe) {
                Ok(decoded) => break decoded,
                Err(PreambleError::Decode(DecodeFailure::OutOfBounds { .. }))
                    if probe_len < remaining =>
                {
                    probe_len = (probe_len * 2).min(remaining);
                }
                Err(PreambleError::Decode(failure)) => return Err(self.failure(offset, failure)),
                Err(PreambleError::Fatal(e)) => return Err(e),
            }
        };

        let packet_bits = match find_field(&context, "packet_size").and_then(FieldValue::as_u64) {
            Some(bits) => bits,
            None => remaining * 8,
        };
        let content_bits = find_field(&context, "content_size")
            .and_then(FieldValue::as_u64)
            .unwrap_or(packet_bits);

        if packet_bits == 0 || packet_bits % 8 != 0 {
            return Err(self.malformed(format!(
                "packet at byte {offset} has invalid size {packet_bits} bits"
            )));
        }
        if content_bits > packet_bits || content_bits < body_start {
            return Err(self.malformed(format!(
                "packet at byte {offset} has content size {content_bits} bits outside {body_start}..={packet_bits}"
            )));
        }
        let packet_len = packet_bits / 8;
        if packet_len > remaining {
            return Err(DecodeError::UnexpectedEnd {
                path: self.path.clone(),
                offset: self.file_len * 8,
            });
        }

        let clock = find_field(&context, "timestamp_begin")
            .and_then(FieldValue::as_u64)
            .unwrap_or(self.clock);

        let data = self.read_at(offset, packet_len)?;
        trace!(
            "{}: packet at byte {} ({} bits, {} content bits, stream {})",
            self.path.display(),
            offset,
            packet_bits,
            content_bits,
            stream_id
        );

        self.next_packet = offset + packet_len;
        self.packets_read += 1;
        self.packet = Some(Packet {
            data,
            pos: body_start,
            content_bits,
            stream_id,
            header,
            context,
            clock,
        });
        Ok(())
    }

    /// Decode trace packet header and stream packet context from packet start bytes
    fn decode_preamble(
        &self,
        meta: &TraceMetadata,
        probe: &[u8],
    ) -> Result<(Fields, Fields, u64, u64), PreambleError> {
        let mut reader = BitReader::new(probe);
        let mut state = DecodeState::new(meta.byte_order);

        let header = match &meta.packet_header {
            Some(ty) => decode_struct(ty, &mut reader, &mut state, None)?,
            None => Vec::new(),
        };

        if let Some(magic) = find_field(&header, "magic").and_then(FieldValue::as_u64) {
            if magic != STREAM_PACKET_MAGIC {
                return Err(PreambleError::Fatal(DecodeError::BadMagic {
                    path: self.path.clone(),
                    magic,
                }));
            }
        }

        let requested = find_field(&header, "stream_id").and_then(FieldValue::as_u64);
        let stream = meta.stream(requested).ok_or_else(|| {
            PreambleError::Fatal(DecodeError::UnknownStream {
                path: self.path.clone(),
                id: requested.unwrap_or(0),
            })
        })?;

        let context = match &stream.packet_context {
            Some(ty) => {
                let lookup = Lookup::new(&header, None);
                decode_struct(ty, &mut reader, &mut state, Some(&lookup))?
            }
            None => Vec::new(),
        };

        Ok((header, context, stream.id, reader.position()))
    }

    /// Decode the event at the current packet position
    fn decode_event(&mut self, meta: &TraceMetadata) -> Result<Event, DecodeError> {
        let packet = match self.packet.as_mut() {
            Some(packet) => packet,
            None => {
                return Err(DecodeError::Malformed {
                    path: self.path.clone(),
                    reason: "no packet loaded".to_string(),
                })
            }
        };
        let stream = match meta.streams.get(&packet.stream_id) {
            Some(stream) => stream,
            None => {
                let id = packet.stream_id;
                return Err(DecodeError::UnknownStream {
                    path: self.path.clone(),
                    id,
                });
            }
        };

        let mut reader = BitReader::new(&packet.data).with_limit(packet.content_bits);
        reader.seek(packet.pos);
        let mut state = DecodeState::new(meta.byte_order);
        state.clock = packet.clock;
        state.track_clock = true;

        let decoded = decode_event_scopes(stream, &mut reader, &mut state, packet);
        let end = reader.position();

        match decoded {
            Ok((class_name, scopes)) => {
                packet.pos = end;
                packet.clock = state.clock;

                let mut event = Event::new(class_name)
                    .with_stream_id(packet.stream_id)
                    .with_timestamp(state.clock)
                    .with_scope(Scope::PacketHeader, packet.header.clone())
                    .with_scope(Scope::PacketContext, packet.context.clone());
                for (scope, fields) in scopes {
                    event = event.with_scope(scope, fields);
                }
                Ok(event)
            }
            Err(EventError::Decode(failure)) => {
                let base = self.next_packet - packet.data.len() as u64;
                Err(self.failure(base, failure))
            }
            Err(EventError::UnknownEvent(id)) => {
                let stream_id = packet.stream_id;
                Err(DecodeError::UnknownEvent {
                    path: self.path.clone(),
                    stream_id,
                    id,
                })
            }
        }
    }
}

enum PreambleError {
    Decode(DecodeFailure),
    Fatal(DecodeError),
}

impl From<DecodeFailure> for PreambleError {
    fn from(failure: DecodeFailure) -> Self {
        PreambleError::Decode(failure)
    }
}

enum EventError {
    Decode(DecodeFailure),
    UnknownEvent(u64),
}

impl From<DecodeFailure> for EventError {
    fn from(failure: DecodeFailure) -> Self {
        EventError::Decode(failure)
    }
}

/// Decode header, contexts and payload; returns the event class name and scopes
fn decode_event_scopes(
    stream: &StreamClass,
    reader: &mut BitReader<'_>,
    state: &mut DecodeState,
    packet: &Packet,
) -> Result<(String, Vec<(Scope, Fields)>), EventError> {
    let start = reader.position();
    let packet_header = Lookup::new(&packet.header, None);
    let packet_context = Lookup::new(&packet.context, Some(&packet_header));

    let header = decode_optional(stream.event_header.as_ref(), reader, state, &packet_context)?;
    // Only the event header drives the clock
    state.track_clock = false;
    let id = find_last(&header, "id").and_then(FieldValue::as_u64).unwrap_or(0);
    let class = stream.events.get(&id).ok_or(EventError::UnknownEvent(id))?;

    let header_lookup = Lookup::new(&header, Some(&packet_context));
    let stream_context =
        decode_optional(stream.event_context.as_ref(), reader, state, &header_lookup)?;
    let stream_context_lookup = Lookup::new(&stream_context, Some(&header_lookup));
    let event_context = decode_optional(class.context.as_ref(), reader, state, &stream_context_lookup)?;
    let event_context_lookup = Lookup::new(&event_context, Some(&stream_context_lookup));
    let payload = decode_optional(class.fields.as_ref(), reader, state, &event_context_lookup)?;

    // An event that occupies no bits would never advance the packet
    if reader.position() == start {
        return Err(EventError::Decode(DecodeFailure::Invalid(format!(
            "event `{}` has an empty layout",
            class.name
        ))));
    }

    Ok((
        class.name.clone(),
        vec![
            (Scope::EventHeader, header),
            (Scope::StreamEventContext, stream_context),
            (Scope::EventContext, event_context),
            (Scope::Payload, payload),
        ],
    ))
}

fn decode_optional(
    ty: Option<&StructType>,
    reader: &mut BitReader<'_>,
    state: &mut DecodeState,
    parent: &Lookup<'_>,
) -> Result<Fields, DecodeFailure> {
    match ty {
        Some(ty) => decode_struct(ty, reader, state, Some(parent)),
        None => Ok(Vec::new()),
    }
}

impl std::fmt::Debug for StreamCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCursor")
            .field("path", &self.path)
            .field("next_packet", &self.next_packet)
            .field("packets_read", &self.packets_read)
            .finish()
    }
}

impl Drop for StreamCursor {
    fn drop(&mut self) {
        debug!(
            "Closing stream {} after {} packet(s)",
            self.path.display(),
            self.packets_read
        );
    }
}
