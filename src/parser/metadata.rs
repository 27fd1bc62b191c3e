//! Trace metadata: the classes declared by the TSDL text and the loader
//! that reads (and if needed depacketizes) the `metadata` file.

use super::tsdl::parse_tsdl;
use super::types::{ByteOrder, StructType};
use crate::utils::config::{METADATA_FILE_NAME, METADATA_PACKET_HEADER_SIZE, METADATA_PACKET_MAGIC};
use crate::utils::error::{MetadataError, OpenError};
use log::debug;
use std::collections::BTreeMap;
use std::path::Path;

/// Everything the TSDL metadata declares about one trace
#[derive(Debug, Clone, PartialEq)]
pub struct TraceMetadata {
    pub major: u64,
    pub minor: u64,
    pub uuid: Option<String>,
    /// Resolved trace byte order (never `Native`)
    pub byte_order: ByteOrder,
    pub packet_header: Option<StructType>,
    pub env: Vec<(String, String)>,
    pub clocks: Vec<ClockClass>,
    pub streams: BTreeMap<u64, StreamClass>,
}

impl TraceMetadata {
    /// Stream class for a packet's `stream_id`.
    ///
    /// Packets without a stream id fall back to the only declared stream.
    pub fn stream(&self, id: Option<u64>) -> Option<&StreamClass> {
        match id {
            Some(id) => self.streams.get(&id),
            None if self.streams.len() == 1 => self.streams.values().next(),
            None => self.streams.get(&0),
        }
    }

    /// Look up an `env` entry
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Total number of event classes across all streams
    pub fn event_class_count(&self) -> usize {
        self.streams.values().map(|s| s.events.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockClass {
    pub name: String,
    pub uuid: Option<String>,
    pub description: Option<String>,
    /// Cycles per second
    pub freq: u64,
    pub precision: u64,
    pub offset_s: i64,
    pub offset: i64,
    pub absolute: bool,
}

impl Default for ClockClass {
    fn default() -> Self {
        Self {
            name: String::new(),
            uuid: None,
            description: None,
            freq: 1_000_000_000,
            precision: 0,
            offset_s: 0,
            offset: 0,
            absolute: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamClass {
    pub id: u64,
    pub packet_context: Option<StructType>,
    pub event_header: Option<StructType>,
    pub event_context: Option<StructType>,
    pub events: BTreeMap<u64, EventClass>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventClass {
    pub id: u64,
    pub name: String,
    pub stream_id: u64,
    pub loglevel: Option<i64>,
    pub context: Option<StructType>,
    pub fields: Option<StructType>,
}

/// Read and parse the `metadata` file of a trace directory
///
/// **Public** - used by the reader when opening a trace
///
/// # Errors
/// * `OpenError::MissingMetadata` - no `metadata` file in `trace_dir`
/// * `OpenError::Io` - the file exists but cannot be read
/// * `OpenError::Metadata` - bad metadata packets or invalid TSDL
pub fn load_metadata(trace_dir: &Path) -> Result<TraceMetadata, OpenError> {
    let path = trace_dir.join(METADATA_FILE_NAME);
    if !path.is_file() {
        return Err(OpenError::MissingMetadata(trace_dir.to_path_buf()));
    }

    let raw = std::fs::read(&path).map_err(|source| OpenError::Io {
        path: path.clone(),
        source,
    })?;
    debug!("Read {} bytes of metadata from {}", raw.len(), path.display());

    let text = metadata_text(&raw)?;
    Ok(parse_tsdl(&text)?)
}

/// Extract the TSDL text from raw metadata file contents
///
/// Plain-text metadata is returned as is; packetized metadata has its
/// packet headers stripped and the payloads concatenated.
pub fn metadata_text(raw: &[u8]) -> Result<String, MetadataError> {
    match packet_byte_order(raw) {
        Some(order) => {
            let text = depacketize(raw, order)?;
            Ok(String::from_utf8_lossy(&text).into_owned())
        }
        None => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}

/// Byte order of packetized metadata, or None for plain text
fn packet_byte_order(raw: &[u8]) -> Option<ByteOrder> {
    let magic: [u8; 4] = raw.get(..4)?.try_into().ok()?;
    if u32::from_le_bytes(magic) == METADATA_PACKET_MAGIC {
        Some(ByteOrder::Little)
    } else if u32::from_be_bytes(magic) == METADATA_PACKET_MAGIC {
        Some(ByteOrder::Big)
    } else {
        None
    }
}

fn read_u32(raw: &[u8], at: usize, order: ByteOrder) -> Result<u32, MetadataError> {
    let bytes: [u8; 4] = raw
        .get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| MetadataError::Packet(format!("truncated header at byte {at}")))?;
    Ok(match order {
        ByteOrder::Big => u32::from_be_bytes(bytes),
        _ => u32::from_le_bytes(bytes),
    })
}

/// Concatenate the payloads of all metadata packets
fn depacketize(raw: &[u8], order: ByteOrder) -> Result<Vec<u8>, MetadataError> {
    let mut text = Vec::with_capacity(raw.len());
    let mut offset = 0usize;

    while offset < raw.len() {
        let magic = read_u32(raw, offset, order)?;
        if magic != METADATA_PACKET_MAGIC {
            return Err(MetadataError::Packet(format!(
                "bad magic {magic:#x} at byte {offset}"
            )));
        }

        // magic(4) uuid(16) checksum(4) content_size(4) packet_size(4) then 5 single bytes
        let content_bits = read_u32(raw, offset + 24, order)? as usize;
        let packet_bits = read_u32(raw, offset + 28, order)? as usize;
        let flags = raw
            .get(offset + 32..offset + 35)
            .ok_or_else(|| MetadataError::Packet("truncated header".to_string()))?;
        if flags.iter().any(|&b| b != 0) {
            return Err(MetadataError::Packet(
                "compressed, encrypted or checksummed metadata is not supported".to_string(),
            ));
        }

        let content_len = content_bits / 8;
        let packet_len = packet_bits / 8;
        if content_len < METADATA_PACKET_HEADER_SIZE || packet_len < content_len {
            return Err(MetadataError::Packet(format!(
                "invalid sizes (content {content_bits} bits, packet {packet_bits} bits) at byte {offset}"
            )));
        }

        let payload = raw
            .get(offset + METADATA_PACKET_HEADER_SIZE..offset + content_len)
            .ok_or_else(|| {
                MetadataError::Packet(format!("packet at byte {offset} exceeds file size"))
            })?;
        text.extend_from_slice(payload);
        offset += packet_len;
    }

    Ok(text)
}
