//! Helpers for building small CTF traces on disk.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const STREAM_MAGIC: u32 = 0xC1FC_1FC1;
pub const METADATA_MAGIC: u32 = 0x75D1_1D57;

/// Byte-aligned layout: `{magic, stream_id}` packet header, four 64-bit
/// packet context fields, `{uint32 id, uint64 timestamp}` event header.
pub const SIMPLE_METADATA: &str = r#"/* CTF 1.8 */
typealias integer { size = 8; align = 8; signed = false; } := uint8_t;
typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
typealias integer { size = 64; align = 8; signed = false; } := uint64_t;

trace {
    major = 1;
    minor = 8;
    byte_order = le;
    packet.header := struct {
        uint32_t magic;
        uint32_t stream_id;
    };
};

clock {
    name = "monotonic";
    freq = 1000000000;
};

typealias integer {
    size = 64; align = 8; signed = false;
    map = clock.monotonic.value;
} := uint64_clock_monotonic_t;

stream {
    id = 0;
    packet.context := struct {
        uint64_clock_monotonic_t timestamp_begin;
        uint64_clock_monotonic_t timestamp_end;
        uint64_t content_size;
        uint64_t packet_size;
    };
    event.header := struct {
        uint32_t id;
        uint64_clock_monotonic_t timestamp;
    };
};

event {
    name = "service_fabric:tracepoint_Foo";
    id = 0;
    stream_id = 0;
    loglevel = 13;
    fields := struct {
        string taskNameField;
        string eventNameField;
        string dataField;
    };
};

event {
    name = "lttng_ust_statedump:start";
    id = 1;
    stream_id = 0;
    fields := struct {
        uint32_t value;
    };
};

event {
    name = "service_fabric:tracepoint_Partial";
    id = 2;
    stream_id = 0;
    fields := struct {
        string taskNameField;
    };
};

event {
    name = "service_fabric:tracepoint_Stamped";
    id = 3;
    stream_id = 0;
    fields := struct {
        string dataField;
        uint64_clock_monotonic_t timestamp;
    };
};
"#;

/// LTTng-style compact/extended event header with 5- and 27-bit fields
pub const COMPACT_METADATA: &str = r#"/* CTF 1.8 */
typealias integer { size = 5; align = 1; signed = false; } := uint5_t;
typealias integer { size = 32; align = 8; signed = false; } := uint32_t;
typealias integer { size = 64; align = 8; signed = false; } := uint64_t;

trace {
    major = 1;
    minor = 8;
    byte_order = le;
    packet.header := struct {
        uint32_t magic;
        uint32_t stream_id;
    };
};

clock { name = "monotonic"; };

typealias integer {
    size = 27; align = 1; signed = false;
    map = clock.monotonic.value;
} := uint27_clock_monotonic_t;

typealias integer {
    size = 64; align = 8; signed = false;
    map = clock.monotonic.value;
} := uint64_clock_monotonic_t;

struct event_header_compact {
    enum : uint5_t { compact = 0 ... 30, extended = 31 } id;
    variant <id> {
        struct {
            uint27_clock_monotonic_t timestamp;
        } compact;
        struct {
            uint32_t id;
            uint64_clock_monotonic_t timestamp;
        } extended;
    } v;
} align(8);

stream {
    id = 0;
    event.header := struct event_header_compact;
    packet.context := struct {
        uint64_clock_monotonic_t timestamp_begin;
        uint64_clock_monotonic_t timestamp_end;
        uint64_t content_size;
        uint64_t packet_size;
    };
};

event {
    name = "service_fabric:tracepoint_Foo";
    id = 0;
    stream_id = 0;
    fields := struct {
        string taskNameField;
        string eventNameField;
        string dataField;
    };
};

event {
    name = "service_fabric:tracepoint_Bar";
    id = 1;
    stream_id = 0;
    fields := struct {
        string taskNameField;
        string eventNameField;
        string dataField;
    };
};
"#;

/// NUL-terminated string bytes
pub fn cstr(s: &str) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// Payload of a `tracepoint_Foo`-style event
pub fn text_payload(task: &str, subtask: &str, text: &str) -> Vec<u8> {
    let mut bytes = cstr(task);
    bytes.extend(cstr(subtask));
    bytes.extend(cstr(text));
    bytes
}

/// Event with the simple `{uint32 id, uint64 timestamp}` header
pub fn simple_event(id: u32, timestamp: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_le_bytes().to_vec();
    bytes.extend(timestamp.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// Payload of a `tracepoint_Stamped` event: text plus its own `timestamp` field
pub fn stamped_payload(text: &str, timestamp: u64) -> Vec<u8> {
    let mut bytes = cstr(text);
    bytes.extend(timestamp.to_le_bytes());
    bytes
}

/// Event with a compact header: 5-bit id, 27-bit timestamp in one LE word
pub fn compact_event(id: u32, timestamp: u32, payload: &[u8]) -> Vec<u8> {
    assert!(id < 31 && timestamp < (1 << 27));
    let word = id | (timestamp << 5);
    let mut bytes = word.to_le_bytes().to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

/// Event with an extended header: id enum 31, then 32-bit id and 64-bit timestamp
pub fn extended_event(id: u32, timestamp: u64, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![31u8];
    bytes.extend(id.to_le_bytes());
    bytes.extend(timestamp.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes
}

/// One stream packet: header, context, event bytes, then `padding` zero bytes
pub fn packet(stream_id: u32, ts_begin: u64, ts_end: u64, events: &[Vec<u8>], padding: usize) -> Vec<u8> {
    let body: Vec<u8> = events.concat();
    let content = 40 + body.len();
    let total = content + padding;

    let mut bytes = Vec::with_capacity(total);
    bytes.extend(STREAM_MAGIC.to_le_bytes());
    bytes.extend(stream_id.to_le_bytes());
    bytes.extend(ts_begin.to_le_bytes());
    bytes.extend(ts_end.to_le_bytes());
    bytes.extend(((content * 8) as u64).to_le_bytes());
    bytes.extend(((total * 8) as u64).to_le_bytes());
    bytes.extend(body);
    bytes.resize(total, 0);
    bytes
}

/// Wrap TSDL text into metadata packets of at most `chunk` text bytes each
pub fn packetize_metadata(text: &str, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for piece in text.as_bytes().chunks(chunk) {
        let content = 37 + piece.len();
        let total = content + 3;
        out.extend(METADATA_MAGIC.to_le_bytes());
        out.extend([0u8; 16]);
        out.extend(0u32.to_le_bytes());
        out.extend(((content * 8) as u32).to_le_bytes());
        out.extend(((total * 8) as u32).to_le_bytes());
        out.extend([0u8, 0, 0, 1, 8]);
        out.extend_from_slice(piece);
        out.extend([0u8; 3]);
    }
    out
}

/// A trace directory inside a temporary LTTng-like session
pub struct TraceDir {
    session: TempDir,
    trace: PathBuf,
}

impl TraceDir {
    /// Trace stored under `<session>/ust/uid/1000/64-bit`
    pub fn new() -> Self {
        Self::with_subpath("ust/uid/1000/64-bit")
    }

    pub fn with_subpath(subpath: &str) -> Self {
        let session = tempfile::tempdir().unwrap();
        let trace = session.path().join(subpath);
        fs::create_dir_all(&trace).unwrap();
        Self { session, trace }
    }

    pub fn session(&self) -> &Path {
        self.session.path()
    }

    pub fn path(&self) -> &Path {
        &self.trace
    }

    pub fn metadata(&self, text: &str) -> &Self {
        fs::write(self.trace.join("metadata"), text).unwrap();
        self
    }

    pub fn metadata_bytes(&self, bytes: &[u8]) -> &Self {
        fs::write(self.trace.join("metadata"), bytes).unwrap();
        self
    }

    pub fn stream(&self, name: &str, packets: &[Vec<u8>]) -> &Self {
        fs::write(self.trace.join(name), packets.concat()).unwrap();
        self
    }
}
