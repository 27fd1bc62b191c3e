//! Configuration and constants for the CLI and the trace reader.

/// Default location of the trace inside an LTTng session directory
/// (domain / user id / architecture width)
pub const DEFAULT_TRACE_SUBPATH: &str = "ust/uid/1000/64-bit";

/// Environment variable overriding the trace sub-path
pub const TRACE_SUBPATH_ENV: &str = "CTF_DUMP_SUBPATH";

/// Provider prefix stripped from event names to obtain the level label
pub const LEVEL_PREFIX: &str = "service_fabric:tracepoint_";

// Field names extracted for each printed line
pub const TIMESTAMP_FIELD: &str = "timestamp_begin";
pub const TASK_FIELD: &str = "taskNameField";
pub const SUBTASK_FIELD: &str = "eventNameField";
pub const TEXT_FIELD: &str = "dataField";

/// Rendered in place of a field the event does not carry
pub const UNSET_PLACEHOLDER: &str = "None";

/// Name of the TSDL metadata file in a trace directory
pub const METADATA_FILE_NAME: &str = "metadata";

// CTF magic numbers
pub const METADATA_PACKET_MAGIC: u32 = 0x75D1_1D57;
pub const METADATA_PACKET_HEADER_SIZE: usize = 37;
pub const STREAM_PACKET_MAGIC: u64 = 0xC1FC_1FC1;

/// Upper bound for a single array/sequence length, guards against garbage lengths
pub const MAX_SEQUENCE_LENGTH: u64 = 1 << 24;
