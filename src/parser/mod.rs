//! CTF trace parsing.
//!
//! This module handles:
//! - Tokenizing and parsing TSDL metadata
//! - Unwrapping packetized metadata files
//! - Bit-level decoding of typed fields
//! - Walking the packets and events of a stream file

pub mod bits;
pub mod decoder;
pub mod event;
pub mod lexer;
pub mod metadata;
pub mod stream;
pub mod tsdl;
pub mod types;

// Re-export main types
pub use event::{Event, FieldValue, Scope};
pub use metadata::{load_metadata, ClockClass, EventClass, StreamClass, TraceMetadata};
pub use stream::StreamCursor;
pub use tsdl::parse_tsdl;
