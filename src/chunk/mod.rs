//! Chunk-level access to flight recordings.
//!
//! A recording is a sequence of self-contained chunks. Each chunk starts with a fixed 68-byte
//! big-endian header:
//!
//! ```text
//! offset  size  field
//!      0     4  magic, always b"FLR\0"
//!      4     4  version, major << 16 | minor
//!      8     8  chunk size in bytes, header included
//!     16     8  offset of the constant pool, relative to the chunk start
//!     24     8  offset of the metadata section, relative to the chunk start
//!     32     8  start time, nanoseconds since the epoch
//!     40     8  duration in nanoseconds
//!     48     8  start ticks
//!     56     8  tick frequency
//!     64     4  feature flags, bit 1 marks the final chunk
//! ```
//!
//! The metadata section describes every type used in the chunk. We only walk it far enough to
//! learn which event types the chunk declares, the events themselves are never decoded.
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod disassembler;
pub mod header;
pub mod info;
pub mod iterator;
pub mod metadata;
pub mod varint;

pub use self::header::ChunkHeader;
pub use self::iterator::{
    open_recording, scan, scan_headers, ChunkIterator, ChunkScan, StreamChunkIterator,
};

pub const MAGIC: u32 = 0x464C_5200;
pub const HEADER_SIZE: usize = 68;
pub const MIN_VERSION: u32 = 0x2_0000;
pub const MAX_VERSION: u32 = 0x2_FFFF;
pub const MASK_FINAL_CHUNK: u32 = 1 << 1;

/// Recordings with a `.gz` extension are gzip-compressed and can only be read as a stream.
pub fn is_compressed(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Chunk {chunk_index}: invalid magic {found:#010x}, this is not a flight recording")]
    InvalidMagic { chunk_index: usize, found: u32 },
    #[error("Chunk {chunk_index}: unsupported format version {major}.{minor}")]
    UnsupportedVersion {
        chunk_index: usize,
        major: u16,
        minor: u16,
    },
    #[error("Chunk {chunk_index}: invalid offsets (constant pool {constant_pool}, metadata {metadata})")]
    InvalidOffsets {
        chunk_index: usize,
        constant_pool: i64,
        metadata: i64,
    },
    #[error("Chunk {chunk_index}: invalid chunk size {size}")]
    InvalidSize { chunk_index: usize, size: i64 },
    #[error("Chunk {chunk_index}: incomplete header, only {read} of 68 bytes available")]
    IncompleteHeader { chunk_index: usize, read: usize },
    #[error("Chunk {chunk_index}: declares {size} bytes but only {available} are left")]
    Truncated {
        chunk_index: usize,
        size: u64,
        available: u64,
    },
    #[error("Chunk {chunk_index}: malformed metadata section")]
    Metadata {
        chunk_index: usize,
        #[source]
        source: Box<ChunkError>,
    },
    #[error("Unexpected end of buffer at offset {position}")]
    UnexpectedEndOfBuffer { position: usize },
    #[error("Invalid string index {index}, the string table has {len} entries")]
    InvalidStringIndex { index: u32, len: usize },
    #[error("Unknown string encoding {0}")]
    UnknownStringEncoding(u8),
    #[error("Invalid UTF-8 in the metadata string table")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("Expected a root element, found {0:?}")]
    ExpectedRootElement(String),
    #[error("Unexpected element {0:?} under the root element")]
    UnexpectedElement(String),
}

impl ChunkError {
    pub(crate) fn in_metadata(self, chunk_index: usize) -> ChunkError {
        match self {
            ChunkError::Io(e) => ChunkError::Io(e),
            other => ChunkError::Metadata {
                chunk_index,
                source: Box::new(other),
            },
        }
    }
}

/// One chunk of a recording, as seen by the iterators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    /// Byte offset of the chunk within the recording.
    pub position: u64,
    pub start_time: DateTime<Utc>,
    pub duration: Duration,
    pub size: u64,
    pub metadata_offset: u64,
    /// Declared event types. Empty when the chunk was read in header-only mode.
    pub event_types: BTreeSet<String>,
    pub final_chunk: bool,
}

impl Chunk {
    pub(crate) fn new(
        index: usize,
        position: u64,
        header: &ChunkHeader,
        event_types: BTreeSet<String>,
    ) -> Chunk {
        Chunk {
            index,
            position,
            start_time: DateTime::from_timestamp_nanos(header.start_nanos),
            duration: Duration::from_nanos(header.duration_nanos.max(0) as u64),
            size: header.size as u64,
            metadata_offset: header.offset_meta as u64,
            event_types,
            final_chunk: header.is_final(),
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::nanoseconds(self.duration.as_nanos() as i64)
    }
}
