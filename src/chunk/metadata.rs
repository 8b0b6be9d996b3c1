//! Extraction of declared event types from a chunk's metadata section.
//!
//! The section is a string table followed by a tree of generic elements. Every element is a
//! name, a list of attributes and a number of children, all referring to the string table by
//! index. The tree has the shape
//!
//! ```text
//! root
//!   metadata
//!     class (name, superType, ...)
//!       field / annotation / setting ...
//!   region
//! ```
//!
//! and a class is an event type when its `superType` attribute is `jdk.jfr.Event`.
use std::collections::BTreeSet;
use std::io::{Read, Seek, SeekFrom};

use super::header::read_full;
use super::varint::ByteCursor;
use super::{ChunkError, ChunkHeader, HEADER_SIZE};

pub const EVENT_SUPER_TYPE: &str = "jdk.jfr.Event";

// enough bytes to decode the leading size varint
const SIZE_PROBE: usize = 32;
const STREAM_SIZE_PROBE: usize = 16;
const PADDING: usize = 16;

/// Reads the metadata section located at `position` and returns the event types it declares.
///
/// The section is read twice: a small probe to learn its size, then the whole section. A
/// declared size larger than `max_len` is clamped to it.
pub fn read_event_types<R: Read + Seek>(
    reader: &mut R,
    position: u64,
    max_len: u64,
) -> Result<BTreeSet<String>, ChunkError> {
    reader.seek(SeekFrom::Start(position))?;
    let mut probe = [0u8; SIZE_PROBE];
    let read = read_full(reader, &mut probe)?;
    let declared = ByteCursor::new(&probe[..read]).read_varint()?;
    let size = u64::from(declared).min(max_len) as usize;

    reader.seek(SeekFrom::Start(position))?;
    let mut section = vec![0u8; size + PADDING];
    let read = read_full(reader, &mut section)?;
    section.truncate(read);
    trace!(
        "metadata section at {}: {} bytes declared, {} read",
        position,
        declared,
        read
    );
    parse_event_types(&section)
}

/// Streaming variant of `read_event_types` for inputs that cannot seek. The reader has to be
/// positioned at the start of the metadata section; returns the event types and the number of
/// bytes consumed from the reader.
pub fn stream_event_types<R: Read>(
    reader: &mut R,
    header: &ChunkHeader,
) -> Result<(BTreeSet<String>, u64), ChunkError> {
    let available = (header.size - header.offset_meta).max(0) as usize;
    let mut probe = [0u8; STREAM_SIZE_PROBE];
    let probe_len = STREAM_SIZE_PROBE.min(available);
    let read = read_full(reader, &mut probe[..probe_len])?;
    let size = ByteCursor::new(&probe[..read]).read_varint()? as usize;

    let mut section = probe[..read].to_vec();
    // the declared sizes are untrusted, so the buffer only grows with the bytes actually read
    let rest = size.saturating_sub(read).min(available - read);
    if rest > 0 {
        reader.by_ref().take(rest as u64).read_to_end(&mut section)?;
    }
    let consumed = section.len() as u64;
    Ok((parse_event_types(&section)?, consumed))
}

/// Offset of the metadata section relative to the end of the header, for streaming readers.
pub(crate) fn bytes_before_metadata(header: &ChunkHeader) -> u64 {
    (header.offset_meta - HEADER_SIZE as i64).max(0) as u64
}

struct Element<'s> {
    name: &'s str,
    attributes: Vec<(&'s str, &'s str)>,
    child_count: u32,
}

impl<'s> Element<'s> {
    fn attribute(&self, key: &str) -> Option<&'s str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Parent {
    Root,
    Metadata,
    Other,
}

pub fn parse_event_types(section: &[u8]) -> Result<BTreeSet<String>, ChunkError> {
    let mut cursor = ByteCursor::new(section);
    cursor.read_varint()?; // size
    cursor.read_varint()?; // number of types
    cursor.read_varlong()?; // start time
    cursor.read_varlong()?; // duration
    cursor.read_varlong()?; // start ticks

    let strings = read_string_table(&mut cursor)?;

    let root = read_element(&mut cursor, &strings, false)?;
    if root.name != "root" {
        return Err(ChunkError::ExpectedRootElement(root.name.to_string()));
    }

    let mut event_types = BTreeSet::new();
    // (children left to read, element kind of the parent)
    let mut stack: Vec<(u32, Parent)> = vec![(root.child_count, Parent::Root)];
    while let Some((remaining, parent)) = stack.last_mut() {
        if *remaining == 0 {
            stack.pop();
            continue;
        }
        *remaining -= 1;
        let parent = *parent;

        let element = read_element(&mut cursor, &strings, parent == Parent::Metadata)?;
        let kind = match parent {
            Parent::Root => match element.name {
                "metadata" => Parent::Metadata,
                "region" => Parent::Other,
                other => return Err(ChunkError::UnexpectedElement(other.to_string())),
            },
            Parent::Metadata => {
                if element.attribute("superType") == Some(EVENT_SUPER_TYPE) {
                    if let Some(name) = element.attribute("name") {
                        event_types.insert(name.to_string());
                    }
                }
                Parent::Other
            }
            Parent::Other => Parent::Other,
        };
        stack.push((element.child_count, kind));
    }
    Ok(event_types)
}

fn read_string_table(cursor: &mut ByteCursor) -> Result<Vec<String>, ChunkError> {
    let count = cursor.read_varint()? as usize;
    // every entry takes at least one byte
    let mut strings = Vec::with_capacity(count.min(cursor.remaining()));
    for _ in 0..count {
        strings.push(read_string(cursor)?);
    }
    Ok(strings)
}

fn read_string(cursor: &mut ByteCursor) -> Result<String, ChunkError> {
    match cursor.read_u8()? {
        0 | 1 => Ok(String::new()),
        3 => {
            let len = cursor.read_varint()? as usize;
            let bytes = cursor.read_bytes(len)?;
            Ok(std::str::from_utf8(bytes)?.to_string())
        }
        4 => {
            let len = cursor.read_varint()? as usize;
            let mut s = String::with_capacity(len.min(cursor.remaining()));
            for _ in 0..len {
                let c = cursor.read_varint()?;
                s.push(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Ok(s)
        }
        other => Err(ChunkError::UnknownStringEncoding(other)),
    }
}

fn lookup<'s>(strings: &'s [String], index: u32) -> Result<&'s str, ChunkError> {
    strings
        .get(index as usize)
        .map(String::as_str)
        .ok_or(ChunkError::InvalidStringIndex {
            index,
            len: strings.len(),
        })
}

fn read_element<'s>(
    cursor: &mut ByteCursor,
    strings: &'s [String],
    with_attributes: bool,
) -> Result<Element<'s>, ChunkError> {
    let name = lookup(strings, cursor.read_varint()?)?;
    let attribute_count = cursor.read_varint()?;
    let mut attributes = Vec::new();
    for _ in 0..attribute_count {
        let key = cursor.read_varint()?;
        let value = cursor.read_varint()?;
        if with_attributes {
            attributes.push((lookup(strings, key)?, lookup(strings, value)?));
        }
    }
    let child_count = cursor.read_varint()?;
    Ok(Element {
        name,
        attributes,
        child_count,
    })
}
