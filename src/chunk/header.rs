use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder};

use super::{ChunkError, HEADER_SIZE, MAGIC, MASK_FINAL_CHUNK, MAX_VERSION, MIN_VERSION};

/// The raw 68-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub magic: u32,
    pub version: u32,
    pub size: i64,
    pub offset_constant_pool: i64,
    pub offset_meta: i64,
    pub start_nanos: i64,
    pub duration_nanos: i64,
    pub start_ticks: i64,
    pub tick_frequency: i64,
    pub features: u32,
}

impl ChunkHeader {
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> ChunkHeader {
        ChunkHeader {
            magic: BigEndian::read_u32(&bytes[0..4]),
            version: BigEndian::read_u32(&bytes[4..8]),
            size: BigEndian::read_i64(&bytes[8..16]),
            offset_constant_pool: BigEndian::read_i64(&bytes[16..24]),
            offset_meta: BigEndian::read_i64(&bytes[24..32]),
            start_nanos: BigEndian::read_i64(&bytes[32..40]),
            duration_nanos: BigEndian::read_i64(&bytes[40..48]),
            start_ticks: BigEndian::read_i64(&bytes[48..56]),
            tick_frequency: BigEndian::read_i64(&bytes[56..64]),
            features: BigEndian::read_u32(&bytes[64..68]),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        BigEndian::write_u32(&mut bytes[0..4], self.magic);
        BigEndian::write_u32(&mut bytes[4..8], self.version);
        BigEndian::write_i64(&mut bytes[8..16], self.size);
        BigEndian::write_i64(&mut bytes[16..24], self.offset_constant_pool);
        BigEndian::write_i64(&mut bytes[24..32], self.offset_meta);
        BigEndian::write_i64(&mut bytes[32..40], self.start_nanos);
        BigEndian::write_i64(&mut bytes[40..48], self.duration_nanos);
        BigEndian::write_i64(&mut bytes[48..56], self.start_ticks);
        BigEndian::write_i64(&mut bytes[56..64], self.tick_frequency);
        BigEndian::write_u32(&mut bytes[64..68], self.features);
        bytes
    }

    /// Reads the next header from a stream. Returns `None` on a clean end of stream, an error if
    /// the stream ends part-way through a header.
    pub fn read_from<R: Read>(
        reader: &mut R,
        chunk_index: usize,
    ) -> Result<Option<ChunkHeader>, ChunkError> {
        let mut bytes = [0u8; HEADER_SIZE];
        match read_full(reader, &mut bytes)? {
            0 => Ok(None),
            HEADER_SIZE => Ok(Some(ChunkHeader::parse(&bytes))),
            read => Err(ChunkError::IncompleteHeader { chunk_index, read }),
        }
    }

    pub fn major(&self) -> u16 {
        (self.version >> 16) as u16
    }

    pub fn minor(&self) -> u16 {
        (self.version & 0xffff) as u16
    }

    pub fn is_final(&self) -> bool {
        self.features & MASK_FINAL_CHUNK != 0
    }

    pub fn check_magic(&self, chunk_index: usize) -> Result<(), ChunkError> {
        if self.magic != MAGIC {
            return Err(ChunkError::InvalidMagic {
                chunk_index,
                found: self.magic,
            });
        }
        Ok(())
    }

    /// Checks every structural rule a chunk header has to follow.
    pub fn validate(&self, chunk_index: usize) -> Result<(), ChunkError> {
        self.check_magic(chunk_index)?;
        if self.version < MIN_VERSION || self.version > MAX_VERSION {
            return Err(ChunkError::UnsupportedVersion {
                chunk_index,
                major: self.major(),
                minor: self.minor(),
            });
        }
        if self.size < HEADER_SIZE as i64 {
            return Err(ChunkError::InvalidSize {
                chunk_index,
                size: self.size,
            });
        }
        let within_chunk = |offset: i64| offset > 0 && offset < self.size;
        if !within_chunk(self.offset_constant_pool) || !within_chunk(self.offset_meta) {
            return Err(ChunkError::InvalidOffsets {
                chunk_index,
                constant_pool: self.offset_constant_pool,
                metadata: self.offset_meta,
            });
        }
        Ok(())
    }
}

/// Like `read_exact`, but reports how many bytes were read instead of failing on a short read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]) {
            Ok(0) => break,
            Ok(n) => read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(read)
}
