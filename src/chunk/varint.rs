//! Variable-length integers: 7 bits per byte, least significant group first, high bit set on
//! every byte that is followed by another one. A varlong spends all 8 bits of its ninth byte.

use super::ChunkError;

/// A read position over an in-memory section of a chunk.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, ChunkError> {
        match self.buf.get(self.pos) {
            Some(b) => {
                self.pos += 1;
                Ok(*b)
            }
            None => Err(ChunkError::UnexpectedEndOfBuffer { position: self.pos }),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ChunkError> {
        if self.remaining() < len {
            return Err(ChunkError::UnexpectedEndOfBuffer {
                position: self.buf.len(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads at most 5 bytes. Bits beyond the 32nd are dropped.
    pub fn read_varint(&mut self) -> Result<u32, ChunkError> {
        let mut value: u32 = 0;
        let mut shift = 0;
        while shift < 32 {
            let b = self.read_u8()?;
            value |= u32::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(value)
    }

    pub fn read_varlong(&mut self) -> Result<u64, ChunkError> {
        let mut value: u64 = 0;
        for i in 0..9 {
            let b = self.read_u8()?;
            if i == 8 {
                value |= u64::from(b) << 56;
                break;
            }
            value |= u64::from(b & 0x7f) << (7 * i);
            if b & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }
}

pub fn encode_varint(mut value: u32, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub fn encode_varlong(mut value: u64, out: &mut Vec<u8>) {
    for _ in 0..8 {
        if value < 0x80 {
            out.push(value as u8);
            return;
        }
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    // ninth byte carries the remaining 8 bits verbatim
    out.push(value as u8);
}
