//! Splits a recording into one file per chunk, and puts such files back together.
//!
//! Plain recordings are split with file-to-file range copies. Gzip-compressed recordings can only
//! be read front to back, so they go through a buffered stream copy instead. Both produce
//! byte-identical chunk files.
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;

use super::header::read_full;
use super::{is_compressed, ChunkHeader, HEADER_SIZE, MAGIC};

pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum DisassembleError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Chunk {chunk_index}: invalid magic {found:#010x}, this is not a flight recording")]
    InvalidMagic { chunk_index: usize, found: u32 },
    #[error("Chunk {chunk_index}: invalid chunk size {size}")]
    InvalidSize { chunk_index: usize, size: i64 },
    #[error("Chunk {chunk_index}: incomplete header, only {read} of 68 bytes available")]
    IncompleteHeader { chunk_index: usize, read: usize },
    #[error("Chunk {chunk_index}: stream ended with {remaining} bytes of the chunk still missing")]
    UnexpectedEof { chunk_index: usize, remaining: u64 },
    #[error("Chunk {chunk_index}: copied {copied} of {expected} bytes")]
    ShortCopy {
        chunk_index: usize,
        expected: u64,
        copied: u64,
    },
}

pub fn chunk_file_name(index: usize) -> String {
    format!("chunk_{}.jfr", index)
}

/// Writes every chunk of `recording` to `out_dir/chunk_<i>.jfr` and returns the files in chunk
/// order. `.gz` recordings are decompressed on the fly.
pub fn disassemble(recording: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, DisassembleError> {
    fs::create_dir_all(out_dir)?;
    if is_compressed(recording) {
        let file = File::open(recording)?;
        debug!("disassembling compressed recording {}", recording.display());
        disassemble_stream(GzDecoder::new(BufReader::new(file)), out_dir)
    } else {
        disassemble_file(recording, out_dir)
    }
}

/// Splits an uncompressed recording by copying `[chunk start, chunk start + size)` ranges.
pub fn disassemble_file(recording: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, DisassembleError> {
    fs::create_dir_all(out_dir)?;
    let file = File::open(recording)?;
    let len = file.metadata()?.len();

    let mut outputs = Vec::new();
    let mut position = 0u64;
    while position + HEADER_SIZE as u64 <= len {
        let chunk_index = outputs.len();
        let header = read_header_at(&file, position, chunk_index)?;
        let size = checked_size(&header, chunk_index)?;

        let path = out_dir.join(chunk_file_name(chunk_index));
        let mut out = File::create(&path)?;
        (&file).seek(SeekFrom::Start(position))?;
        // File to File through Take lets std use copy_file_range/sendfile where available
        let copied = io::copy(&mut (&file).take(size), &mut out)?;
        if copied != size {
            drop(out);
            discard(&path);
            return Err(DisassembleError::ShortCopy {
                chunk_index,
                expected: size,
                copied,
            });
        }
        debug!("chunk {}: {} bytes -> {}", chunk_index, size, path.display());
        outputs.push(path);
        position += size;
    }
    Ok(outputs)
}

/// Splits a recording that can only be read sequentially.
pub fn disassemble_stream<R: Read>(
    mut input: R,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, DisassembleError> {
    fs::create_dir_all(out_dir)?;
    let mut outputs = Vec::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let chunk_index = outputs.len();
        let mut bytes = [0u8; HEADER_SIZE];
        let header = match read_full(&mut input, &mut bytes)? {
            0 => break,
            HEADER_SIZE => ChunkHeader::parse(&bytes),
            read => return Err(DisassembleError::IncompleteHeader { chunk_index, read }),
        };
        let size = checked_size(&header, chunk_index)?;

        let path = out_dir.join(chunk_file_name(chunk_index));
        let mut out = File::create(&path)?;
        out.write_all(&bytes)?;

        let body = size - HEADER_SIZE as u64;
        if let Err(e) = copy_body(&mut input, &mut out, &mut buf, body, chunk_index) {
            drop(out);
            discard(&path);
            return Err(e);
        }
        debug!("chunk {}: {} bytes -> {}", chunk_index, size, path.display());
        outputs.push(path);
    }
    Ok(outputs)
}

fn copy_body<R: Read>(
    input: &mut R,
    out: &mut File,
    buf: &mut [u8],
    mut remaining: u64,
    chunk_index: usize,
) -> Result<(), DisassembleError> {
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match input.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(DisassembleError::UnexpectedEof {
                    chunk_index,
                    remaining,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        out.write_all(&buf[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Removes the partial file of a chunk that could not be copied completely.
fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("failed to remove partial chunk file {}: {}", path.display(), e);
    }
}

/// Concatenates chunk files into one recording. Returns the number of bytes written.
pub fn assemble(chunk_files: &[PathBuf], output: &Path) -> Result<u64, DisassembleError> {
    let mut out = File::create(output)?;
    let mut written = 0;
    for (chunk_index, path) in chunk_files.iter().enumerate() {
        let input = File::open(path)?;
        let header = read_header_at(&input, 0, chunk_index)?;
        let size = checked_size(&header, chunk_index)?;
        (&input).seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut (&input).take(size), &mut out)?;
        if copied != size {
            return Err(DisassembleError::ShortCopy {
                chunk_index,
                expected: size,
                copied,
            });
        }
        written += copied;
    }
    info!(
        "assembled {} chunks into {} ({} bytes)",
        chunk_files.len(),
        output.display(),
        written
    );
    Ok(written)
}

fn read_header_at(
    file: &File,
    position: u64,
    chunk_index: usize,
) -> Result<ChunkHeader, DisassembleError> {
    let mut reader = file;
    reader.seek(SeekFrom::Start(position))?;
    let mut bytes = [0u8; HEADER_SIZE];
    let read = read_full(&mut reader, &mut bytes)?;
    if read < HEADER_SIZE {
        return Err(DisassembleError::IncompleteHeader { chunk_index, read });
    }
    Ok(ChunkHeader::parse(&bytes))
}

/// Splitting only needs the magic and a usable size, the rest of the header is copied as is.
fn checked_size(header: &ChunkHeader, chunk_index: usize) -> Result<u64, DisassembleError> {
    if header.magic != MAGIC {
        return Err(DisassembleError::InvalidMagic {
            chunk_index,
            found: header.magic,
        });
    }
    if header.size < HEADER_SIZE as i64 {
        return Err(DisassembleError::InvalidSize {
            chunk_index,
            size: header.size,
        });
    }
    Ok(header.size as u64)
}
