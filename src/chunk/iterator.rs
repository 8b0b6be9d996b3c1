use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::header::read_full;
use super::metadata;
use super::{is_compressed, Chunk, ChunkError, ChunkHeader, HEADER_SIZE};

/// Walks the chunks of a seekable recording.
///
/// Iteration is lazy and stops at the first structural error: the error is yielded once and
/// every later call to `next` returns `None`.
pub struct ChunkIterator<R> {
    reader: R,
    len: u64,
    position: u64,
    index: usize,
    with_event_types: bool,
    done: bool,
}

impl ChunkIterator<File> {
    pub fn open(path: &Path) -> Result<ChunkIterator<File>, ChunkError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        debug!("opened recording {} ({} bytes)", path.display(), len);
        Ok(ChunkIterator::new(file, len))
    }
}

impl<R: Read + Seek> ChunkIterator<R> {
    pub fn new(reader: R, len: u64) -> ChunkIterator<R> {
        ChunkIterator {
            reader,
            len,
            position: 0,
            index: 0,
            with_event_types: true,
            done: false,
        }
    }

    /// Skip the metadata section; yielded chunks have no event types.
    pub fn headers_only(mut self) -> ChunkIterator<R> {
        self.with_event_types = false;
        self
    }

    /// Number of chunks yielded so far.
    pub fn chunks_read(&self) -> usize {
        self.index
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk>, ChunkError> {
        let chunk_index = self.index;
        if self.position + HEADER_SIZE as u64 > self.len {
            if self.position < self.len {
                debug!(
                    "ignoring {} trailing bytes after chunk {}",
                    self.len - self.position,
                    chunk_index
                );
            }
            return Ok(None);
        }

        self.reader.seek(SeekFrom::Start(self.position))?;
        let mut bytes = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut bytes)?;
        if read < HEADER_SIZE {
            return Err(ChunkError::IncompleteHeader { chunk_index, read });
        }
        let header = ChunkHeader::parse(&bytes);
        header.validate(chunk_index)?;

        let size = header.size as u64;
        let available = self.len - self.position;
        if size > available {
            return Err(ChunkError::Truncated {
                chunk_index,
                size,
                available,
            });
        }

        let event_types = if self.with_event_types {
            let offset_meta = header.offset_meta as u64;
            metadata::read_event_types(
                &mut self.reader,
                self.position + offset_meta,
                size - offset_meta,
            )
            .map_err(|e| e.in_metadata(chunk_index))?
        } else {
            BTreeSet::new()
        };

        let chunk = Chunk::new(chunk_index, self.position, &header, event_types);
        trace!(
            "chunk {} at {}: {} bytes, version {}.{}, {} event types",
            chunk_index,
            self.position,
            size,
            header.major(),
            header.minor(),
            chunk.event_types.len()
        );
        self.position += size;
        self.index += 1;
        Ok(Some(chunk))
    }
}

impl<R: Read + Seek> Iterator for ChunkIterator<R> {
    type Item = Result<Chunk, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                warn!("stopped after {} well-formed chunks: {}", self.index, e);
                Some(Err(e))
            }
        }
    }
}

impl<R: Read + Seek> std::iter::FusedIterator for ChunkIterator<R> {}

/// Walks the chunks of a recording that can only be read front to back, e.g. a decompression
/// stream. A clean end of stream at a chunk boundary ends the iteration.
pub struct StreamChunkIterator<R> {
    reader: R,
    index: usize,
    with_event_types: bool,
    done: bool,
}

impl<R: Read> StreamChunkIterator<R> {
    pub fn new(reader: R) -> StreamChunkIterator<R> {
        StreamChunkIterator {
            reader,
            index: 0,
            with_event_types: true,
            done: false,
        }
    }

    pub fn headers_only(mut self) -> StreamChunkIterator<R> {
        self.with_event_types = false;
        self
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk>, ChunkError> {
        let chunk_index = self.index;
        let header = match ChunkHeader::read_from(&mut self.reader, chunk_index)? {
            Some(header) => header,
            None => return Ok(None),
        };
        header.validate(chunk_index)?;

        let size = header.size as u64;
        let mut consumed = HEADER_SIZE as u64;
        let event_types = if self.with_event_types {
            let gap = metadata::bytes_before_metadata(&header);
            consumed += self.skip(gap, chunk_index)?;
            let (types, read) = metadata::stream_event_types(&mut self.reader, &header)
                .map_err(|e| e.in_metadata(chunk_index))?;
            consumed += read;
            types
        } else {
            BTreeSet::new()
        };
        if consumed < size {
            self.skip(size - consumed, chunk_index)?;
        }

        // stream positions are not tracked beyond the chunk index
        let chunk = Chunk::new(chunk_index, 0, &header, event_types);
        self.index += 1;
        Ok(Some(chunk))
    }

    fn skip(&mut self, n: u64, chunk_index: usize) -> Result<u64, ChunkError> {
        let skipped = io::copy(&mut (&mut self.reader).take(n), &mut io::sink())?;
        if skipped < n {
            return Err(ChunkError::Truncated {
                chunk_index,
                size: n,
                available: skipped,
            });
        }
        Ok(skipped)
    }
}

impl<R: Read> Iterator for StreamChunkIterator<R> {
    type Item = Result<Chunk, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                warn!("stream stopped after {} well-formed chunks: {}", self.index, e);
                Some(Err(e))
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for StreamChunkIterator<R> {}

/// Outcome of reading every chunk of one recording: the well-formed chunks, and the error that
/// stopped the iteration, if any.
#[derive(Debug)]
pub struct ChunkScan {
    pub path: PathBuf,
    pub chunks: Vec<Chunk>,
    pub error: Option<ChunkError>,
}

impl ChunkScan {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<Chunk>, ChunkError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.chunks),
        }
    }
}

pub fn scan(path: &Path) -> ChunkScan {
    scan_with(path, true)
}

pub fn scan_headers(path: &Path) -> ChunkScan {
    scan_with(path, false)
}

/// The chunks of the recording at `path`, read through a `StreamChunkIterator` over a gzip
/// decoder when the file is compressed and through a `ChunkIterator` otherwise.
pub fn open_recording(
    path: &Path,
    with_event_types: bool,
) -> Result<Box<dyn Iterator<Item = Result<Chunk, ChunkError>>>, ChunkError> {
    if is_compressed(path) {
        let file = File::open(path)?;
        debug!("reading compressed recording {}", path.display());
        let iter = StreamChunkIterator::new(GzDecoder::new(BufReader::new(file)));
        Ok(Box::new(if with_event_types {
            iter
        } else {
            iter.headers_only()
        }))
    } else {
        let iter = ChunkIterator::open(path)?;
        Ok(Box::new(if with_event_types {
            iter
        } else {
            iter.headers_only()
        }))
    }
}

fn scan_with(path: &Path, with_event_types: bool) -> ChunkScan {
    let mut scan = ChunkScan {
        path: path.to_path_buf(),
        chunks: Vec::new(),
        error: None,
    };
    let iter = match open_recording(path, with_event_types) {
        Ok(iter) => iter,
        Err(e) => {
            scan.error = Some(e);
            return scan;
        }
    };
    for result in iter {
        match result {
            Ok(chunk) => scan.chunks.push(chunk),
            Err(e) => scan.error = Some(e),
        }
    }
    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::recording::{recording, ChunkBuilder, MetadataBuilder, Node};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn iter(bytes: Vec<u8>) -> ChunkIterator<Cursor<Vec<u8>>> {
        let len = bytes.len() as u64;
        ChunkIterator::new(Cursor::new(bytes), len)
    }

    #[test]
    fn reads_every_chunk() {
        let bytes = recording(3);
        let total = bytes.len() as u64;
        let chunks: Vec<Chunk> = iter(bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.size).sum::<u64>(), total);
        assert_eq!(chunks[1].position, chunks[0].size);
        assert!(chunks[1].event_types.contains("test.Event1"));
        assert!(chunks[1].event_types.contains("jdk.ExecutionSample"));
        let finals: Vec<bool> = chunks.iter().map(|c| c.final_chunk).collect();
        assert_eq!(finals, vec![false, false, true]);
    }

    #[test]
    fn empty_file_has_no_chunks() {
        assert_eq!(iter(Vec::new()).count(), 0);
    }

    #[test]
    fn not_a_recording() {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.resize(200, 0);
        let results: Vec<_> = iter(bytes).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ChunkError::InvalidMagic { chunk_index: 0, .. })
        ));
    }

    #[test]
    fn stops_at_the_first_broken_chunk() {
        let mut bytes = recording(2);
        let mut header = ChunkBuilder::new().header();
        header.version = 0x1_0000;
        bytes.extend_from_slice(&header.to_bytes());
        bytes.resize(bytes.len() + 500, 0);
        bytes.extend(recording(1));

        let mut it = iter(bytes);
        assert!(it.next().unwrap().is_ok());
        assert!(it.next().unwrap().is_ok());
        assert!(matches!(
            it.next(),
            Some(Err(ChunkError::UnsupportedVersion { chunk_index: 2, .. }))
        ));
        assert!(it.next().is_none());
        assert_eq!(it.chunks_read(), 2);
    }

    #[test]
    fn trailing_bytes_shorter_than_a_header_are_ignored() {
        let mut bytes = recording(1);
        bytes.extend_from_slice(&[0u8; 30]);
        let chunks: Vec<_> = iter(bytes).collect::<Result<_, _>>().unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn chunk_larger_than_file_is_truncated() {
        let mut bytes = recording(1);
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            iter(bytes).next(),
            Some(Err(ChunkError::Truncated { chunk_index: 0, .. }))
        ));
    }

    #[test]
    fn headers_only_skips_metadata() {
        let chunk = ChunkBuilder::new()
            .metadata(MetadataBuilder::new().root_name("garbage"))
            .build();
        let chunks: Vec<_> = iter(chunk.clone())
            .headers_only()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].event_types.is_empty());

        assert!(matches!(
            iter(chunk).next(),
            Some(Err(ChunkError::Metadata { chunk_index: 0, .. }))
        ));
    }

    #[test]
    fn stream_iteration_matches_file_iteration() {
        let bytes = recording(4);
        let from_file: Vec<Chunk> = iter(bytes.clone()).collect::<Result<_, _>>().unwrap();
        let from_stream: Vec<Chunk> = StreamChunkIterator::new(&bytes[..])
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(from_stream.len(), 4);
        for (a, b) in from_file.iter().zip(&from_stream) {
            assert_eq!(a.event_types, b.event_types);
            assert_eq!(a.size, b.size);
            assert_eq!(a.start_time, b.start_time);
            assert_eq!(a.final_chunk, b.final_chunk);
        }
    }

    #[test]
    fn stream_chunk_without_event_types() {
        let chunk = ChunkBuilder::new()
            .event_bytes(0)
            .metadata(MetadataBuilder::new())
            .build();
        let chunks: Vec<_> = StreamChunkIterator::new(&chunk[..])
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].event_types.is_empty());
    }

    #[test]
    fn stream_partial_header_is_an_error() {
        let mut bytes = recording(1);
        bytes.extend_from_slice(b"FLR\0\0\x02");
        let results: Vec<_> = StreamChunkIterator::new(&bytes[..]).headers_only().collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[1],
            Err(ChunkError::IncompleteHeader {
                chunk_index: 1,
                read: 6
            })
        ));
    }

    #[test]
    fn stream_ending_inside_a_chunk_is_truncated() {
        let mut bytes = recording(1);
        bytes.truncate(bytes.len() - 5);
        let results: Vec<_> = StreamChunkIterator::new(&bytes[..]).headers_only().collect();
        assert!(matches!(
            results[0],
            Err(ChunkError::Truncated { chunk_index: 0, .. })
        ));
    }

    #[test]
    fn scan_reports_good_chunks_and_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jfr");
        let mut bytes = recording(2);
        let region = MetadataBuilder::new().region(Node::new("bogus"));
        bytes.extend(ChunkBuilder::new().metadata(region).build());
        File::create(&path).unwrap().write_all(&bytes).unwrap();

        let result = scan(&path);
        assert_eq!(result.chunks.len(), 2);
        assert!(!result.is_complete());
        assert!(matches!(
            result.error,
            Some(ChunkError::Metadata { chunk_index: 2, .. })
        ));

        let headers = scan_headers(&path);
        assert!(headers.is_complete());
        assert_eq!(headers.chunks.len(), 3);
    }

    #[test]
    fn scan_reads_compressed_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("recording.jfr");
        let compressed = dir.path().join("recording.jfr.gz");
        let bytes = recording(3);
        File::create(&plain).unwrap().write_all(&bytes).unwrap();
        let mut encoder = GzEncoder::new(File::create(&compressed).unwrap(), Compression::fast());
        encoder.write_all(&bytes).unwrap();
        encoder.finish().unwrap();

        let from_plain = scan(&plain).into_result().unwrap();
        let from_gzip = scan(&compressed).into_result().unwrap();
        assert_eq!(from_gzip.len(), 3);
        for (a, b) in from_plain.iter().zip(&from_gzip) {
            assert_eq!(a.event_types, b.event_types);
            assert_eq!(a.size, b.size);
        }
        assert!(scan_headers(&compressed).is_complete());
    }

    #[test]
    fn scan_of_missing_file() {
        let result = scan(Path::new("/nonexistent/recording.jfr"));
        assert!(result.chunks.is_empty());
        assert!(matches!(result.into_result(), Err(ChunkError::Io(_))));
    }
}
