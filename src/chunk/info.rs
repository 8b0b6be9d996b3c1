use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{scan, Chunk, ChunkError, ChunkScan};

/// What a set of recordings covers: time range, size and declared event types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RecordingInformation {
    pub files: Vec<PathBuf>,
    pub chunk_count: usize,
    pub size_in_bytes: u64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub event_types: BTreeSet<String>,
    /// Files whose iteration stopped at a structural error.
    pub incomplete_files: Vec<PathBuf>,
}

impl RecordingInformation {
    pub fn add_chunk(&mut self, chunk: &Chunk) {
        self.chunk_count += 1;
        self.size_in_bytes += chunk.size;
        let end = chunk.end_time();
        self.start = Some(self.start.map_or(chunk.start_time, |s| s.min(chunk.start_time)));
        self.end = Some(self.end.map_or(end, |e| e.max(end)));
        self.event_types.extend(chunk.event_types.iter().cloned());
    }

    pub fn add_scan(&mut self, scan: &ChunkScan) {
        self.files.push(scan.path.clone());
        for chunk in &scan.chunks {
            self.add_chunk(chunk);
        }
        if let Some(e) = &scan.error {
            warn!(
                "{}: kept {} well-formed chunks, then: {}",
                scan.path.display(),
                scan.chunks.len(),
                e
            );
            self.incomplete_files.push(scan.path.clone());
        }
    }

    pub fn duration(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::default(),
        }
    }
}

/// Scans every file on its own thread. Results come back in the order of `paths`.
pub fn scan_all(paths: &[PathBuf]) -> Vec<ChunkScan> {
    thread::scope(|s| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| s.spawn(move || scan(path)))
            .collect();
        handles
            .into_iter()
            .zip(paths)
            .map(|(handle, path)| joined_scan(path, handle.join()))
            .collect()
    })
}

/// A scan whose thread panicked counts as a file that could not be read.
fn joined_scan(path: &Path, joined: thread::Result<ChunkScan>) -> ChunkScan {
    joined.unwrap_or_else(|_| {
        error!("scanning {} panicked", path.display());
        ChunkScan {
            path: path.to_path_buf(),
            chunks: Vec::new(),
            error: Some(ChunkError::Io(io::Error::new(
                io::ErrorKind::Other,
                "scan panicked",
            ))),
        }
    })
}

/// Aggregates the well-formed chunks of all `paths`. Broken files contribute the chunks that
/// preceded the damage and are listed in `incomplete_files`.
pub fn recording_information(paths: &[PathBuf]) -> RecordingInformation {
    let mut info = RecordingInformation::default();
    for scan in scan_all(paths) {
        info.add_scan(&scan);
    }
    debug!(
        "{} files, {} chunks, {} event types",
        info.files.len(),
        info.chunk_count,
        info.event_types.len()
    );
    info
}
