//! Record files: the stack records of one profile, ready to be folded into a tree.
//!
//! A record file is gzip-compressed. The decompressed content starts with a magic line that
//! carries the format version, `b"stackXY\n"`, where `XY` is the version as a two-digit decimal
//! number. The magic line is followed by one JSON line holding the `ProfileHeader`, then one JSON
//! line per `StackRecord`.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::core::types::{ProfileHeader, StackRecord};

const MAGIC_TAG: &[u8; 5] = b"stack";
pub const CURRENT_VERSION: Version = Version(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(pub u32);

impl Version {
    fn magic_line(self) -> [u8; 8] {
        let mut line = [0u8; 8];
        line[..5].copy_from_slice(MAGIC_TAG);
        line[5] = b'0' + (self.0 / 10 % 10) as u8;
        line[6] = b'0' + (self.0 % 10) as u8;
        line[7] = b'\n';
        line
    }

    fn from_magic_line(line: &[u8; 8]) -> Option<Version> {
        if &line[..5] != MAGIC_TAG || line[7] != b'\n' {
            return None;
        }
        let digit = |b: u8| if b.is_ascii_digit() { Some((b - b'0') as u32) } else { None };
        Some(Version(digit(line[5])? * 10 + digit(line[6])?))
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Not a record file: unexpected magic {0:?}")]
    BadMagic(String),
    #[error("Unsupported record file version {0}")]
    UnsupportedVersion(u32),
    #[error("Record file has no header")]
    MissingHeader,
    #[error("Invalid JSON on line {line}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Writes a record file.
pub struct Store {
    encoder: GzEncoder<BufWriter<File>>,
    records: usize,
}

impl Store {
    pub fn new(out_path: &Path, header: &ProfileHeader) -> Result<Store, StorageError> {
        let file = File::create(out_path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        encoder.write_all(&CURRENT_VERSION.magic_line())?;
        let json = serde_json::to_string(header).map_err(|source| StorageError::Json {
            line: 2,
            source,
        })?;
        writeln!(encoder, "{}", json)?;
        Ok(Store {
            encoder,
            records: 0,
        })
    }

    pub fn write(&mut self, record: &StackRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string(record).map_err(|source| StorageError::Json {
            line: self.records + 3,
            source,
        })?;
        writeln!(self.encoder, "{}", json)?;
        self.records += 1;
        Ok(())
    }

    /// Finishes the gzip stream. Dropping a `Store` without completing it leaves a truncated
    /// file.
    pub fn complete(self) -> Result<(), StorageError> {
        let mut writer = self.encoder.finish()?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub header: ProfileHeader,
    pub records: Vec<StackRecord>,
}

pub fn load(path: &Path) -> Result<Data, StorageError> {
    let file = File::open(path)?;
    from_reader(GzDecoder::new(BufReader::new(file)))
}

/// Reads decompressed record file content.
pub fn from_reader<R: Read>(r: R) -> Result<Data, StorageError> {
    let mut reader = BufReader::new(r);
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    let version = Version::from_magic_line(&magic)
        .ok_or_else(|| StorageError::BadMagic(String::from_utf8_lossy(&magic).into_owned()))?;
    if version != CURRENT_VERSION {
        return Err(StorageError::UnsupportedVersion(version.0));
    }

    let mut lines = reader.lines().enumerate().map(|(i, line)| (i + 2, line));
    let header: ProfileHeader = match lines.next() {
        Some((line, text)) => {
            serde_json::from_str(&text?).map_err(|source| StorageError::Json { line, source })?
        }
        None => return Err(StorageError::MissingHeader),
    };
    let mut records = Vec::new();
    for (line, text) in lines {
        let text = text?;
        if text.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&text).map_err(|source| StorageError::Json { line, source })?;
        records.push(record);
    }
    debug!("loaded {} stack records", records.len());
    Ok(Data { header, records })
}
