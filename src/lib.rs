//! jfr-guardian reads flight recordings chunk by chunk, folds sampled stacks into call trees and
//! runs performance guards over them.
//!
//! The crate has two independent pipelines:
//!
//! - [`chunk`] walks the chunk container of a recording: headers, declared event types,
//!   splitting a recording into per-chunk files and putting it back together.
//! - [`tree`] and [`guardian`] fold stack records, read from a record file through [`storage`],
//!   into one call tree and evaluate the guard catalog over it.
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod analyzer;
pub mod chunk;
pub mod core;
pub mod guardian;
pub mod storage;
pub mod tree;
pub mod ui;

pub use crate::analyzer::{analyze, Config as AnalyzerConfig};
pub use crate::chunk::{Chunk, ChunkError, ChunkIterator};
pub use crate::core::types::{OutputFormat, ProfileHeader, StackFrame, StackRecord};
pub use crate::guardian::{Guardian, GuardianResult, Severity};
pub use crate::tree::{Frame, FrameTreeBuilder};

#[cfg(test)]
pub mod test_utils;
