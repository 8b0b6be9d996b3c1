//! Call-tree aggregation of sampled stacks.
mod builder;
mod frame;

pub use self::builder::{BuilderConfig, FrameTreeBuilder, UNKNOWN_THREAD};
pub use self::frame::{Frame, FrameKey, FramePath};
