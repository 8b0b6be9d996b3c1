use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::types::{canonical_name, FrameKind, StackFrame};

/// Identity of a frame among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FrameKey {
    pub type_name: String,
    pub method_name: String,
    pub kind: FrameKind,
    pub line: u32,
    pub bci: i32,
}

impl FrameKey {
    pub fn thread(name: &str) -> FrameKey {
        FrameKey {
            type_name: String::new(),
            method_name: name.to_string(),
            kind: FrameKind::ThreadName,
            line: 0,
            bci: 0,
        }
    }

    pub fn canonical_name(&self) -> String {
        canonical_name(&self.type_name, &self.method_name)
    }
}

impl From<&StackFrame> for FrameKey {
    fn from(frame: &StackFrame) -> FrameKey {
        FrameKey {
            type_name: frame.type_name.clone(),
            method_name: frame.method_name.clone(),
            kind: frame.kind,
            line: frame.line,
            bci: frame.bci,
        }
    }
}

/// A node of the aggregated call tree.
///
/// For samples and weight alike, `total == sum(children.total) + self` holds at every node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Frame {
    /// `None` for the synthetic root.
    pub key: Option<FrameKey>,
    pub total_samples: i64,
    pub total_weight: i64,
    pub self_samples: i64,
    pub self_weight: i64,
    pub children: BTreeMap<FrameKey, Frame>,
}

impl Frame {
    pub fn root() -> Frame {
        Frame::default()
    }

    pub fn new(key: FrameKey) -> Frame {
        Frame {
            key: Some(key),
            ..Frame::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.key.is_none()
    }

    pub fn kind(&self) -> Option<FrameKind> {
        self.key.as_ref().map(|k| k.kind)
    }

    pub fn type_name(&self) -> &str {
        self.key.as_ref().map_or("", |k| k.type_name.as_str())
    }

    pub fn method_name(&self) -> &str {
        self.key.as_ref().map_or("", |k| k.method_name.as_str())
    }

    /// `type#method`, or the bare method name for frames without a type. Empty for the root.
    pub fn canonical_name(&self) -> String {
        canonical_name(self.type_name(), self.method_name())
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = &Frame> {
        self.children.values()
    }

    pub(crate) fn child_mut(&mut self, key: &FrameKey) -> &mut Frame {
        self.children
            .entry(key.clone())
            .or_insert_with(|| Frame::new(key.clone()))
    }

    pub(crate) fn add_total(&mut self, samples: i64, weight: i64) {
        // overflow panics in debug builds
        self.total_samples += samples;
        self.total_weight += weight;
    }

    pub(crate) fn add_self(&mut self, samples: i64, weight: i64) {
        self.self_samples += samples;
        self.self_weight += weight;
    }

    /// Follows `path` from this frame, matching children by canonical name.
    pub fn find(&self, path: &FramePath) -> Option<&Frame> {
        let mut current = self;
        for name in path.iter() {
            current = current.children().find(|c| c.canonical_name() == *name)?;
        }
        Some(current)
    }

    /// Adds every count of `other` into this tree, creating missing frames.
    pub fn merge(&mut self, other: &Frame) {
        let mut pending: Vec<(Vec<&FrameKey>, &Frame)> = vec![(Vec::new(), other)];
        while let Some((path, source)) = pending.pop() {
            let mut target = &mut *self;
            for key in &path {
                target = target.child_mut(key);
            }
            target.add_total(source.total_samples, source.total_weight);
            target.add_self(source.self_samples, source.self_weight);
            for (key, child) in &source.children {
                let mut child_path = path.clone();
                child_path.push(key);
                pending.push((child_path, child));
            }
        }
    }

    /// Depth of the deepest frame with at least `min_samples` total samples. The root alone has
    /// depth 0.
    pub fn max_depth(&self, min_samples: i64) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((frame, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            for child in frame.children() {
                if child.total_samples >= min_samples {
                    stack.push((child, depth + 1));
                }
            }
        }
        deepest
    }

    /// Number of frames in this subtree, this one included.
    pub fn frame_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(frame) = stack.pop() {
            count += 1;
            stack.extend(frame.children());
        }
        count
    }

    /// Checks the total/self invariant everywhere below and including this frame.
    pub fn is_consistent(&self) -> bool {
        let mut stack = vec![self];
        while let Some(frame) = stack.pop() {
            let samples: i64 = frame.children().map(|c| c.total_samples).sum();
            let weight: i64 = frame.children().map(|c| c.total_weight).sum();
            if frame.total_samples != samples + frame.self_samples
                || frame.total_weight != weight + frame.self_weight
            {
                return false;
            }
            stack.extend(frame.children());
        }
        true
    }
}

/// Canonical frame names leading from the root (exclusive) down to a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FramePath(Vec<String>);

impl FramePath {
    pub fn new(names: Vec<String>) -> FramePath {
        FramePath(names)
    }

    pub fn from_frames(frames: &[&Frame]) -> FramePath {
        FramePath(
            frames
                .iter()
                .filter(|f| !f.is_root())
                .map(|f| f.canonical_name())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<String> {
        self.0.iter()
    }

    /// Whether `frames` begin with this path.
    pub fn is_prefix_of(&self, frames: &[StackFrame]) -> bool {
        self.0.len() <= frames.len()
            && self
                .0
                .iter()
                .zip(frames)
                .all(|(name, frame)| *name == frame.canonical_name())
    }
}

impl fmt::Display for FramePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join(";"))
    }
}

/// Parses the folded form `a;b;c`.
impl FromStr for FramePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<FramePath, Self::Err> {
        Ok(FramePath(
            s.split(';')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}
