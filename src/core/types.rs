/// Core types used throughout jfr-guardian: StackFrame, StackRecord and the profile header
use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};

/// How a frame was executed when it was sampled.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrameKind {
    Interpreted,
    JitCompiled,
    C1Compiled,
    Inlined,
    Native,
    Cpp,
    Kernel,
    /// Synthetic frame inserted under the root in thread mode.
    ThreadName,
}

impl FrameKind {
    pub fn is_native(self) -> bool {
        matches!(self, FrameKind::Native | FrameKind::Cpp | FrameKind::Kernel)
    }

    pub fn is_java(self) -> bool {
        matches!(
            self,
            FrameKind::Interpreted
                | FrameKind::JitCompiled
                | FrameKind::C1Compiled
                | FrameKind::Inlined
        )
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FrameKind::Interpreted => "interpreted",
            FrameKind::JitCompiled => "jit",
            FrameKind::C1Compiled => "c1",
            FrameKind::Inlined => "inlined",
            FrameKind::Native => "native",
            FrameKind::Cpp => "cpp",
            FrameKind::Kernel => "kernel",
            FrameKind::ThreadName => "thread",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct StackFrame {
    /// Declaring class, empty for native, C++ and kernel frames.
    #[serde(default)]
    pub type_name: String,
    pub method_name: String,
    pub kind: FrameKind,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub bci: i32,
}

/// One aggregated sample: a root-first stack plus its sample count and weight.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct StackRecord {
    pub frames: Vec<StackFrame>,
    pub samples: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub thread: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum EventSource {
    Jdk,
    AsyncProfiler,
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum GarbageCollector {
    Serial,
    Parallel,
    G1,
    Shenandoah,
    Z,
    Epsilon,
}

/// Describes where the records of a record file came from.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ProfileHeader {
    pub event_source: EventSource,
    /// The sampled event type, e.g. `jdk.ExecutionSample`.
    pub event_type: String,
    #[serde(default)]
    pub debug_symbols: bool,
    #[serde(default)]
    pub kernel_symbols: bool,
    #[serde(default)]
    pub garbage_collector: Option<GarbageCollector>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// How reports are written.
#[derive(Debug, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl StackFrame {
    pub fn new(type_name: &str, method_name: &str, kind: FrameKind) -> StackFrame {
        StackFrame {
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
            kind,
            line: 0,
            bci: 0,
        }
    }

    pub fn java(type_name: &str, method_name: &str) -> StackFrame {
        StackFrame::new(type_name, method_name, FrameKind::JitCompiled)
    }

    pub fn native(symbol: &str) -> StackFrame {
        StackFrame::new("", symbol, FrameKind::Native)
    }

    /// `type#method` for Java frames, the bare symbol for frames without a declaring type.
    pub fn canonical_name(&self) -> String {
        canonical_name(&self.type_name, &self.method_name)
    }
}

pub(crate) fn canonical_name(type_name: &str, method_name: &str) -> String {
    if type_name.is_empty() {
        method_name.to_string()
    } else {
        format!("{}#{}", type_name, method_name)
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}", self.canonical_name(), self.line)
        } else {
            write!(f, "{}", self.canonical_name())
        }
    }
}

impl Ord for StackFrame {
    fn cmp(&self, other: &StackFrame) -> Ordering {
        self.type_name
            .cmp(&other.type_name)
            .then(self.method_name.cmp(&other.method_name))
            .then(self.kind.cmp(&other.kind))
            .then(self.line.cmp(&other.line))
            .then(self.bci.cmp(&other.bci))
    }
}

impl PartialOrd for StackFrame {
    fn partial_cmp(&self, other: &StackFrame) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl StackRecord {
    pub fn new(frames: Vec<StackFrame>, samples: i64, weight: i64) -> StackRecord {
        StackRecord {
            frames,
            samples,
            weight,
            thread: None,
        }
    }

    pub fn on_thread(mut self, thread: &str) -> StackRecord {
        self.thread = Some(thread.to_string());
        self
    }

    pub fn iter(&self) -> std::slice::Iter<StackFrame> {
        self.frames.iter()
    }
}
