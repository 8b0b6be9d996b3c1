// Data for use in tests :-)

/// Builders for synthetic recordings: metadata sections, chunks and whole files.
pub mod recording {
    use std::collections::HashMap;

    use crate::chunk::metadata::EVENT_SUPER_TYPE;
    use crate::chunk::varint::{encode_varint, encode_varlong};
    use crate::chunk::{ChunkHeader, HEADER_SIZE, MAGIC, MASK_FINAL_CHUNK};

    #[derive(Clone, Debug)]
    pub struct Node {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
    }

    impl Node {
        pub fn new(name: &str) -> Node {
            Node {
                name: name.to_string(),
                attributes: Vec::new(),
                children: Vec::new(),
            }
        }

        pub fn attr(mut self, key: &str, value: &str) -> Node {
            self.attributes.push((key.to_string(), value.to_string()));
            self
        }

        pub fn child(mut self, child: Node) -> Node {
            self.children.push(child);
            self
        }

        fn intern(&self, strings: &mut Strings) {
            strings.index(&self.name);
            for (k, v) in &self.attributes {
                strings.index(k);
                strings.index(v);
            }
            for child in &self.children {
                child.intern(strings);
            }
        }

        fn write(&self, strings: &mut Strings, out: &mut Vec<u8>) {
            encode_varint(strings.index(&self.name), out);
            encode_varint(self.attributes.len() as u32, out);
            for (k, v) in &self.attributes {
                encode_varint(strings.index(k), out);
                encode_varint(strings.index(v), out);
            }
            encode_varint(self.children.len() as u32, out);
            for child in &self.children {
                child.write(strings, out);
            }
        }
    }

    pub fn event_class(name: &str) -> Node {
        Node::new("class")
            .attr("name", name)
            .attr("superType", EVENT_SUPER_TYPE)
            .child(Node::new("field").attr("name", "startTime"))
    }

    #[derive(Default)]
    struct Strings {
        table: Vec<String>,
        index: HashMap<String, u32>,
    }

    impl Strings {
        fn index(&mut self, s: &str) -> u32 {
            if let Some(i) = self.index.get(s) {
                return *i;
            }
            let i = self.table.len() as u32;
            self.table.push(s.to_string());
            self.index.insert(s.to_string(), i);
            i
        }
    }

    #[derive(Clone, Debug)]
    pub struct MetadataBuilder {
        root_name: String,
        classes: Vec<Node>,
        regions: Vec<Node>,
        char_arrays: bool,
    }

    impl Default for MetadataBuilder {
        fn default() -> Self {
            MetadataBuilder::new()
        }
    }

    impl MetadataBuilder {
        pub fn new() -> MetadataBuilder {
            MetadataBuilder {
                root_name: "root".to_string(),
                classes: Vec::new(),
                regions: Vec::new(),
                char_arrays: false,
            }
        }

        pub fn root_name(mut self, name: &str) -> MetadataBuilder {
            self.root_name = name.to_string();
            self
        }

        pub fn class(mut self, class: Node) -> MetadataBuilder {
            self.classes.push(class);
            self
        }

        pub fn event(self, name: &str) -> MetadataBuilder {
            self.class(event_class(name))
        }

        pub fn region(mut self, region: Node) -> MetadataBuilder {
            self.regions.push(region);
            self
        }

        /// Encode strings as arrays of varint chars instead of UTF-8.
        pub fn char_array_strings(mut self) -> MetadataBuilder {
            self.char_arrays = true;
            self
        }

        pub fn build(&self) -> Vec<u8> {
            let root = Node {
                name: self.root_name.clone(),
                attributes: Vec::new(),
                children: std::iter::once(Node {
                    name: "metadata".to_string(),
                    attributes: Vec::new(),
                    children: self.classes.clone(),
                })
                .chain(self.regions.iter().cloned())
                .collect(),
            };
            let mut strings = Strings::default();
            root.intern(&mut strings);

            let mut body = Vec::new();
            encode_varint(self.classes.len() as u32, &mut body);
            encode_varlong(1_000, &mut body);
            encode_varlong(2_000, &mut body);
            encode_varlong(3_000, &mut body);
            encode_varint(strings.table.len() as u32, &mut body);
            for s in &strings.table {
                if s.is_empty() {
                    body.push(0);
                } else if self.char_arrays {
                    body.push(4);
                    encode_varint(s.chars().count() as u32, &mut body);
                    for c in s.chars() {
                        encode_varint(c as u32, &mut body);
                    }
                } else {
                    body.push(3);
                    encode_varint(s.len() as u32, &mut body);
                    body.extend_from_slice(s.as_bytes());
                }
            }
            root.write(&mut strings, &mut body);

            // the leading size counts itself
            let mut size = body.len() + 1;
            loop {
                let mut prefix = Vec::new();
                encode_varint(size as u32, &mut prefix);
                if prefix.len() + body.len() == size {
                    prefix.extend_from_slice(&body);
                    return prefix;
                }
                size = prefix.len() + body.len();
            }
        }
    }

    #[derive(Clone, Debug)]
    pub struct ChunkBuilder {
        version: u32,
        start_nanos: i64,
        duration_nanos: i64,
        final_chunk: bool,
        event_bytes: usize,
        metadata: MetadataBuilder,
    }

    impl Default for ChunkBuilder {
        fn default() -> Self {
            ChunkBuilder::new()
        }
    }

    const CONSTANT_POOL_BYTES: usize = 12;

    impl ChunkBuilder {
        pub fn new() -> ChunkBuilder {
            ChunkBuilder {
                version: 0x2_0001,
                start_nanos: 1_700_000_000_000_000_000,
                duration_nanos: 1_000_000_000,
                final_chunk: false,
                event_bytes: 100,
                metadata: MetadataBuilder::new().event("jdk.ExecutionSample"),
            }
        }

        pub fn start_nanos(mut self, nanos: i64) -> ChunkBuilder {
            self.start_nanos = nanos;
            self
        }

        pub fn duration_nanos(mut self, nanos: i64) -> ChunkBuilder {
            self.duration_nanos = nanos;
            self
        }

        pub fn final_chunk(mut self, final_chunk: bool) -> ChunkBuilder {
            self.final_chunk = final_chunk;
            self
        }

        /// Size of the opaque event area between the header and the constant pool.
        pub fn event_bytes(mut self, n: usize) -> ChunkBuilder {
            self.event_bytes = n;
            self
        }

        pub fn metadata(mut self, metadata: MetadataBuilder) -> ChunkBuilder {
            self.metadata = metadata;
            self
        }

        pub fn header(&self) -> ChunkHeader {
            let metadata_len = self.metadata.build().len();
            let offset_cp = HEADER_SIZE + self.event_bytes;
            let offset_meta = offset_cp + CONSTANT_POOL_BYTES;
            ChunkHeader {
                magic: MAGIC,
                version: self.version,
                size: (offset_meta + metadata_len) as i64,
                offset_constant_pool: offset_cp as i64,
                offset_meta: offset_meta as i64,
                start_nanos: self.start_nanos,
                duration_nanos: self.duration_nanos,
                start_ticks: 42,
                tick_frequency: 1_000_000_000,
                features: if self.final_chunk { MASK_FINAL_CHUNK } else { 0 },
            }
        }

        pub fn build(&self) -> Vec<u8> {
            let header = self.header();
            let mut out = header.to_bytes().to_vec();
            // recognisable filler so byte comparisons catch misplaced ranges
            out.extend((0..self.event_bytes).map(|i| (i % 251) as u8));
            out.extend(std::iter::repeat(0xcc).take(CONSTANT_POOL_BYTES));
            out.extend_from_slice(&self.metadata.build());
            assert_eq!(out.len() as i64, header.size);
            out
        }
    }

    /// A recording of `n` chunks; chunk `i` declares `jdk.ExecutionSample` and `test.Event<i>`,
    /// and only the last chunk carries the final flag.
    pub fn recording(n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..n {
            let chunk = ChunkBuilder::new()
                .start_nanos(1_700_000_000_000_000_000 + i as i64 * 1_000_000_000)
                .event_bytes(100 + i * 37)
                .final_chunk(i + 1 == n)
                .metadata(
                    MetadataBuilder::new()
                        .event("jdk.ExecutionSample")
                        .event(&format!("test.Event{}", i)),
                );
            out.extend(chunk.build());
        }
        out
    }
}

/// Builders for stack records and call trees.
pub mod stacks {
    use crate::core::types::{FrameKind, StackFrame, StackRecord};
    use crate::tree::{BuilderConfig, Frame, FrameTreeBuilder};

    /// `"pkg.Type#method"` becomes a JIT-compiled Java frame, anything without a `#` a C++ frame.
    pub fn frame(name: &str) -> StackFrame {
        match name.split_once('#') {
            Some((type_name, method)) => StackFrame::java(type_name, method),
            None => StackFrame::new("", name, FrameKind::Cpp),
        }
    }

    pub fn record(frames: &[&str], samples: i64) -> StackRecord {
        StackRecord::new(frames.iter().map(|f| frame(f)).collect(), samples, samples * 10)
    }

    pub fn tree(records: &[StackRecord]) -> Frame {
        let mut builder = FrameTreeBuilder::new(BuilderConfig::default());
        for r in records {
            builder.add(r);
        }
        builder.build()
    }
}
