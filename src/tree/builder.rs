use crate::core::types::StackRecord;

use super::frame::{Frame, FrameKey, FramePath};

pub const UNKNOWN_THREAD: &str = "unknown";

/// A configuration bundle for the tree builder
#[derive(Debug, Clone, Default)]
pub struct BuilderConfig {
    /// Insert one synthetic frame per thread directly under the root. Records without a thread
    /// name are grouped under `unknown`. Default: `false`.
    pub thread_mode: bool,
    /// Only accumulate records whose stack starts with this path of canonical frame names. The
    /// thread frame, if any, is not part of the comparison. Default: none (accept everything).
    pub restrict_to: Option<FramePath>,
}

/// Folds stack records into one call tree. Frames are shared along common stack prefixes.
pub struct FrameTreeBuilder {
    config: BuilderConfig,
    root: Frame,
    records: usize,
    skipped: usize,
}

impl FrameTreeBuilder {
    pub fn new(config: BuilderConfig) -> FrameTreeBuilder {
        FrameTreeBuilder {
            config,
            root: Frame::root(),
            records: 0,
            skipped: 0,
        }
    }

    /// Adds one record. Its samples and weight count towards every frame on its stack, and
    /// towards the self counters of the last one.
    pub fn add(&mut self, record: &StackRecord) {
        if let Some(path) = &self.config.restrict_to {
            if !path.is_prefix_of(&record.frames) {
                self.skipped += 1;
                return;
            }
        }
        debug_assert!(record.samples >= 0, "negative sample count");
        self.records += 1;

        let (samples, weight) = (record.samples, record.weight);
        let mut node = &mut self.root;
        node.add_total(samples, weight);
        if self.config.thread_mode {
            let thread = record.thread.as_deref().unwrap_or(UNKNOWN_THREAD);
            node = node.child_mut(&FrameKey::thread(thread));
            node.add_total(samples, weight);
        }
        for frame in record.iter() {
            node = node.child_mut(&FrameKey::from(frame));
            node.add_total(samples, weight);
        }
        node.add_self(samples, weight);
    }

    pub fn add_all<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a StackRecord>,
    {
        for record in records {
            self.add(record);
        }
    }

    /// Number of records accumulated so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Number of records rejected by the path restriction.
    pub fn skipped_records(&self) -> usize {
        self.skipped
    }

    /// Returns the tree accumulated so far. Totals are maintained while adding, so this is only a
    /// copy and can be called any number of times.
    pub fn build(&self) -> Frame {
        debug_assert!(self.root.is_consistent());
        self.root.clone()
    }

    pub fn into_tree(self) -> Frame {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FrameKind, StackFrame};
    use crate::test_utils::stacks::{record, tree};

    #[test]
    fn shares_common_prefixes() {
        let root = tree(&[
            record(&["Main#run", "A#a", "B#b"], 3),
            record(&["Main#run", "A#a"], 2),
            record(&["Main#run", "C#c"], 5),
        ]);
        assert_eq!(root.total_samples, 10);
        assert_eq!(root.self_samples, 0);
        assert_eq!(root.children.len(), 1);

        let main = root.children().next().unwrap();
        assert_eq!(main.canonical_name(), "Main#run");
        assert_eq!(main.total_samples, 10);
        assert_eq!(main.self_samples, 0);

        let a = root.find(&"Main#run;A#a".parse().unwrap()).unwrap();
        assert_eq!((a.total_samples, a.self_samples), (5, 2));
        assert_eq!((a.total_weight, a.self_weight), (50, 20));
        assert!(root.is_consistent());
    }

    #[test]
    fn empty_input_is_a_bare_root() {
        let root = tree(&[]);
        assert_eq!(root, Frame::root());
        assert_eq!(root.total_samples, 0);
        assert!(root.children.is_empty());
    }

    #[test]
    fn empty_stack_counts_at_the_root() {
        let root = tree(&[record(&[], 4), record(&["A#a"], 1)]);
        assert_eq!(root.total_samples, 5);
        assert_eq!(root.self_samples, 4);
        assert!(root.is_consistent());
    }

    #[test]
    fn root_total_is_the_sum_of_all_records() {
        let records: Vec<StackRecord> = (1..=20)
            .map(|i| {
                let middle = format!("T{}#m", i % 7);
                record(&["Main#run", middle.as_str(), "X#x"], i)
            })
            .collect();
        let root = tree(&records);
        assert_eq!(root.total_samples, (1..=20).sum::<i64>());
        assert!(root.is_consistent());
    }

    #[test]
    fn frames_differ_by_kind_and_line() {
        let mut jit = StackFrame::java("A", "a");
        let mut interpreted = jit.clone();
        interpreted.kind = FrameKind::Interpreted;
        let root = tree(&[
            StackRecord::new(vec![jit.clone()], 1, 0),
            StackRecord::new(vec![interpreted], 1, 0),
        ]);
        assert_eq!(root.children.len(), 2);

        jit.line = 7;
        let root = tree(&[
            StackRecord::new(vec![jit.clone()], 1, 0),
            StackRecord::new(vec![jit], 1, 0),
        ]);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children().next().unwrap().total_samples, 2);
    }

    #[test]
    fn thread_mode_adds_a_frame_per_thread() {
        let mut builder = FrameTreeBuilder::new(BuilderConfig {
            thread_mode: true,
            ..BuilderConfig::default()
        });
        builder.add(&record(&["Main#run"], 2).on_thread("main"));
        builder.add(&record(&["Worker#work"], 3).on_thread("pool-1"));
        builder.add(&record(&["Main#run"], 1));
        let root = builder.build();

        let threads: Vec<(String, i64)> = root
            .children()
            .map(|t| (t.canonical_name(), t.total_samples))
            .collect();
        assert_eq!(
            threads,
            vec![
                ("main".to_string(), 2),
                ("pool-1".to_string(), 3),
                ("unknown".to_string(), 1),
            ]
        );
        assert!(root
            .children()
            .all(|t| t.kind() == Some(FrameKind::ThreadName)));
        assert!(root.is_consistent());
    }

    #[test]
    fn restricted_builder_ignores_other_paths() {
        let mut builder = FrameTreeBuilder::new(BuilderConfig {
            restrict_to: Some("Main#run;A#a".parse().unwrap()),
            ..BuilderConfig::default()
        });
        builder.add_all(&[
            record(&["Main#run", "A#a", "B#b"], 3),
            record(&["Main#run", "C#c"], 5),
            record(&["Main#run"], 1),
            record(&["Main#run", "A#a"], 2),
        ]);
        assert_eq!(builder.records(), 2);
        assert_eq!(builder.skipped_records(), 2);

        let root = builder.build();
        assert_eq!(root.total_samples, 5);
        assert!(root.find(&"Main#run;C#c".parse().unwrap()).is_none());
        assert_eq!(
            root.find(&"Main#run;A#a;B#b".parse().unwrap())
                .unwrap()
                .total_samples,
            3
        );
    }

    #[test]
    fn build_is_repeatable() {
        let mut builder = FrameTreeBuilder::new(BuilderConfig::default());
        builder.add(&record(&["A#a", "B#b"], 2));
        let first = builder.build();
        assert_eq!(first, builder.build());

        builder.add(&record(&["A#a"], 1));
        let second = builder.build();
        assert_eq!(second.total_samples, 3);
        assert_eq!(first.total_samples, 2);
        assert_eq!(second, builder.into_tree());
    }
}
