use std::collections::{HashMap, HashSet};
use std::io;

use crate::core::types::FrameKind;
use crate::tree::Frame;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counts {
    self_: i64,
    total: i64,
}

/// Self and total sample counts per canonical frame name.
pub struct Stats {
    counts: HashMap<String, Counts>,
    total_samples: i64,
}

impl Stats {
    const HEADER: &'static str = "% self  % total  name";

    /// Aggregates `root` by frame name. A name that appears several times on one path, as in
    /// recursion, counts towards the total once. Thread frames are left out.
    pub fn from_tree(root: &Frame) -> Stats {
        let mut counts: HashMap<String, Counts> = HashMap::new();
        let mut stack: Vec<(&Frame, HashSet<String>)> = vec![(root, HashSet::new())];
        while let Some((frame, mut on_path)) = stack.pop() {
            if !frame.is_root() && frame.kind() != Some(FrameKind::ThreadName) {
                let name = frame.canonical_name();
                let entry = counts.entry(name.clone()).or_default();
                entry.self_ += frame.self_samples;
                if !on_path.contains(&name) {
                    entry.total += frame.total_samples;
                    on_path.insert(name);
                }
            }
            for child in frame.children() {
                stack.push((child, on_path.clone()));
            }
        }
        Stats {
            counts,
            total_samples: root.total_samples,
        }
    }

    pub fn total_samples(&self) -> i64 {
        self.total_samples
    }

    /// Rows sorted by self count, then total count, both descending, then by name.
    fn sorted(&self) -> Vec<(i64, i64, &str)> {
        let mut sorted: Vec<(i64, i64, &str)> = self
            .counts
            .iter()
            .map(|(name, c)| (c.self_, c.total, name.as_str()))
            .collect();
        sorted.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(b.2)));
        sorted
    }

    fn percent(&self, count: i64) -> f64 {
        if self.total_samples == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.total_samples as f64
        }
    }

    pub fn write(&self, w: &mut dyn io::Write) -> io::Result<()> {
        self.write_top_n(w, usize::MAX, None)
    }

    /// Writes the `n` frames with the most self samples. Names are cut to fit `width` columns
    /// when it is known.
    pub fn write_top_n(
        &self,
        w: &mut dyn io::Write,
        n: usize,
        width: Option<usize>,
    ) -> io::Result<()> {
        writeln!(w, "{}", Stats::HEADER)?;
        for (self_, total, name) in self.sorted().into_iter().take(n) {
            let line = format!(
                "{:>6.2} {:>8.2}  {}",
                self.percent(self_),
                self.percent(total),
                name
            );
            match width {
                Some(width) => writeln!(w, "{}", line.chars().take(width).collect::<String>())?,
                None => writeln!(w, "{}", line)?,
            }
        }
        Ok(())
    }
}
