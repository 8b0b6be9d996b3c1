//! Heuristic rules evaluated over a call tree.
//!
//! Each guard is a [`GuardConfig`] interpreted by the same traversal engine. [`Guardian`] runs a
//! set of guards over one tree and returns one [`GuardianResult`] per guard.
use std::collections::BTreeMap;
use std::thread;

use crate::tree::Frame;

pub mod catalog;
mod guard;
mod matcher;
mod preconditions;
mod result;
mod traversal;

pub use self::guard::{
    summary, GuardConfig, MatchingMode, Narrative, ResultType, Selection, TargetFrameKind,
};
pub use self::matcher::FrameMatcher;
pub use self::preconditions::{GuardPreconditions, Preconditions};
pub use self::result::{matched_percent, Category, GuardianResult, Severity};
pub use self::traversal::{evaluate, walk, GuardTraversal, Next, Traversable, TraversalState};

/// Trees with fewer samples than this are too small for meaningful ratios.
pub const DEFAULT_MIN_TOTAL_SAMPLES: i64 = 1000;

pub struct Guardian {
    guards: Vec<GuardConfig>,
    min_total_samples: i64,
}

impl Default for Guardian {
    fn default() -> Guardian {
        Guardian::new(catalog::all())
    }
}

impl Guardian {
    pub fn new(guards: Vec<GuardConfig>) -> Guardian {
        Guardian {
            guards,
            min_total_samples: DEFAULT_MIN_TOTAL_SAMPLES,
        }
    }

    pub fn min_total_samples(mut self, min_total_samples: i64) -> Guardian {
        self.min_total_samples = min_total_samples;
        self
    }

    pub fn guards(&self) -> &[GuardConfig] {
        &self.guards
    }

    /// Evaluates every guard over `tree`, one thread per guard. Results come back in the order
    /// of the guards.
    pub fn process(&self, tree: &Frame, preconditions: &Preconditions) -> Vec<GuardianResult> {
        info!(
            "running {} guards over {} samples",
            self.guards.len(),
            tree.total_samples
        );
        let min_total_samples = self.min_total_samples;
        thread::scope(|s| {
            let handles: Vec<_> = self
                .guards
                .iter()
                .map(|guard| {
                    s.spawn(move || evaluate(guard, tree, preconditions, min_total_samples))
                })
                .collect();
            handles
                .into_iter()
                .zip(&self.guards)
                .map(|(handle, guard)| {
                    handle.join().unwrap_or_else(|_| {
                        error!("guard {} panicked", guard.name);
                        traversal::not_applicable(guard, "the evaluation failed")
                    })
                })
                .collect()
        })
    }
}

/// Groups results by category, keeping their relative order inside each category.
pub fn group_by_category(results: &[GuardianResult]) -> BTreeMap<Category, Vec<&GuardianResult>> {
    let mut groups: BTreeMap<Category, Vec<&GuardianResult>> = BTreeMap::new();
    for result in results {
        groups.entry(result.category).or_default().push(result);
    }
    groups
}
