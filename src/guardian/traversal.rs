//! The short-circuiting walk that evaluates one guard over a call tree.
//!
//! [`walk`] drives any [`Traversable`] over the tree in depth-first pre-order, children in key
//! order. [`GuardTraversal`] is the traversable behind every guard: it looks for base frames,
//! collects the frames selected from them, and turns what it collected into a
//! [`GuardianResult`].
use crate::tree::{Frame, FramePath};

use super::guard::{GuardConfig, MatchingMode, ResultType, Selection};
use super::preconditions::Preconditions;
use super::result::{matched_percent, GuardianResult, Severity};

/// What the walk should do after visiting a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Continue,
    /// Do not descend into the frame just visited.
    SkipSubtree,
    /// Stop without a usable result.
    TerminateImmediately,
    /// Stop, the result is complete.
    Done,
}

pub trait Traversable<'a> {
    /// Visits `frame`. `ancestors` runs from the root down to the parent of `frame` and is
    /// empty for the root itself.
    fn traverse(&mut self, frame: &'a Frame, ancestors: &[&'a Frame]) -> Next;
}

/// Walks `root` until the traversable stops it or the tree is exhausted. Returns the `Next`
/// that stopped the walk, or `Continue` when every frame that was not skipped got visited.
pub fn walk<'a, T: Traversable<'a>>(root: &'a Frame, traversable: &mut T) -> Next {
    let mut stack = vec![(root, 0usize)];
    let mut ancestors: Vec<&'a Frame> = Vec::new();
    while let Some((frame, depth)) = stack.pop() {
        ancestors.truncate(depth);
        match traversable.traverse(frame, &ancestors) {
            Next::Continue => {
                ancestors.push(frame);
                // reversed so that the first child in key order is popped first
                stack.extend(frame.children().rev().map(|c| (c, depth + 1)));
            }
            Next::SkipSubtree => {}
            stop @ (Next::TerminateImmediately | Next::Done) => return stop,
        }
    }
    Next::Continue
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    SearchingBase,
    /// Selecting descendants of the base frame found at `base_depth`.
    Evaluating { base_depth: usize },
    Done,
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selected {
    path: FramePath,
    samples: i64,
    weight: i64,
}

pub struct GuardTraversal<'g> {
    config: &'g GuardConfig,
    min_total_samples: i64,
    state: TraversalState,
    totals: Option<(i64, i64)>,
    selected: Vec<Selected>,
}

impl<'g> GuardTraversal<'g> {
    pub fn new(config: &'g GuardConfig, min_total_samples: i64) -> GuardTraversal<'g> {
        GuardTraversal {
            config,
            min_total_samples,
            state: TraversalState::SearchingBase,
            totals: None,
            selected: Vec::new(),
        }
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Checks the guard's preconditions against the profile. A guard that does not apply never
    /// looks at the tree.
    pub fn initialize(&mut self, preconditions: &Preconditions) -> bool {
        if !self.config.preconditions.matches(preconditions) {
            self.state = TraversalState::NotApplicable;
        }
        self.state != TraversalState::NotApplicable
    }

    fn is_base(&self, frame: &Frame) -> bool {
        self.config.target.accepts(frame.kind()) && self.config.base.matches(frame)
    }

    fn select(&mut self, frame: &Frame, ancestors: &[&Frame]) {
        let mut names: Vec<&Frame> = ancestors.to_vec();
        names.push(frame);
        self.selected.push(Selected {
            path: FramePath::from_frames(&names),
            samples: frame.total_samples,
            weight: frame.total_weight,
        });
    }

    /// The base frame has been fully evaluated.
    fn base_completed(&mut self) -> Next {
        match self.config.matching {
            MatchingMode::SingleMatch => {
                self.state = TraversalState::Done;
                Next::Done
            }
            MatchingMode::FullMatch => {
                self.state = TraversalState::SearchingBase;
                Next::Continue
            }
        }
    }

    fn search_base(&mut self, frame: &Frame, ancestors: &[&Frame]) -> Next {
        if !self.is_base(frame) {
            return Next::Continue;
        }
        trace!("{}: base frame {}", self.config.name, frame.canonical_name());
        match &self.config.selection {
            Selection::CurrentFrame => {
                self.select(frame, ancestors);
                match self.base_completed() {
                    Next::Continue => Next::SkipSubtree,
                    next => next,
                }
            }
            Selection::Descendants(_) => {
                self.state = TraversalState::Evaluating {
                    base_depth: ancestors.len(),
                };
                Next::Continue
            }
        }
    }

    fn evaluate_descendant(&mut self, frame: &Frame, ancestors: &[&Frame]) -> Next {
        let wanted = match &self.config.selection {
            Selection::Descendants(matcher) => {
                self.config.target.accepts(frame.kind()) && matcher.matches(frame)
            }
            Selection::CurrentFrame => false,
        };
        if wanted {
            self.select(frame, ancestors);
            Next::SkipSubtree
        } else {
            Next::Continue
        }
    }

    /// Builds the verdict from what the walk collected.
    pub fn result(&self) -> GuardianResult {
        let (total_samples, total_weight) = match (self.state, self.totals) {
            (TraversalState::NotApplicable, _) | (_, None) => {
                return not_applicable(self.config, "the guard does not apply to this profile")
            }
            (_, Some(totals)) => totals,
        };
        let (total, observed) = match self.config.result_type {
            ResultType::Samples => (
                total_samples,
                self.selected.iter().map(|s| s.samples).sum::<i64>(),
            ),
            ResultType::Weight => (
                total_weight,
                self.selected.iter().map(|s| s.weight).sum::<i64>(),
            ),
        };
        let ratio = if total != 0 {
            observed as f64 / total as f64
        } else {
            0.0
        };
        let severity = if ratio > self.config.threshold {
            Severity::Warning
        } else {
            Severity::Ok
        };
        GuardianResult {
            name: self.config.name.clone(),
            category: self.config.category,
            severity,
            ratio,
            matched_percent: matched_percent(ratio),
            threshold: self.config.threshold,
            total_value: total,
            observed_value: observed,
            frames: self.selected.iter().map(|s| s.path.clone()).collect(),
            summary: self.config.summary(severity, total, observed, ratio),
            explanation: self.config.narrative.explanation.to_string(),
            solution: self.config.solution(severity),
        }
    }
}

impl<'a, 'g> Traversable<'a> for GuardTraversal<'g> {
    fn traverse(&mut self, frame: &'a Frame, ancestors: &[&'a Frame]) -> Next {
        if self.totals.is_none() {
            self.totals = Some((frame.total_samples, frame.total_weight));
            if frame.total_samples < self.min_total_samples {
                debug!(
                    "{}: {} samples, at least {} required",
                    self.config.name, frame.total_samples, self.min_total_samples
                );
                self.state = TraversalState::NotApplicable;
                return Next::TerminateImmediately;
            }
            if ancestors.is_empty() && frame.is_root() {
                return Next::Continue;
            }
        }
        match self.state {
            TraversalState::Done => Next::Done,
            TraversalState::NotApplicable => Next::TerminateImmediately,
            TraversalState::SearchingBase => self.search_base(frame, ancestors),
            TraversalState::Evaluating { base_depth } => {
                if ancestors.len() > base_depth {
                    self.evaluate_descendant(frame, ancestors)
                } else {
                    // the walk left the subtree of the base frame
                    match self.base_completed() {
                        Next::Done => Next::Done,
                        _ => self.search_base(frame, ancestors),
                    }
                }
            }
        }
    }
}

pub(crate) fn not_applicable(config: &GuardConfig, reason: &str) -> GuardianResult {
    GuardianResult {
        name: config.name.clone(),
        category: config.category,
        severity: Severity::NotApplicable,
        ratio: 0.0,
        matched_percent: matched_percent(0.0),
        threshold: config.threshold,
        total_value: 0,
        observed_value: 0,
        frames: Vec::new(),
        summary: format!("Not applicable: {}.", reason),
        explanation: config.narrative.explanation.to_string(),
        solution: None,
    }
}

/// Runs one guard over `tree`.
pub fn evaluate(
    config: &GuardConfig,
    tree: &Frame,
    preconditions: &Preconditions,
    min_total_samples: i64,
) -> GuardianResult {
    let mut traversal = GuardTraversal::new(config, min_total_samples);
    if !traversal.initialize(preconditions) {
        return not_applicable(config, "the profile does not meet the guard's preconditions");
    }
    if walk(tree, &mut traversal) == Next::TerminateImmediately {
        return not_applicable(
            config,
            &format!(
                "the profile has {} samples, at least {} are required",
                tree.total_samples, min_total_samples
            ),
        );
    }
    let result = traversal.result();
    debug!(
        "{}: {} ({} of {})",
        config.name, result.severity, result.observed_value, result.total_value
    );
    result
}
