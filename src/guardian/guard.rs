use crate::core::types::FrameKind;

use super::matcher::FrameMatcher;
use super::preconditions::GuardPreconditions;
use super::result::{Category, Severity};

/// What a guard counts once it has found a base frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Selection {
    /// The base frame itself. Its subtree is not visited.
    CurrentFrame,
    /// The top-most frames below the base frame that match.
    Descendants(FrameMatcher),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetFrameKind {
    Any,
    Java,
    Native,
}

impl TargetFrameKind {
    pub fn accepts(self, kind: Option<FrameKind>) -> bool {
        match (self, kind) {
            (TargetFrameKind::Any, _) => true,
            (TargetFrameKind::Java, Some(k)) => k.is_java(),
            (TargetFrameKind::Native, Some(k)) => k.is_native(),
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchingMode {
    /// Stop the walk after the first base frame has been evaluated.
    SingleMatch,
    /// Evaluate every base frame in the tree.
    FullMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultType {
    Samples,
    Weight,
}

impl ResultType {
    fn unit(self) -> &'static str {
        match self {
            ResultType::Samples => "samples",
            ResultType::Weight => "weight",
        }
    }
}

/// The fixed texts of a guard. The per-result summary is derived from the numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Narrative {
    /// Completes "samples belonging to ...", e.g. "Java serialization".
    pub subject: &'static str,
    pub explanation: &'static str,
    pub solution: &'static str,
}

/// A declarative guard: which frames to look for, what to count and when to warn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardConfig {
    pub name: String,
    pub category: Category,
    pub base: FrameMatcher,
    pub selection: Selection,
    pub target: TargetFrameKind,
    pub matching: MatchingMode,
    pub result_type: ResultType,
    /// Warn when the observed ratio is strictly greater than this.
    pub threshold: f64,
    pub preconditions: GuardPreconditions,
    pub narrative: Narrative,
}

impl GuardConfig {
    /// A guard counting the samples of every top-most frame matched by `base`, of any kind.
    pub fn new(
        name: &str,
        category: Category,
        base: FrameMatcher,
        threshold: f64,
        narrative: Narrative,
    ) -> GuardConfig {
        GuardConfig {
            name: name.to_string(),
            category,
            base,
            selection: Selection::CurrentFrame,
            target: TargetFrameKind::Any,
            matching: MatchingMode::FullMatch,
            result_type: ResultType::Samples,
            threshold,
            preconditions: GuardPreconditions::default(),
            narrative,
        }
    }

    pub fn selection(mut self, selection: Selection) -> GuardConfig {
        self.selection = selection;
        self
    }

    pub fn target(mut self, target: TargetFrameKind) -> GuardConfig {
        self.target = target;
        self
    }

    pub fn matching(mut self, matching: MatchingMode) -> GuardConfig {
        self.matching = matching;
        self
    }

    pub fn result_type(mut self, result_type: ResultType) -> GuardConfig {
        self.result_type = result_type;
        self
    }

    pub fn preconditions(mut self, preconditions: GuardPreconditions) -> GuardConfig {
        self.preconditions = preconditions;
        self
    }

    pub fn summary(&self, severity: Severity, total: i64, observed: i64, ratio: f64) -> String {
        summary(
            self.narrative.subject,
            self.result_type,
            severity,
            total,
            observed,
            ratio,
            self.threshold,
        )
    }

    pub fn solution(&self, severity: Severity) -> Option<String> {
        match severity {
            Severity::Warning => Some(self.narrative.solution.to_string()),
            _ => None,
        }
    }
}

pub fn summary(
    subject: &str,
    result_type: ResultType,
    severity: Severity,
    total: i64,
    observed: i64,
    ratio: f64,
    threshold: f64,
) -> String {
    let unit = result_type.unit();
    let relation = match severity {
        Severity::Warning => "higher",
        _ => "not higher",
    };
    format!(
        "The ratio between the total {} ({}) and the {} belonging to {} ({}) is {} than the threshold ({:.2} / {}).",
        unit, total, unit, subject, observed, relation, ratio, threshold
    )
}
