use std::fmt;

use crate::tree::Frame;

/// A predicate over the canonical `type#method` name of a frame.
///
/// The synthetic root never matches, whatever the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FrameMatcher {
    Prefix(String),
    Suffix(String),
    Exact(String),
    /// Matches when at least one of the inner matchers does.
    Any(Vec<FrameMatcher>),
    /// Matches when every inner matcher does.
    All(Vec<FrameMatcher>),
}

impl FrameMatcher {
    pub fn prefix(s: &str) -> FrameMatcher {
        FrameMatcher::Prefix(s.to_string())
    }

    pub fn suffix(s: &str) -> FrameMatcher {
        FrameMatcher::Suffix(s.to_string())
    }

    pub fn exact(s: &str) -> FrameMatcher {
        FrameMatcher::Exact(s.to_string())
    }

    /// Shorthand for `Any` over a list of prefixes.
    pub fn any_prefix(prefixes: &[&str]) -> FrameMatcher {
        FrameMatcher::Any(prefixes.iter().map(|p| FrameMatcher::prefix(p)).collect())
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        if frame.is_root() {
            return false;
        }
        self.matches_name(&frame.canonical_name())
    }

    pub fn matches_name(&self, name: &str) -> bool {
        match self {
            FrameMatcher::Prefix(p) => name.starts_with(p.as_str()),
            FrameMatcher::Suffix(s) => name.ends_with(s.as_str()),
            FrameMatcher::Exact(e) => name == e,
            FrameMatcher::Any(matchers) => matchers.iter().any(|m| m.matches_name(name)),
            FrameMatcher::All(matchers) => matchers.iter().all(|m| m.matches_name(name)),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter, matchers: &[FrameMatcher], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, m) in matchers.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", m)?;
    }
    write!(f, ")")
}

impl fmt::Display for FrameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameMatcher::Prefix(p) => write!(f, "{}*", p),
            FrameMatcher::Suffix(s) => write!(f, "*{}", s),
            FrameMatcher::Exact(e) => write!(f, "{}", e),
            FrameMatcher::Any(matchers) => write_joined(f, matchers, " | "),
            FrameMatcher::All(matchers) => write_joined(f, matchers, " & "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stacks::{record, tree};

    #[test]
    fn simple_matchers() {
        let name = "java.io.ObjectOutputStream#writeObject";
        assert!(FrameMatcher::prefix("java.io.").matches_name(name));
        assert!(!FrameMatcher::prefix("java.util.").matches_name(name));
        assert!(FrameMatcher::suffix("#writeObject").matches_name(name));
        assert!(FrameMatcher::exact(name).matches_name(name));
        assert!(!FrameMatcher::exact("java.io.ObjectOutputStream").matches_name(name));
    }

    #[test]
    fn combinators() {
        let any = FrameMatcher::any_prefix(&["com.google.gson.", "org.json."]);
        assert!(any.matches_name("org.json.JSONObject#toString"));
        assert!(!any.matches_name("org.yaml.Yaml#load"));
        assert!(!FrameMatcher::Any(vec![]).matches_name("x"));

        let all = FrameMatcher::All(vec![
            FrameMatcher::prefix("java.lang."),
            FrameMatcher::suffix("Exception#<init>"),
        ]);
        assert!(all.matches_name("java.lang.IllegalStateException#<init>"));
        assert!(!all.matches_name("com.acme.BadException#<init>"));
        assert!(FrameMatcher::All(vec![]).matches_name("x"));
    }

    #[test]
    fn root_never_matches() {
        let root = tree(&[record(&["A#a"], 1)]);
        assert!(!FrameMatcher::prefix("").matches(&root));
        assert!(FrameMatcher::prefix("").matches(root.children().next().unwrap()));
    }

    #[test]
    fn display() {
        let m = FrameMatcher::Any(vec![
            FrameMatcher::prefix("a."),
            FrameMatcher::All(vec![FrameMatcher::suffix("#b"), FrameMatcher::exact("c#b")]),
        ]);
        assert_eq!(m.to_string(), "(a.* | (*#b & c#b))");
    }
}
