use std::fmt;

use crate::tree::FramePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Ok,
    Warning,
    NotApplicable,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::NotApplicable => "N/A",
        };
        f.pad(name)
    }
}

/// Results are grouped by category in reports, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Application,
    Libraries,
    Concurrency,
    JitCompilation,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Category::Application => "Application",
            Category::Libraries => "Frameworks and Libraries",
            Category::Concurrency => "Concurrency",
            Category::JitCompilation => "JIT Compilation",
        };
        f.pad(name)
    }
}

/// The verdict of one guard over one tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardianResult {
    pub name: String,
    pub category: Category,
    pub severity: Severity,
    /// Observed value divided by the total value, 0 when the total is 0.
    pub ratio: f64,
    /// `ratio` as a percentage with two significant digits, e.g. `"10%"`.
    pub matched_percent: String,
    pub threshold: f64,
    pub total_value: i64,
    pub observed_value: i64,
    /// Paths of the frames whose totals make up the observed value.
    pub frames: Vec<FramePath>,
    pub summary: String,
    pub explanation: String,
    /// Only present for warnings.
    pub solution: Option<String>,
}

impl GuardianResult {
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Formats `ratio * 100` rounded half-up to two significant digits, followed by `%`.
pub fn matched_percent(ratio: f64) -> String {
    let value = ratio * 100.0;
    if !value.is_finite() || value <= 0.0 {
        return "0%".to_string();
    }
    let mut decimals = 1 - value.log10().floor() as i32;
    let mut rounded = round_to(value, decimals);
    // 9.96 rounds to 10.0, which has one integer digit more
    if rounded >= 10f64.powi(2 - decimals) {
        decimals -= 1;
        rounded = round_to(value, decimals);
    }
    format!("{:.*}%", decimals.max(0) as usize, rounded)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    // f64::round rounds half away from zero, which is half-up for positive values
    if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    } else {
        let factor = 10f64.powi(-decimals);
        (value / factor).round() * factor
    }
}
