use std::io;

use crate::core::types::OutputFormat;
use crate::guardian::{group_by_category, Category, GuardianResult, Severity};

#[derive(Serialize)]
struct CategoryReport<'a> {
    category: Category,
    results: Vec<&'a GuardianResult>,
}

/// Writes guardian results grouped by category.
pub fn write(
    results: &[GuardianResult],
    format: OutputFormat,
    w: &mut dyn io::Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => write_text(results, w),
        OutputFormat::Json => write_json(results, w),
    }
}

fn write_json(results: &[GuardianResult], w: &mut dyn io::Write) -> io::Result<()> {
    let report: Vec<CategoryReport> = group_by_category(results)
        .into_iter()
        .map(|(category, results)| CategoryReport { category, results })
        .collect();
    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)
}

fn write_text(results: &[GuardianResult], w: &mut dyn io::Write) -> io::Result<()> {
    let warnings = results.iter().filter(|r| r.is_warning()).count();
    writeln!(w, "{} guards, {} warnings", results.len(), warnings)?;
    for (category, results) in group_by_category(results) {
        writeln!(w)?;
        writeln!(w, "{}", category)?;
        for result in results {
            match result.severity {
                Severity::NotApplicable => {
                    writeln!(w, "  [{:<7}] {}", result.severity, result.name)?;
                }
                _ => {
                    writeln!(
                        w,
                        "  [{:<7}] {}: {} of {} ({}, threshold {})",
                        result.severity,
                        result.name,
                        result.observed_value,
                        result.total_value,
                        result.matched_percent,
                        result.threshold
                    )?;
                }
            }
            writeln!(w, "            {}", result.summary)?;
            if let Some(solution) = &result.solution {
                writeln!(w, "            Solution: {}", solution)?;
            }
            for path in &result.frames {
                writeln!(w, "            at {}", path)?;
            }
        }
    }
    Ok(())
}
