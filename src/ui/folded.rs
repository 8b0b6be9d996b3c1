use std::io;

use crate::guardian::ResultType;
use crate::tree::Frame;

/// Writes `root` as folded stacks, one `a;b;c <count>` line per frame with a non-zero self
/// count, in tree order. The output can be fed to flamegraph tools as is.
pub fn write(root: &Frame, measure: ResultType, w: &mut dyn io::Write) -> io::Result<()> {
    let value = |f: &Frame| match measure {
        ResultType::Samples => f.self_samples,
        ResultType::Weight => f.self_weight,
    };
    let mut stack: Vec<(&Frame, String)> = vec![(root, String::new())];
    while let Some((frame, prefix)) = stack.pop() {
        let path = if frame.is_root() {
            prefix
        } else if prefix.is_empty() {
            frame_label(frame)
        } else {
            format!("{};{}", prefix, frame_label(frame))
        };
        if !frame.is_root() && value(frame) > 0 {
            writeln!(w, "{} {}", path, value(frame))?;
        }
        for child in frame.children().rev() {
            stack.push((child, path.clone()));
        }
    }
    Ok(())
}

// ';' separates frames and the last space separates the count
fn frame_label(frame: &Frame) -> String {
    frame.canonical_name().replace(';', ":").replace(' ', "_")
}
