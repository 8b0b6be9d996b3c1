use anyhow::{Context, Error, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use terminal_size::Width;

use crate::core::types::{OutputFormat, ProfileHeader};
use crate::guardian::{
    Guardian, GuardianResult, Preconditions, ResultType, DEFAULT_MIN_TOTAL_SAMPLES,
};
use crate::storage;
use crate::tree::{BuilderConfig, Frame, FramePath, FrameTreeBuilder};
use crate::ui::{folded, report, summary};

/// A configuration bundle for the analyzer
pub struct Config {
    /// The record file to read stack records from.
    pub input: PathBuf,
    /// Whether to insert one frame per thread directly below the root. Default: `false`.
    pub thread_mode: bool,
    /// Only stacks starting with this path of `type#method` names are analyzed. Default: none.
    pub restrict_to: Option<FramePath>,
    /// Guards are not applicable to trees with fewer samples than this. Default: `1000`.
    pub min_total_samples: i64,
    /// The format of the guardian report.
    pub format: OutputFormat,
    /// Where to write the output. If `-` is given, output is written to standard output.
    pub out_path: Option<PathBuf>,
    /// Number of frames in the summary table written to standard error. `0` disables it.
    /// Default: `20`.
    pub top_frames: usize,
}

impl Config {
    pub fn new(input: PathBuf) -> Config {
        Config {
            input,
            thread_mode: false,
            restrict_to: None,
            min_total_samples: DEFAULT_MIN_TOTAL_SAMPLES,
            format: OutputFormat::Text,
            out_path: None,
            top_frames: 20,
        }
    }
}

/// Loads the record file named by `config` and folds its records into a tree.
pub fn load_tree(config: &Config) -> Result<(ProfileHeader, Frame), Error> {
    let data = storage::load(&config.input)
        .context(format!("Failed to load record file {}", config.input.display()))?;
    let mut builder = FrameTreeBuilder::new(BuilderConfig {
        thread_mode: config.thread_mode,
        restrict_to: config.restrict_to.clone(),
    });
    builder.add_all(&data.records);
    if builder.skipped_records() > 0 {
        info!(
            "{} of {} records do not start with {}",
            builder.skipped_records(),
            data.records.len(),
            config
                .restrict_to
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default()
        );
    }
    let tree = builder.into_tree();
    info!(
        "{} records, {} samples, {} frames",
        data.records.len(),
        tree.total_samples,
        tree.frame_count()
    );
    Ok((data.header, tree))
}

/// Runs the built-in guards over the tree of the record file and writes the report.
pub fn analyze(config: &Config) -> Result<Vec<GuardianResult>, Error> {
    let (header, tree) = load_tree(config)?;
    let preconditions = Preconditions::from_header(&header);
    let results = Guardian::default()
        .min_total_samples(config.min_total_samples)
        .process(&tree, &preconditions);

    if config.top_frames > 0 {
        let width = terminal_size::terminal_size().map(|(Width(w), _)| w as usize);
        let stderr = io::stderr();
        let mut w = stderr.lock();
        writeln!(w, "Summary of profiling data:")?;
        summary::Stats::from_tree(&tree).write_top_n(&mut w, config.top_frames, width)?;
    }
    if let Some(out_path) = &config.out_path {
        write_output(out_path, |w| report::write(&results, config.format, w))?;
    }
    Ok(results)
}

/// Writes the tree of the record file as folded stacks.
pub fn collapse(config: &Config, measure: ResultType) -> Result<(), Error> {
    let (_, tree) = load_tree(config)?;
    let out_path = config.out_path.as_deref().unwrap_or_else(|| Path::new("-"));
    write_output(out_path, |w| folded::write(&tree, measure, w))
}

fn write_output<F>(out_path: &Path, render: F) -> Result<(), Error>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    if out_path.display().to_string() == "-" {
        let stdout = io::stdout();
        let mut w = stdout.lock();
        render(&mut w)?;
        w.flush()?;
    } else {
        let out_file = File::create(out_path)
            .context(format!("Failed to create output file {}", out_path.display()))?;
        let mut w = BufWriter::new(out_file);
        render(&mut w)?;
        w.flush()?;
    }
    Ok(())
}
