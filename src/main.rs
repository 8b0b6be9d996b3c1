#[macro_use]
extern crate log;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};

use jfr_guardian::analyzer::{self, Config};
use jfr_guardian::chunk::disassembler::{assemble, disassemble};
use jfr_guardian::chunk::info::recording_information;
use jfr_guardian::chunk::open_recording;
use jfr_guardian::core::types::OutputFormat;
use jfr_guardian::guardian::{ResultType, DEFAULT_MIN_TOTAL_SAMPLES};
use jfr_guardian::tree::FramePath;

#[derive(Parser)]
#[command(
    name = "jfr-guardian",
    version,
    about = "Inspect flight recordings and check sampled stacks for performance anti-patterns"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the chunks of a recording (plain or .gz)
    Chunks {
        recording: PathBuf,
        /// Only read chunk headers, do not look at the declared event types
        #[arg(long)]
        headers_only: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Summarize one or more recordings (plain or .gz): time range, size and declared event types
    Info {
        #[arg(required = true)]
        recordings: Vec<PathBuf>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Split a recording into one file per chunk
    Disassemble {
        recording: PathBuf,
        /// Directory for the chunk_<n>.jfr files, created if missing
        #[arg(short, long, value_name = "DIR")]
        out_dir: PathBuf,
    },
    /// Concatenate chunk files into one recording
    Assemble {
        #[arg(required = true)]
        chunks: Vec<PathBuf>,
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Run the guards over the stack records of a record file
    Analyze {
        records: PathBuf,
        #[command(flatten)]
        tree: TreeArgs,
        /// Trees with fewer samples are not evaluated
        #[arg(long, default_value_t = DEFAULT_MIN_TOTAL_SAMPLES)]
        min_samples: i64,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Where to write the report, `-` for standard output
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        file: PathBuf,
        /// Number of frames in the summary printed to standard error, 0 to disable
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Write the stack records of a record file as folded stacks
    Collapse {
        records: PathBuf,
        #[command(flatten)]
        tree: TreeArgs,
        /// Count weight instead of samples
        #[arg(long)]
        weight: bool,
        /// Where to write the folded stacks, `-` for standard output
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        file: PathBuf,
    },
}

#[derive(clap::Args)]
struct TreeArgs {
    /// Add one frame per thread below the root
    #[arg(long)]
    threads: bool,
    /// Only use stacks starting with these frames, e.g. "Main#main;Server#serve"
    #[arg(long, value_name = "FRAMES")]
    restrict_to: Option<FramePath>,
}

fn analyzer_config(records: PathBuf, tree: TreeArgs, out_path: PathBuf) -> Config {
    let mut config = Config::new(records);
    config.thread_mode = tree.threads;
    config.restrict_to = tree.restrict_to;
    config.out_path = Some(out_path);
    config
}

fn list_chunks(recording: &Path, headers_only: bool, format: OutputFormat) -> Result<(), Error> {
    let chunks = open_recording(recording, !headers_only)
        .context(format!("Failed to open {}", recording.display()))?;

    let stdout = io::stdout();
    let mut w = stdout.lock();
    let mut listed = Vec::new();
    let mut failure = None;
    for chunk in chunks {
        match chunk {
            Ok(chunk) => {
                if format == OutputFormat::Text {
                    writeln!(
                        w,
                        "{:>5} {:>12} {} {:>10.3}s {:>12} {:>5} {}",
                        chunk.index,
                        chunk.position,
                        chunk.start_time.to_rfc3339(),
                        chunk.duration.as_secs_f64(),
                        chunk.size,
                        if chunk.final_chunk { "final" } else { "" },
                        chunk.event_types.len()
                    )?;
                }
                listed.push(chunk);
            }
            Err(e) => failure = Some(e),
        }
    }
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut w, &listed)?;
        writeln!(w)?;
    }
    match failure {
        Some(e) => Err(Error::from(e).context(format!(
            "{}: stopped after {} well-formed chunks",
            recording.display(),
            listed.len()
        ))),
        None => Ok(()),
    }
}

fn show_info(recordings: &[PathBuf], format: OutputFormat) -> Result<(), Error> {
    let info = recording_information(recordings);
    let stdout = io::stdout();
    let mut w = stdout.lock();
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut w, &info)?;
            writeln!(w)?;
        }
        OutputFormat::Text => {
            writeln!(w, "files:       {}", info.files.len())?;
            writeln!(w, "chunks:      {}", info.chunk_count)?;
            writeln!(w, "size:        {} bytes", info.size_in_bytes)?;
            if let (Some(start), Some(end)) = (info.start, info.end) {
                writeln!(w, "start:       {}", start.to_rfc3339())?;
                writeln!(w, "end:         {}", end.to_rfc3339())?;
                writeln!(w, "duration:    {:.3}s", info.duration().as_secs_f64())?;
            }
            writeln!(w, "event types: {}", info.event_types.len())?;
            for event_type in &info.event_types {
                writeln!(w, "  {}", event_type)?;
            }
            for path in &info.incomplete_files {
                writeln!(w, "incomplete:  {}", path.display())?;
            }
        }
    }
    Ok(())
}

fn do_main() -> Result<(), Error> {
    let args = Args::parse();
    match args.command {
        Command::Chunks {
            recording,
            headers_only,
            format,
        } => list_chunks(&recording, headers_only, format),
        Command::Info { recordings, format } => show_info(&recordings, format),
        Command::Disassemble { recording, out_dir } => {
            let files = disassemble(&recording, &out_dir)
                .context(format!("Failed to disassemble {}", recording.display()))?;
            info!("wrote {} chunk files to {}", files.len(), out_dir.display());
            for file in files {
                println!("{}", file.display());
            }
            Ok(())
        }
        Command::Assemble { chunks, output } => {
            let written = assemble(&chunks, &output)
                .context(format!("Failed to assemble {}", output.display()))?;
            println!("{} bytes written to {}", written, output.display());
            Ok(())
        }
        Command::Analyze {
            records,
            tree,
            min_samples,
            format,
            file,
            top,
        } => {
            let mut config = analyzer_config(records, tree, file);
            config.min_total_samples = min_samples;
            config.format = format;
            config.top_frames = top;
            let results = analyzer::analyze(&config)?;
            let warnings = results.iter().filter(|r| r.is_warning()).count();
            if warnings > 0 {
                warn!("{} of {} guards raised a warning", warnings, results.len());
            }
            Ok(())
        }
        Command::Collapse {
            records,
            tree,
            weight,
            file,
        } => {
            let config = analyzer_config(records, tree, file);
            let measure = if weight {
                ResultType::Weight
            } else {
                ResultType::Samples
            };
            analyzer::collapse(&config, measure)
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(err) = do_main() {
        eprintln!("Error: {}", err);
        for cause in err.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
