use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use metasheet_core::{CancellationToken, ProcessControl, ProcessOptions, SourceKind};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "metasheet",
    version,
    about = "Recurse a directory and collect image/video metadata into a spreadsheet"
)]
struct Cli {
    /// The directory to recurse
    directory: PathBuf,

    /// The output spreadsheet (CSV) file
    output_filename: PathBuf,

    /// Where metadata comes from
    #[arg(long, value_enum, default_value_t = SourceKind::Exiftool)]
    source: SourceKind,

    /// exiftool executable
    #[arg(long, env = "METASHEET_EXIFTOOL", default_value = "exiftool")]
    exiftool: PathBuf,

    /// Extra argument for exiftool, placed before the fixed flags (repeatable)
    #[arg(long = "exiftool-arg", value_name = "ARG", allow_hyphen_values = true)]
    exiftool_args: Vec<String>,

    /// Seconds to wait for exiftool on a single file
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Worker threads (0 = one per CPU)
    #[arg(short, long, default_value_t = 0)]
    jobs: usize,

    /// Do not draw a progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// Log lines go to stderr with the progress bar hidden, so they do not tear it.
#[derive(Clone)]
struct BarWriter(ProgressBar);

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarWriter {
    type Writer = BarWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{msg} [{elapsed_precise}] {wide_bar} {pos}/{len} files ({eta})",
    ) {
        bar.set_style(style);
    }
    bar.set_message("Extracting metadata");
    bar
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = Instant::now();

    let bar = progress_bar(cli.quiet);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metasheet=info")),
        )
        .with_writer(BarWriter(bar.clone()))
        .init();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || token.cancel()).context("failed to install Ctrl-C handler")?;
    }

    let options = ProcessOptions {
        root: cli.directory,
        output: cli.output_filename,
        source: cli.source,
        exiftool: cli.exiftool,
        exiftool_args: cli.exiftool_args,
        timeout_secs: cli.timeout,
        jobs: cli.jobs,
    };
    let control = ProcessControl::new().with_cancel_token(token);

    let result = metasheet_core::process_with_control(&options, &control, &|_stage, current, total, _message| {
        bar.set_length(total);
        bar.set_position(current);
    });
    bar.finish_and_clear();
    let result = result.with_context(|| format!("failed to catalog {}", options.root.display()))?;

    println!("Data exported to {}", options.output.display());
    eprintln!(
        "Done! {} files, {} without readable metadata ({:.2}s)",
        result.records.len(),
        result.extraction_failures,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
