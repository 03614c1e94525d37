//! bgcutout CLI
//!
//! Cuts out the foreground of image files using an external segmentation
//! program. All inputs share one lazily loaded model handle and run
//! concurrently up to `--jobs`.

use super::config::CliConfigBuilder;
use crate::{
    backends::CommandLoader,
    config::OutputFormat,
    inference::ModelHandle,
    processor::CutoutProcessor,
    services::{
        ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, OutputFormatHandler,
        ProgressReporter,
    },
    tracing_config::{init_cli_tracing, spans, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Cut the foreground out of photos as soft-edged RGBA images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgcutout")]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Segmentation program; receives a JPEG on stdin, prints JSON segments on stdout
    #[arg(short, long, value_name = "PROGRAM")]
    pub segmenter: PathBuf,

    /// Extra argument for the segmentation program (repeatable)
    #[arg(long = "segmenter-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub segmenter_args: Vec<String>,

    /// Output directory [default: next to each input as <name>_cutout.<ext>]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Largest side of the working image in pixels
    #[arg(long, default_value_t = crate::config::DEFAULT_MAX_DIMENSION)]
    pub max_dimension: u32,

    /// Segmentation timeout in seconds (0 disables the timeout)
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    /// JPEG quality of the request sent to the segmenter (1-100)
    #[arg(long, default_value_t = crate::config::DEFAULT_SEGMENTER_JPEG_QUALITY)]
    pub segmenter_quality: u8,

    /// Number of images processed concurrently
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Write processing metadata as JSON next to each output
    #[arg(long)]
    pub metadata: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
    Tiff,
    Rgba8,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Webp => OutputFormat::WebP,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => TracingFormat::Console,
            CliLogFormat::Compact => TracingFormat::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => TracingFormat::Json,
        }
    }
}

/// Outcome of one input file
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<PathBuf>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id =
        init_cli_tracing(cli.verbose, cli.log_format.into()).context("Failed to initialize tracing")?;
    run(&cli)
        .instrument(spans::session(&session_id, &cli.segmenter.display().to_string()))
        .await
}

/// Run the CLI with already parsed arguments
///
/// # Errors
/// - Invalid arguments or unusable inputs
/// - Any input that failed to process
pub async fn run(cli: &Cli) -> Result<()> {
    CliConfigBuilder::validate_cli(cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(cli).context("Failed to build configuration")?;
    let format = config.output_format;

    let files = collect_inputs(&cli.input, cli.recursive)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    let output_dir = match &cli.output {
        Some(dir) => Some(prepare_output_dir(dir)?),
        None => None,
    };

    let reporter: Arc<dyn ProgressReporter> = if cli.verbose > 0 {
        Arc::new(ConsoleProgressReporter::new(cli.verbose > 1))
    } else {
        Arc::new(NoOpProgressReporter)
    };
    let model = ModelHandle::lazy(CommandLoader::new(CliConfigBuilder::segmenter_from_cli(cli)));
    let processor = CutoutProcessor::new(config, model)?.with_progress_reporter(reporter);

    info!(
        files = files.len(),
        jobs = cli.jobs,
        format = %format,
        "Processing images"
    );
    let batch_start = Instant::now();
    let file_count = files.len();
    let outcomes = process_batch(
        &processor,
        files,
        output_dir.as_deref(),
        cli.jobs,
        cli.metadata,
    )
    .instrument(spans::batch_processing(file_count, cli.jobs))
    .await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(output) => info!(
                input = %outcome.input.display(),
                output = %output.display(),
                "Cutout written"
            ),
            Err(e) => error!(input = %outcome.input.display(), "Failed: {:#}", e),
        }
    }
    info!(
        succeeded = outcomes.len() - failed,
        failed,
        elapsed_ms = batch_start.elapsed().as_millis() as u64,
        "Batch finished"
    );

    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, outcomes.len());
    }
    Ok(())
}

/// Process `files` concurrently, at most `jobs` at a time
///
/// Outcomes are returned in input order.
pub async fn process_batch(
    processor: &CutoutProcessor,
    files: Vec<PathBuf>,
    output_dir: Option<&Path>,
    jobs: usize,
    write_metadata: bool,
) -> Vec<FileOutcome> {
    let mut outcomes: Vec<(usize, FileOutcome)> = stream::iter(files.into_iter().enumerate())
        .map(|(index, input)| async move {
            let result = process_file(processor, &input, output_dir, write_metadata)
                .instrument(spans::file_processing(&input))
                .await;
            (index, FileOutcome { input, result })
        })
        .buffer_unordered(jobs.max(1))
        .collect()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

async fn process_file(
    processor: &CutoutProcessor,
    input: &Path,
    output_dir: Option<&Path>,
    write_metadata: bool,
) -> Result<PathBuf> {
    let result = processor
        .process_file(input)
        .await
        .with_context(|| format!("Failed to process {}", input.display()))?;

    let output = output_path(input, output_dir, result.format);
    tokio::fs::write(&output, &result.data)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if write_metadata {
        let metadata_file = metadata_path(&output);
        let json = serde_json::to_vec_pretty(&result.metadata)?;
        tokio::fs::write(&metadata_file, json)
            .await
            .with_context(|| format!("Failed to write {}", metadata_file.display()))?;
    }
    Ok(output)
}

/// Expand files and directories into a sorted list of image files
///
/// # Errors
/// - An input that does not exist
/// - Directory traversal failures
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if ImageIOService::is_supported_image(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping unsupported file: {}", input.display());
            }
        } else if input.is_dir() {
            files.extend(find_image_files(input, recursive)?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                input.display()
            );
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Stem suffix of cutouts written next to their input
const CUTOUT_SUFFIX: &str = "_cutout";

/// Image files in `dir`, descending into subdirectories when `recursive`
///
/// Earlier cutouts (`*_cutout.*`) are skipped so a second run over the same
/// directory does not process its own output.
///
/// # Errors
/// - Directory traversal failures
pub fn find_image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if !entry.file_type().is_file() || !ImageIOService::is_supported_image(entry.path()) {
            continue;
        }
        if is_cutout_output(entry.path()) {
            debug!("Skipping previous cutout: {}", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

fn is_cutout_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy().ends_with(CUTOUT_SUFFIX))
}

/// Where the cutout for `input` is written
///
/// `<stem>.<ext>` inside `output_dir`, otherwise `<stem>_cutout.<ext>` next
/// to the input.
#[must_use]
pub fn output_path(input: &Path, output_dir: Option<&Path>, format: OutputFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let extension = OutputFormatHandler::extension(format);
    match output_dir {
        Some(dir) => dir.join(format!("{}.{}", stem, extension)),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}{}.{}", stem, CUTOUT_SUFFIX, extension)),
    }
}

/// JSON metadata path for an output image
#[must_use]
pub fn metadata_path(output: &Path) -> PathBuf {
    output.with_extension("json")
}

fn prepare_output_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            dir.display()
        );
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    Ok(dir.to_path_buf())
}
