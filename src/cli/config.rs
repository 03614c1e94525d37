//! Conversion of CLI arguments into library configuration

use crate::backends::CommandSegmenter;
use crate::cli::main_impl::Cli;
use crate::config::CutoutConfig;
use crate::services::OutputFormatHandler;
use anyhow::{Context, Result};
use std::time::Duration;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a validated `CutoutConfig` from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<CutoutConfig> {
        let timeout = (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs));

        CutoutConfig::builder()
            .max_dimension(cli.max_dimension)
            .output_format(cli.format.into())
            .segmentation_timeout(timeout)
            .segmenter_jpeg_quality(cli.segmenter_quality)
            .build()
            .context("Invalid cutout configuration")
    }

    /// The external segmenter described by the CLI arguments
    pub(crate) fn segmenter_from_cli(cli: &Cli) -> CommandSegmenter {
        CommandSegmenter::new(&cli.segmenter).with_args(cli.segmenter_args.iter().cloned())
    }

    /// Checks clap cannot express
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.jobs == 0 {
            anyhow::bail!("--jobs must be at least 1");
        }
        if !(1..=100).contains(&cli.segmenter_quality) {
            anyhow::bail!(
                "--segmenter-quality must be between 1 and 100, got {}",
                cli.segmenter_quality
            );
        }
        let format = cli.format.into();
        if !OutputFormatHandler::is_available(format) {
            anyhow::bail!("Output format '{}' is not enabled in this build", format);
        }
        Ok(())
    }
}
