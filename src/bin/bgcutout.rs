//! bgcutout CLI
//!
//! Command-line interface for cutting out image foregrounds with an external
//! segmentation program.

use bgcutout::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
