//! CLI module for bgcutout
//!
//! This module is only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{
    collect_inputs, find_image_files, main, metadata_path, output_path, process_batch, run, Cli,
    CliLogFormat, CliOutputFormat, FileOutcome,
};
