//! Services that sit around the core pipeline
//!
//! - `format`: output container encoding
//! - `io`: decoding files, buffers and streams
//! - `progress`: stage reporting

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
