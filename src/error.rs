//! Error types for cutout operations

use std::time::Duration;
use thiserror::Error;

/// Result type alias for cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Reason a segmentation call did not produce a usable result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentationFailure {
    /// The collaborator answered with no segments at all
    #[error("segmenter returned no segments")]
    Empty,

    /// The collaborator answered with data that does not fit the request
    #[error("malformed segmentation result: {0}")]
    Malformed(String),

    /// The model could not be loaded or the collaborator could not be reached
    #[error("segmenter unavailable: {0}")]
    Unavailable(String),

    /// Model cold-start plus inference exceeded the configured budget
    #[error("segmentation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Error kinds produced by the cutout pipeline
///
/// Every variant is terminal for the image being processed. The pipeline never
/// retries; callers decide whether to run the whole pipeline again.
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Zero-sized, corrupt or otherwise unusable source raster
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The segmentation collaborator failed
    #[error("Segmentation error: {0}")]
    Segmentation(#[from] SegmentationFailure),

    /// Final image encoding failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Input/output errors on file and stream surfaces
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CutoutError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a malformed-result segmentation error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(SegmentationFailure::Malformed(msg.into()))
    }

    /// Create an unavailable-collaborator segmentation error
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(SegmentationFailure::Unavailable(msg.into()))
    }

    /// Whether this error came from the segmentation collaborator
    #[must_use]
    pub fn is_segmentation(&self) -> bool {
        matches!(self, Self::Segmentation(_))
    }

    /// Whether this error is a segmentation timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Segmentation(SegmentationFailure::TimedOut(_)))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }
}
