//! Utility modules for common operations

pub mod preprocessing;

pub use preprocessing::{ImagePreprocessor, Resized};
