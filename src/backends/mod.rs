//! Segmenter implementations
//!
//! The model itself always lives outside this crate. Backends here only adapt
//! a concrete collaborator to the [`crate::inference::Segmenter`] trait.

pub mod command;

// Test utilities for segmenter testing
#[cfg(test)]
pub mod test_utils;

pub use self::command::{CommandLoader, CommandSegmenter};
