//! Mock segmenters and loaders for unit tests
//!
//! These stand in for a real segmentation model so the pipeline can be
//! exercised without model files.

use crate::{
    error::{CutoutError, Result},
    inference::{ModelLoader, SegmentRequest, Segmenter},
    types::SegmentationOutput,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Behavior {
    /// One mask per label, each filled with a constant confidence
    Uniform(Vec<(String, f32)>),
    /// A valid response with no segments
    Empty,
    /// A response for a fixed size regardless of the request
    FixedSize(u32, u32),
    /// Always fail as unavailable
    Unavailable,
}

/// Mock segmentation model with configurable output
#[derive(Debug)]
pub struct MockSegmenter {
    behavior: Behavior,
    delay: Duration,
    concurrent: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    last_quality: AtomicU8,
}

impl MockSegmenter {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            concurrent: true,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            last_quality: AtomicU8::new(0),
        }
    }

    /// Single label with a constant-confidence mask
    #[must_use]
    pub fn uniform(label: &str, confidence: f32) -> Self {
        Self::with_behavior(Behavior::Uniform(vec![(label.to_string(), confidence)]))
    }

    /// Several labels, each with a constant-confidence mask
    #[must_use]
    pub fn labels(labels: &[(&str, f32)]) -> Self {
        Self::with_behavior(Behavior::Uniform(
            labels.iter().map(|(l, c)| ((*l).to_string(), *c)).collect(),
        ))
    }

    /// Responds with no segments
    #[must_use]
    pub fn empty() -> Self {
        Self::with_behavior(Behavior::Empty)
    }

    /// Responds with masks for `width x height` whatever the request size
    #[must_use]
    pub fn fixed_size(width: u32, height: u32) -> Self {
        Self::with_behavior(Behavior::FixedSize(width, height))
    }

    /// Always reports the model as unavailable
    #[must_use]
    pub fn unavailable() -> Self {
        Self::with_behavior(Behavior::Unavailable)
    }

    /// Sleep before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report that inference must not run concurrently
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    /// Highest number of overlapping `segment` calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of `segment` calls observed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// JPEG quality carried by the most recent request (0 before any call)
    pub fn last_quality(&self) -> u8 {
        self.last_quality.load(Ordering::SeqCst)
    }

    fn respond(&self, width: u32, height: u32) -> Result<SegmentationOutput> {
        let len = width as usize * height as usize;
        match &self.behavior {
            Behavior::Uniform(labels) => {
                let mut output = SegmentationOutput::new(width, height);
                for (label, confidence) in labels {
                    output.push_segment(label.as_str(), 0.99, Some(&vec![*confidence; len]))?;
                }
                Ok(output)
            },
            Behavior::Empty => Ok(SegmentationOutput::new(width, height)),
            Behavior::FixedSize(w, h) => {
                let fixed_len = *w as usize * *h as usize;
                SegmentationOutput::new(*w, *h).with_segment(
                    "person",
                    0.99,
                    Some(&vec![1.0; fixed_len]),
                )
            },
            Behavior::Unavailable => Err(CutoutError::unavailable("mock model offline")),
        }
    }
}

#[async_trait]
impl Segmenter for MockSegmenter {
    async fn segment(&self, request: SegmentRequest<'_>) -> Result<SegmentationOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_quality.store(request.jpeg_quality, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (width, height) = request.dimensions();
        let result = self.respond(width, height);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "mock-segmenter"
    }

    fn supports_concurrent_inference(&self) -> bool {
        self.concurrent
    }
}

/// Loader that counts how many times it was asked to load
pub struct CountingLoader {
    delay: Duration,
    loads: Arc<AtomicUsize>,
    fail_next: AtomicBool,
}

impl CountingLoader {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            loads: Arc::new(AtomicUsize::new(0)),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Fails the first load, succeeds afterwards
    #[must_use]
    pub fn failing_first(delay: Duration) -> Self {
        let loader = Self::new(delay);
        loader.fail_next.store(true, Ordering::SeqCst);
        loader
    }

    /// Shared load counter
    #[must_use]
    pub fn loads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

#[async_trait]
impl ModelLoader for CountingLoader {
    async fn load(&self) -> Result<Arc<dyn Segmenter>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CutoutError::invalid_config("mock weights missing"));
        }
        Ok(Arc::new(MockSegmenter::uniform("person", 0.9)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[tokio::test]
    async fn test_mock_uniform_output() {
        let mock = MockSegmenter::labels(&[("person", 0.8), ("background", 1.0)]);
        let image = RgbaImage::new(3, 2);
        let output = mock
            .segment(SegmentRequest::new(&image).with_jpeg_quality(40))
            .await
            .unwrap();
        assert_eq!(output.dimensions(), (3, 2));
        assert_eq!(output.labels(), vec!["person", "background"]);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.last_quality(), 40);
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let mock = MockSegmenter::unavailable();
        let image = RgbaImage::new(1, 1);
        assert!(mock.segment(SegmentRequest::new(&image)).await.is_err());
    }
}
