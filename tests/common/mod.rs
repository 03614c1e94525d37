//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bgcutout::{ModelLoader, Result, SegmentRequest, SegmentationOutput, Segmenter};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Responder = dyn Fn(u32, u32) -> Result<SegmentationOutput> + Send + Sync;

/// Segmenter whose answer is computed from the request size
pub struct FnSegmenter {
    respond: Box<Responder>,
    delay: Duration,
    concurrent: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FnSegmenter {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(u32, u32) -> Result<SegmentationOutput> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            concurrent: true,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every label gets a mask filled with its confidence
    pub fn uniform(labels: &[(&'static str, f32)]) -> Self {
        let labels = labels.to_vec();
        Self::new(move |width, height| {
            let len = width as usize * height as usize;
            let mut output = SegmentationOutput::new(width, height);
            for (label, confidence) in &labels {
                output.push_segment(*label, 0.99, Some(&vec![*confidence; len]))?;
            }
            Ok(output)
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Segmenter for FnSegmenter {
    async fn segment(&self, request: SegmentRequest<'_>) -> Result<SegmentationOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (width, height) = request.dimensions();
        let result = (self.respond)(width, height);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "fn-segmenter"
    }

    fn supports_concurrent_inference(&self) -> bool {
        self.concurrent
    }
}

/// Loader that counts loads and hands out one shared segmenter
pub struct SharedLoader {
    segmenter: Arc<FnSegmenter>,
    delay: Duration,
    loads: Arc<AtomicUsize>,
}

impl SharedLoader {
    pub fn new(segmenter: Arc<FnSegmenter>, delay: Duration) -> (Self, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                segmenter,
                delay,
                loads: Arc::clone(&loads),
            },
            loads,
        )
    }
}

#[async_trait]
impl ModelLoader for SharedLoader {
    async fn load(&self) -> Result<Arc<dyn Segmenter>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.segmenter.clone())
    }
}

/// Deterministic gradient photo
pub fn photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8, 255])
    })
}

/// Decode an encoded cutout back into pixels
pub fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes)
        .expect("cutout should decode")
        .to_rgba8()
}
