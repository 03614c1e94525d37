use bgcutout::{
    postprocess, AlphaCurve, Compositor, CutoutConfig, CutoutProcessor, EdgeSmoother, MaskFuser,
    ModelHandle, OutputFormat, SegmentationOutput,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tokio::runtime::Runtime;

const SIZES: [(u32, u32); 3] = [(256, 256), (1024, 512), (1024, 1024)];

fn photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8, 255])
    })
}

/// Soft radial "person" plus a hard "background" covering everything
fn segmentation(width: u32, height: u32) -> SegmentationOutput {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = cx.min(cy);
    let person: Vec<f32> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let d = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            (1.0 - d / radius).clamp(0.0, 1.0)
        })
        .collect();
    let hat: Vec<f32> = person.iter().map(|c| (c * 0.5).min(0.4)).collect();
    let background = vec![1.0; person.len()];

    SegmentationOutput::new(width, height)
        .with_segment("person", 0.98, Some(&person))
        .and_then(|s| s.with_segment("hat", 0.81, Some(&hat)))
        .and_then(|s| s.with_segment("background", 0.99, Some(&background)))
        .expect("synthetic masks match their dimensions")
}

fn bench_stages(c: &mut Criterion) {
    let curve = AlphaCurve::default();
    let mut group = c.benchmark_group("stages");

    for (width, height) in SIZES {
        let id = format!("{width}x{height}");
        let output = segmentation(width, height);
        let fused = MaskFuser::fuse(output.segments(), (width, height)).unwrap();
        let alpha = curve.apply(&fused);
        let smoothed = EdgeSmoother::smooth(&alpha);

        group.bench_with_input(BenchmarkId::new("fuse", &id), &output, |b, output| {
            b.iter(|| MaskFuser::fuse(black_box(output).segments(), (width, height)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("alpha_curve", &id), &fused, |b, fused| {
            b.iter(|| curve.apply(black_box(fused)));
        });
        group.bench_with_input(BenchmarkId::new("smooth", &id), &alpha, |b, alpha| {
            b.iter(|| EdgeSmoother::smooth(black_box(alpha)));
        });
        group.bench_with_input(BenchmarkId::new("composite", &id), &smoothed, |b, smoothed| {
            b.iter_batched(
                || photo(width, height),
                |image| Compositor::composite(image, black_box(smoothed)).unwrap(),
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_postprocess(c: &mut Criterion) {
    let curve = AlphaCurve::default();
    let mut group = c.benchmark_group("postprocess");
    group.sample_size(20);

    for (width, height) in SIZES {
        let output = segmentation(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &output,
            |b, output| {
                b.iter_batched(
                    || photo(width, height),
                    |image| postprocess(image, black_box(output), &curve).unwrap(),
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

/// Full processor run with an in-memory segmenter, encoding included
fn bench_processor(c: &mut Criterion) {
    struct Fixed(SegmentationOutput);

    #[async_trait::async_trait]
    impl bgcutout::Segmenter for Fixed {
        async fn segment(
            &self,
            _request: bgcutout::SegmentRequest<'_>,
        ) -> bgcutout::Result<SegmentationOutput> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("processor");
    group.sample_size(10);

    for format in [OutputFormat::Rgba8, OutputFormat::Png] {
        let config = CutoutConfig::builder()
            .output_format(format)
            .build()
            .unwrap();
        let model = ModelHandle::ready(Arc::new(Fixed(segmentation(1024, 512))));
        let processor = CutoutProcessor::new(config, model).unwrap();

        group.bench_function(BenchmarkId::new("2048x1024", format.to_string()), |b| {
            b.to_async(&rt).iter_batched(
                || photo(2048, 1024),
                |image| {
                    let processor = processor.clone();
                    async move { processor.process(image).await.unwrap() }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_stages, bench_postprocess, bench_processor);
criterion_main!(benches);
