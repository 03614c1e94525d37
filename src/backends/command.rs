//! Segmenter backed by an external program
//!
//! Each call spawns the program, writes the request JPEG-encoded at the
//! request's quality to its stdin and reads a JSON array of segments from its
//! stdout:
//!
//! ```json
//! [{"label": "person", "score": 0.98, "mask": [0.0, 0.5, 1.0, ...]}]
//! ```
//!
//! `mask` is row-major at the request size and may be `null`.

use crate::{
    error::{CutoutError, Result},
    inference::{ModelLoader, SegmentRequest, Segmenter},
    types::SegmentationOutput,
    utils::ImagePreprocessor,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct RawSegment {
    label: String,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    mask: Option<Vec<f32>>,
}

/// Runs an external segmentation program once per image
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: PathBuf,
    args: Vec<String>,
    name: String,
}

impl CommandSegmenter {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            program,
            args: Vec::new(),
            name,
        }
    }

    /// Extra arguments passed to the program on every call
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Parse the program's stdout for a request of `dimensions`
    ///
    /// # Errors
    /// - `SegmentationError(Malformed)` for invalid JSON or masks of the wrong size
    pub fn parse_response(stdout: &[u8], dimensions: (u32, u32)) -> Result<SegmentationOutput> {
        let raw: Vec<RawSegment> = serde_json::from_slice(stdout)
            .map_err(|e| CutoutError::malformed(format!("invalid segmenter JSON: {}", e)))?;

        let mut output = SegmentationOutput::new(dimensions.0, dimensions.1);
        for segment in raw {
            output.push_segment(
                segment.label,
                segment.score.unwrap_or(0.0),
                segment.mask.as_deref(),
            )?;
        }
        Ok(output)
    }
}

#[async_trait]
impl Segmenter for CommandSegmenter {
    #[instrument(skip(self, request), fields(program = %self.name, quality = request.jpeg_quality))]
    async fn segment(&self, request: SegmentRequest<'_>) -> Result<SegmentationOutput> {
        let encoded = ImagePreprocessor::encode_for_segmenter(request.image, request.jpeg_quality)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CutoutError::unavailable(format!(
                    "failed to start '{}': {}",
                    self.program.display(),
                    e
                ))
            })?;

        // Feed stdin concurrently so a chatty child cannot block on a full stdout pipe
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                let written = stdin.write_all(&encoded).await;
                drop(stdin);
                written
            })
        });

        let output = child.wait_with_output().await.map_err(|e| {
            CutoutError::unavailable(format!("failed to wait for '{}': {}", self.name, e))
        })?;

        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.await {
                debug!("Segmenter closed stdin early: {}", e);
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CutoutError::unavailable(format!(
                "'{}' exited with {}: {}",
                self.name,
                output.status,
                stderr.trim()
            )));
        }

        let parsed = Self::parse_response(&output.stdout, request.dimensions())?;
        debug!(segments = parsed.len(), "Parsed segmenter response");
        Ok(parsed)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Loader that checks the program exists before handing out a [`CommandSegmenter`]
#[derive(Debug, Clone)]
pub struct CommandLoader {
    segmenter: CommandSegmenter,
}

impl CommandLoader {
    #[must_use]
    pub fn new(segmenter: CommandSegmenter) -> Self {
        Self { segmenter }
    }
}

#[async_trait]
impl ModelLoader for CommandLoader {
    async fn load(&self) -> Result<Arc<dyn Segmenter>> {
        let program = &self.segmenter.program;
        // Bare names are resolved through PATH at spawn time
        if program.components().count() > 1 && !tokio::fs::try_exists(program).await? {
            return Err(CutoutError::unavailable(format!(
                "segmenter program '{}' not found",
                program.display()
            )));
        }
        Ok(Arc::new(self.segmenter.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentationFailure;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_parse_response() {
        let json = br#"[
            {"label": "person", "score": 0.98, "mask": [0.0, 0.5, 1.0, 0.25]},
            {"label": "background", "score": null, "mask": null}
        ]"#;
        let output = CommandSegmenter::parse_response(json, (2, 2)).unwrap();
        assert_eq!(output.labels(), vec!["person", "background"]);
        let segments: Vec<_> = output.segments().collect();
        assert_eq!(segments[0].mask.unwrap()[[1, 0]], 1.0);
        assert!(segments[1].mask.is_none());
        assert_eq!(segments[1].score, 0.0);
    }

    #[test]
    fn test_parse_response_rejects_bad_json_and_sizes() {
        let err = CommandSegmenter::parse_response(b"not json", (2, 2)).unwrap_err();
        assert!(matches!(
            err,
            CutoutError::Segmentation(SegmentationFailure::Malformed(_))
        ));

        let short = br#"[{"label": "person", "score": 1.0, "mask": [1.0, 1.0]}]"#;
        let err = CommandSegmenter::parse_response(short, (2, 2)).unwrap_err();
        assert!(matches!(
            err,
            CutoutError::Segmentation(SegmentationFailure::Malformed(_))
        ));
    }

    #[test]
    fn test_name_and_args() {
        let segmenter = CommandSegmenter::new("/opt/models/segment.py").with_args(["--fast"]);
        assert_eq!(segmenter.name(), "segment.py");
        assert_eq!(segmenter.args, vec!["--fast".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let segmenter = CommandSegmenter::new("/nonexistent/bgcutout-segmenter");
        let err = segmenter.segment(SegmentRequest::new(&RgbaImage::new(2, 2))).await.unwrap_err();
        assert!(matches!(
            err,
            CutoutError::Segmentation(SegmentationFailure::Unavailable(_))
        ));

        let loader = CommandLoader::new(segmenter);
        assert!(loader.load().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_segmenter_round_trip() {
        let script = r#"cat > /dev/null; echo '[{"label":"person","score":0.9,"mask":[1,1,0,0]}]'"#;
        let segmenter = CommandSegmenter::new("sh").with_args(["-c", script]);
        let output = segmenter.segment(SegmentRequest::new(&RgbaImage::new(2, 2))).await.unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output.dimensions(), (2, 2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_unavailable() {
        let segmenter = CommandSegmenter::new("sh").with_args(["-c", "echo boom >&2; exit 3"]);
        let err = segmenter.segment(SegmentRequest::new(&RgbaImage::new(2, 2))).await.unwrap_err();
        match err {
            CutoutError::Segmentation(SegmentationFailure::Unavailable(msg)) => {
                assert!(msg.contains("boom"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_request_quality_controls_encoding() {
        // Labels its only segment with the number of bytes read from stdin
        let script = r#"n=$(wc -c | tr -d ' '); echo "[{\"label\":\"bytes-$n\",\"mask\":null}]""#;
        let image = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 8) as u8, 255])
        });
        let segmenter = CommandSegmenter::new("sh").with_args(["-c", script]);

        let mut received = Vec::new();
        for quality in [10, 95] {
            let expected = ImagePreprocessor::encode_for_segmenter(&image, quality)
                .unwrap()
                .len();
            let output = segmenter
                .segment(SegmentRequest::new(&image).with_jpeg_quality(quality))
                .await
                .unwrap();
            assert_eq!(output.labels(), vec![format!("bytes-{expected}").as_str()]);
            received.push(expected);
        }
        assert!(received[0] < received[1]);
    }
}
