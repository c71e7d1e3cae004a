use std::path::Path;
use std::sync::Arc;

use opencv::{
    core::{self, Mat, Size},
    imgproc,
    prelude::*,
};

use super::embedding::Embedder;
use crate::decoder::{FrameSource, VideoDecoder};
use crate::error::PipelineError;
use crate::shared::constants;

/// Per-frame features from one decode pass, in presentation order
#[derive(Debug, Default)]
pub struct ExtractedFeatures {
    pub features: Vec<Vec<f32>>,
    pub frame_indices: Vec<u64>,
    /// Decoding stopped on an error rather than a clean end of stream.
    pub truncated: bool,
}

impl ExtractedFeatures {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Grayscale, resize to the network input, then replicate to three channels.
///
/// Resizing uses OpenCV's default bilinear interpolation.
pub fn preprocess(frame: &Mat) -> opencv::Result<Mat> {
    let mut gray = Mat::default();
    match frame.channels() {
        1 => gray = frame.try_clone()?,
        3 => imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?,
        4 => imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGRA2GRAY)?,
        n => {
            return Err(opencv::Error::new(
                core::StsBadArg,
                format!("unsupported channel count: {n}"),
            ))
        }
    }

    let mut resized = Mat::default();
    imgproc::resize(
        &gray,
        &mut resized,
        Size::new(constants::FRAME_SIZE, constants::FRAME_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&resized, &mut rgb, imgproc::COLOR_GRAY2RGB)?;
    Ok(rgb)
}

pub struct FeatureExtractor {
    embedder: Arc<dyn Embedder>,
}

impl FeatureExtractor {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn extract_from_video(&self, video_path: &Path) -> Result<ExtractedFeatures, PipelineError> {
        let mut decoder = VideoDecoder::open(video_path);
        if !decoder.is_opened() {
            return Ok(ExtractedFeatures::default());
        }

        let extracted = self.extract(&mut decoder)?;
        tracing::debug!(
            video = %decoder.path().display(),
            fps = decoder.fps(),
            frames = decoder.frames_read(),
            truncated = extracted.truncated,
            "decode pass finished"
        );
        Ok(extracted)
    }

    pub fn extract<S: FrameSource>(&self, source: &mut S) -> Result<ExtractedFeatures, PipelineError> {
        let mut out = ExtractedFeatures::default();

        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        decoded = out.len(),
                        error = %e,
                        "decode failed mid-stream, keeping frames read so far"
                    );
                    out.truncated = true;
                    break;
                }
            };

            let index = frame.index;
            let input = preprocess(&frame.image)
                .map_err(|source| PipelineError::Preprocess { index, source })?;
            let vector = self
                .embedder
                .embed(&input)
                .map_err(|source| PipelineError::Inference { index, source })?;

            out.features.push(vector);
            out.frame_indices.push(index);
        }

        tracing::debug!(frames = out.len(), truncated = out.truncated, "feature extraction finished");
        Ok(out)
    }
}
