use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use opencv::{core::Vector, imgcodecs};

use crate::decoder::{FrameSource, VideoDecoder};
use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub saved: usize,
    pub output_dir: PathBuf,
    pub message: String,
}

impl ExportSummary {
    fn new(saved: usize, output_dir: &Path) -> Self {
        Self {
            saved,
            output_dir: output_dir.to_path_buf(),
            message: format!("Saved {} anomalous frames in '{}'.", saved, output_dir.display()),
        }
    }
}

pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index}.jpg")
}

/// Writes selected frames of a video as JPEG files named by frame index.
pub struct FrameExporter {
    output_dir: PathBuf,
}

impl FrameExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Re-decode `video_path` from the start and save every frame in `indices`.
    pub fn export_from_video(&self, video_path: &Path, indices: &[u64]) -> Result<ExportSummary, PipelineError> {
        let mut decoder = VideoDecoder::open(video_path);
        self.export(&mut decoder, indices)
    }

    pub fn export<S: FrameSource>(&self, source: &mut S, indices: &[u64]) -> Result<ExportSummary, PipelineError> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| PipelineError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let wanted: BTreeSet<u64> = indices.iter().copied().collect();
        let Some(&last) = wanted.last() else {
            return Ok(ExportSummary::new(0, &self.output_dir));
        };

        let mut saved = 0usize;
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "decode failed during export");
                    break;
                }
            };

            if wanted.contains(&frame.index) {
                let path = self.output_dir.join(frame_file_name(frame.index));
                write_jpeg(&path, &frame.image)?;
                saved += 1;
            }
            // nothing left to save past the last selected index
            if frame.index >= last {
                break;
            }
        }

        if saved < wanted.len() {
            tracing::warn!(
                requested = wanted.len(),
                saved,
                "export pass ended before every selected frame was seen"
            );
        }

        let summary = ExportSummary::new(saved, &self.output_dir);
        tracing::info!(saved, dir = %self.output_dir.display(), "anomalous frames exported");
        Ok(summary)
    }
}

fn write_jpeg(path: &Path, image: &opencv::core::Mat) -> Result<(), PipelineError> {
    match imgcodecs::imwrite(&path.to_string_lossy(), image, &Vector::<i32>::new()) {
        Ok(true) => Ok(()),
        Ok(false) => Err(PipelineError::Export {
            path: path.to_path_buf(),
            reason: "encoder rejected the frame".into(),
        }),
        Err(e) => Err(PipelineError::Export {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
