//! End-to-end detection for one video.
//!
//! Stages run strictly in sequence: extract → reduce → score → threshold →
//! export. The video is decoded twice, once for features and once for export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::artifacts::ModelArtifacts;
use super::exporter::FrameExporter;
use crate::analyzer::reducer::reduce;
use crate::analyzer::threshold::{percentile, select_below};
use crate::analyzer::{Embedder, FeatureExtractor};
use crate::error::PipelineError;
use crate::shared::constants;
use crate::utils::file_utils::request_output_dir;
use crate::utils::time_utils::Timer;

/// Outcome of one detection run, returned to the caller as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResult {
    pub total_frames: usize,
    /// Frame indices scoring strictly below `threshold`, ascending.
    pub anomalous_frames: Vec<u64>,
    /// One score per decoded frame, in frame order.
    pub anomaly_scores: Vec<f64>,
    /// `None` only when no frame could be decoded; NaN scores fail the run instead.
    pub threshold: Option<f64>,
    pub save_result: String,
    pub saved_frames: usize,
    pub output_dir: Option<PathBuf>,
    /// Decoding broke off with an error before the end of the stream.
    pub truncated: bool,
}

impl DetectionResult {
    fn empty(truncated: bool) -> Self {
        Self {
            total_frames: 0,
            anomalous_frames: Vec::new(),
            anomaly_scores: Vec::new(),
            threshold: None,
            save_result: "No frames decoded; nothing exported.".to_string(),
            saved_frames: 0,
            output_dir: None,
            truncated,
        }
    }
}

/// Scores and selection for one video, before export.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFrames {
    pub scores: Vec<f64>,
    pub threshold: Option<f64>,
    pub anomalous: Vec<u64>,
}

pub struct AnomalyPipeline {
    extractor: FeatureExtractor,
    artifacts: ModelArtifacts,
    output_root: PathBuf,
}

impl AnomalyPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, artifacts: ModelArtifacts, output_root: impl Into<PathBuf>) -> Self {
        Self {
            extractor: FeatureExtractor::new(embedder),
            artifacts,
            output_root: output_root.into(),
        }
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    /// Run detection, exporting into a fresh directory under the output root.
    pub fn detect_anomalies(&self, video_path: &Path) -> Result<DetectionResult, PipelineError> {
        let output_dir = request_output_dir(&self.output_root, video_path);
        self.detect_anomalies_into(video_path, &output_dir)
    }

    pub fn detect_anomalies_into(
        &self,
        video_path: &Path,
        output_dir: &Path,
    ) -> Result<DetectionResult, PipelineError> {
        let total = Timer::new();
        let mut stage = Timer::new();

        let extracted = self.extractor.extract_from_video(video_path)?;
        tracing::info!(
            video = %video_path.display(),
            frames = extracted.len(),
            elapsed_ms = stage.lap_ms(),
            "features extracted"
        );

        if extracted.is_empty() {
            tracing::warn!(video = %video_path.display(), "no frames decoded");
            return Ok(DetectionResult::empty(extracted.truncated));
        }

        let total_frames = extracted.len();
        let truncated = extracted.truncated;
        let scored = self.score_features(extracted.features, &extracted.frame_indices)?;
        tracing::info!(
            threshold = scored.threshold,
            anomalous = scored.anomalous.len(),
            elapsed_ms = stage.lap_ms(),
            "frames scored"
        );

        let summary = FrameExporter::new(output_dir).export_from_video(video_path, &scored.anomalous)?;
        tracing::info!(
            video = %video_path.display(),
            total_frames,
            anomalous = scored.anomalous.len(),
            export_ms = stage.lap_ms(),
            total_ms = total.elapsed_ms(),
            "detection finished"
        );

        Ok(DetectionResult {
            total_frames,
            anomalous_frames: scored.anomalous,
            anomaly_scores: scored.scores,
            threshold: scored.threshold,
            save_result: summary.message,
            saved_frames: summary.saved,
            output_dir: Some(summary.output_dir),
            truncated,
        })
    }

    /// Reduce (if a reducer is loaded), score, and select frames below the
    /// per-video percentile threshold.
    pub fn score_features(
        &self,
        features: Vec<Vec<f32>>,
        frame_indices: &[u64],
    ) -> Result<ScoredFrames, PipelineError> {
        let vectors = reduce(self.artifacts.reducer.as_deref(), features)?;
        let scores = self.artifacts.scorer.score_batch(&vectors)?;
        let nan_count = scores.iter().filter(|s| s.is_nan()).count();
        if nan_count > 0 {
            return Err(PipelineError::NonFiniteScores { count: nan_count });
        }

        let threshold = percentile(&scores, constants::THRESHOLD_PERCENTILE);
        let anomalous = match threshold {
            Some(t) => select_below(&scores, frame_indices, t),
            None => Vec::new(),
        };

        Ok(ScoredFrames {
            scores,
            threshold,
            anomalous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::embedding::testing::MeanEmbedder;
    use crate::analyzer::scorer::testing::stump_forest;
    use crate::analyzer::Scorer;
    use crate::core::artifacts::testing::identity_pca;
    use crate::decoder::video::testing::{scratch_dir, write_solid_video};
    use std::sync::Mutex;

    /// Records every vector it scores; the score is the negated first component.
    struct RecordingScorer {
        dims: usize,
        seen: Mutex<Vec<Vec<f32>>>,
    }

    impl RecordingScorer {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Scorer for RecordingScorer {
        fn n_features(&self) -> usize {
            self.dims
        }

        fn score(&self, input: &[f32]) -> f64 {
            self.seen.lock().unwrap().push(input.to_vec());
            -(input[0] as f64)
        }
    }

    // Nine bright frames and one dark one at index 6
    const CLIP: [u8; 10] = [180, 182, 184, 186, 188, 181, 20, 183, 185, 187];

    fn stump_pipeline(root: &Path) -> AnomalyPipeline {
        // dark frames (mean <= 100) fall into the single-sample leaf
        let forest = stump_forest(3, 0, 100.0, 0.0);
        let artifacts = ModelArtifacts::from_parts(Arc::new(forest), None);
        AnomalyPipeline::new(Arc::new(MeanEmbedder), artifacts, root)
    }

    #[test]
    fn test_distinct_frame_is_the_only_anomaly() {
        let tmp = scratch_dir("pipeline_e2e");
        let dir = tmp.path();
        let video = dir.join("clip.avi");
        write_solid_video(&video, &CLIP);

        let pipeline = stump_pipeline(&dir.join("out"));
        let result = pipeline.detect_anomalies(&video).unwrap();

        assert_eq!(result.total_frames, 10);
        assert_eq!(result.anomaly_scores.len(), 10);
        assert_eq!(result.anomalous_frames, vec![6]);
        assert_eq!(result.saved_frames, 1);
        assert!(!result.truncated);

        let out = result.output_dir.unwrap();
        assert!(out.starts_with(dir.join("out")));
        let files: Vec<_> = std::fs::read_dir(&out).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name().to_string_lossy(), "frame_6.jpg");
    }

    #[test]
    fn test_result_invariants_and_reproducible_threshold() {
        let tmp = scratch_dir("pipeline_invariants");
        let dir = tmp.path();
        let video = dir.join("clip.avi");
        write_solid_video(&video, &CLIP);

        let result = stump_pipeline(dir).detect_anomalies(&video).unwrap();
        let threshold = result.threshold.unwrap();

        assert_eq!(percentile(&result.anomaly_scores, 5.0), Some(threshold));
        for &index in &result.anomalous_frames {
            assert!((index as usize) < result.total_frames);
            assert!(result.anomaly_scores[index as usize] < threshold);
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let tmp = scratch_dir("pipeline_idempotent");
        let dir = tmp.path();
        let video = dir.join("clip.avi");
        write_solid_video(&video, &CLIP);

        let pipeline = stump_pipeline(dir);
        let first = pipeline.detect_anomalies_into(&video, &dir.join("run")).unwrap();
        let second = pipeline.detect_anomalies_into(&video, &dir.join("run")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_video_gives_empty_result() {
        let tmp = scratch_dir("pipeline_corrupt");
        let dir = tmp.path();
        let video = dir.join("broken.mp4");
        std::fs::write(&video, b"\x00\x00\x00\x18ftypmp42 truncated").unwrap();

        let result = stump_pipeline(&dir.join("out")).detect_anomalies(&video).unwrap();
        assert_eq!(result.total_frames, 0);
        assert!(result.anomalous_frames.is_empty());
        assert!(result.anomaly_scores.is_empty());
        assert_eq!(result.threshold, None);
        assert_eq!(result.saved_frames, 0);
        assert!(result.output_dir.is_none());
        assert!(!dir.join("out").exists());
    }

    #[test]
    fn test_scorer_gets_raw_features_without_reducer() {
        let scorer = Arc::new(RecordingScorer::new(4));
        let artifacts = ModelArtifacts::from_parts(scorer.clone(), None);
        let pipeline = AnomalyPipeline::new(Arc::new(MeanEmbedder), artifacts, "unused");

        let features = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0],
            vec![9.0, 10.0, 11.0, 12.0],
        ];
        pipeline.score_features(features.clone(), &[0, 1, 2]).unwrap();

        let seen = scorer.seen.lock().unwrap();
        assert_eq!(seen.len(), features.len());
        for v in &features {
            assert!(seen.contains(v));
        }
    }

    #[test]
    fn test_scorer_gets_reduced_features_with_reducer() {
        let scorer = Arc::new(RecordingScorer::new(2));
        let artifacts =
            ModelArtifacts::from_parts(scorer.clone(), Some(Arc::new(identity_pca(4, 2))));
        let pipeline = AnomalyPipeline::new(Arc::new(MeanEmbedder), artifacts, "unused");

        pipeline
            .score_features(vec![vec![1.0, 2.0, 3.0, 4.0]], &[0])
            .unwrap();
        assert_eq!(*scorer.seen.lock().unwrap(), vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn test_scores_keep_frame_order() {
        let scorer = Arc::new(RecordingScorer::new(1));
        let artifacts = ModelArtifacts::from_parts(scorer, None);
        let pipeline = AnomalyPipeline::new(Arc::new(MeanEmbedder), artifacts, "unused");

        let features: Vec<Vec<f32>> = (0..40).map(|i| vec![(i % 7) as f32]).collect();
        let indices: Vec<u64> = (0..40).collect();
        let scored = pipeline.score_features(features, &indices).unwrap();

        let expected: Vec<f64> = (0..40).map(|i| -((i % 7) as f64)).collect();
        assert_eq!(scored.scores, expected);
        let t = scored.threshold.unwrap();
        assert!(scored.anomalous.iter().all(|&i| scored.scores[i as usize] < t));
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let scorer = Arc::new(RecordingScorer::new(8));
        let artifacts = ModelArtifacts::from_parts(scorer, None);
        let pipeline = AnomalyPipeline::new(Arc::new(MeanEmbedder), artifacts, "unused");

        let err = pipeline.score_features(vec![vec![0.0; 3]], &[0]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch { expected: 8, actual: 3 }
        ));
    }

    #[test]
    fn test_nan_scores_fail_instead_of_null_threshold() {
        let scorer = Arc::new(RecordingScorer::new(1));
        let artifacts = ModelArtifacts::from_parts(scorer, None);
        let pipeline = AnomalyPipeline::new(Arc::new(MeanEmbedder), artifacts, "unused");

        let features = vec![vec![1.0], vec![f32::NAN], vec![3.0]];
        let err = pipeline.score_features(features, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, PipelineError::NonFiniteScores { count: 1 }));
    }
}
