use std::path::PathBuf;

/// Failures while loading the fitted artifacts at startup.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("{what} not found at: {}", path.display())]
    Missing { what: &'static str, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("failed to load embedding network {}: {source}", path.display())]
    Embedding {
        path: PathBuf,
        #[source]
        source: opencv::Error,
    },
}

/// Failures while running the detection pipeline on one video.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("frame {index}: preprocessing failed: {source}")]
    Preprocess {
        index: u64,
        #[source]
        source: opencv::Error,
    },

    #[error("frame {index}: embedding inference failed: {source}")]
    Inference {
        index: u64,
        #[source]
        source: opencv::Error,
    },

    #[error("feature dimension mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{count} frame scores are NaN; the anomaly model or features are corrupt")]
    NonFiniteScores { count: usize },

    #[error("failed to prepare output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {reason}", path.display())]
    Export { path: PathBuf, reason: String },
}
