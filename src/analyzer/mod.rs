//! Per-frame analysis stages: embed, reduce, score, threshold.

pub mod embedding;
pub mod extractor;
pub mod reducer;
pub mod scorer;
pub mod threshold;

pub use embedding::{Embedder, OnnxEmbedder};
pub use extractor::FeatureExtractor;
pub use reducer::{PcaModel, Reducer};
pub use scorer::{IsolationForest, Scorer};
