pub mod artifacts;
pub mod exporter;
pub mod pipeline;

pub use artifacts::ModelArtifacts;
pub use pipeline::{AnomalyPipeline, DetectionResult};
