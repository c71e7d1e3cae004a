use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AnomalyPipeline;

/// Shared state handed to every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Embedding network and fitted artifacts, loaded once at startup.
    pub pipeline: Arc<AnomalyPipeline>,
    pub config: Arc<AppConfig>,
}
