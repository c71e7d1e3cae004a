use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analyzer::{IsolationForest, PcaModel, Reducer, Scorer};
use crate::error::ArtifactError;
use crate::shared::constants;

/// Shape of a loaded anomaly model, for logs and `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct ScorerInfo {
    pub path: PathBuf,
    pub model_type: &'static str,
    pub n_estimators: usize,
    pub max_samples: u64,
    pub n_features: usize,
    pub offset: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReducerInfo {
    pub path: PathBuf,
    pub model_type: &'static str,
    pub input_dim: usize,
    pub output_dim: usize,
    pub whiten: bool,
}

/// Fitted models shared read-only by every request for the life of the process.
#[derive(Clone)]
pub struct ModelArtifacts {
    pub scorer: Arc<dyn Scorer>,
    pub reducer: Option<Arc<dyn Reducer>>,
    pub scorer_info: Option<ScorerInfo>,
    pub reducer_info: Option<ReducerInfo>,
}

impl ModelArtifacts {
    /// Load the required anomaly model and the optional reducer from `base_dir`.
    pub fn load(base_dir: &Path) -> Result<Self, ArtifactError> {
        let (forest, scorer_info) = load_anomaly_model(base_dir)?;
        let reducer = load_reducer(base_dir)?;

        let (reducer, reducer_info) = match reducer {
            Some((pca, info)) => {
                if pca.output_dim() != forest.n_features {
                    return Err(ArtifactError::Invalid {
                        path: info.path.clone(),
                        reason: format!(
                            "reducer outputs {} dimensions but the anomaly model expects {}",
                            pca.output_dim(),
                            forest.n_features
                        ),
                    });
                }
                (Some(Arc::new(pca) as Arc<dyn Reducer>), Some(info))
            }
            None => (None, None),
        };

        Ok(Self {
            scorer: Arc::new(forest),
            reducer,
            scorer_info: Some(scorer_info),
            reducer_info,
        })
    }

    /// Assemble from already-built capabilities.
    pub fn from_parts(scorer: Arc<dyn Scorer>, reducer: Option<Arc<dyn Reducer>>) -> Self {
        Self {
            scorer,
            reducer,
            scorer_info: None,
            reducer_info: None,
        }
    }

    pub fn has_reducer(&self) -> bool {
        self.reducer.is_some()
    }
}

pub fn load_anomaly_model(base_dir: &Path) -> Result<(IsolationForest, ScorerInfo), ArtifactError> {
    let path = base_dir.join(constants::ANOMALY_MODEL_FILE);
    if !path.is_file() {
        return Err(ArtifactError::Missing {
            what: "anomaly model",
            path,
        });
    }

    let forest: IsolationForest = read_json(&path)?;
    forest.validate().map_err(|reason| ArtifactError::Invalid {
        path: path.clone(),
        reason,
    })?;

    let info = ScorerInfo {
        path,
        model_type: "IsolationForest",
        n_estimators: forest.estimators.len(),
        max_samples: forest.max_samples,
        n_features: forest.n_features,
        offset: forest.offset,
    };
    tracing::info!(
        path = %info.path.display(),
        n_estimators = info.n_estimators,
        n_features = info.n_features,
        "anomaly model loaded"
    );
    Ok((forest, info))
}

/// Absence is not an error; a present but unreadable file is.
pub fn load_reducer(base_dir: &Path) -> Result<Option<(PcaModel, ReducerInfo)>, ArtifactError> {
    let path = base_dir.join(constants::REDUCER_FILE);
    if !path.exists() {
        tracing::info!(path = %path.display(), "no reducer artifact, scoring raw features");
        return Ok(None);
    }

    let pca: PcaModel = read_json(&path)?;
    pca.validate().map_err(|reason| ArtifactError::Invalid {
        path: path.clone(),
        reason,
    })?;

    let info = ReducerInfo {
        path,
        model_type: "PCA",
        input_dim: pca.input_dim(),
        output_dim: pca.output_dim(),
        whiten: pca.whiten,
    };
    tracing::info!(
        path = %info.path.display(),
        input_dim = info.input_dim,
        output_dim = info.output_dim,
        "reducer loaded"
    );
    Ok(Some((pca, info)))
}

/// Load status of one artifact, as reported by `inspect`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus<T> {
    Loaded { details: T },
    Absent { path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub artifact_dir: PathBuf,
    pub anomaly_model: ArtifactStatus<ScorerInfo>,
    pub reducer: ArtifactStatus<ReducerInfo>,
    /// Reducer output matches the anomaly model input, when both loaded.
    pub shapes_compatible: Option<bool>,
}

impl InspectReport {
    pub fn anomaly_model_ok(&self) -> bool {
        matches!(self.anomaly_model, ArtifactStatus::Loaded { .. })
    }
}

/// Try to load every artifact in `base_dir` without failing fast.
pub fn inspect(base_dir: &Path) -> InspectReport {
    let anomaly_model = match load_anomaly_model(base_dir) {
        Ok((_, info)) => ArtifactStatus::Loaded { details: info },
        Err(e) => ArtifactStatus::Failed { error: e.to_string() },
    };
    let reducer = match load_reducer(base_dir) {
        Ok(Some((_, info))) => ArtifactStatus::Loaded { details: info },
        Ok(None) => ArtifactStatus::Absent {
            path: base_dir.join(constants::REDUCER_FILE),
        },
        Err(e) => ArtifactStatus::Failed { error: e.to_string() },
    };

    let shapes_compatible = match (&anomaly_model, &reducer) {
        (ArtifactStatus::Loaded { details: m }, ArtifactStatus::Loaded { details: r }) => {
            Some(m.n_features == r.output_dim)
        }
        _ => None,
    };

    InspectReport {
        artifact_dir: base_dir.to_path_buf(),
        anomaly_model,
        reducer,
        shapes_compatible,
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
