pub const APP_NAME: &str = "frame-sentinel";

pub const DEBUG_LOG_FILE: &str = "debug.log";

// Artifact file names, resolved against the artifact directory
pub const ANOMALY_MODEL_FILE: &str = "isoforest_ucsd_ped1.json";
pub const REDUCER_FILE: &str = "pca_transformer.json";
pub const EMBEDDING_MODEL_FILE: &str = "resnet50_notop.onnx";

/// Square input edge of the embedding network.
pub const FRAME_SIZE: i32 = 224;

/// Caffe-style per-channel means (B, G, R) subtracted before inference.
pub const EMBEDDING_MEAN_BGR: [f64; 3] = [103.939, 116.779, 123.68];

/// Scores strictly below this percentile of a video's own distribution are anomalous.
pub const THRESHOLD_PERCENTILE: f64 = 5.0;

pub const DEFAULT_OUTPUT_ROOT: &str = "anomalies_output";
pub const DEFAULT_MEDIA_ROOT: &str = "media";
pub const UPLOAD_SUBDIR: &str = "uploads";
pub const MEDIA_URL: &str = "/media/";

pub const ALLOWED_CONTENT_TYPES: &[&str] = &["video", "image"];

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:8080";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
