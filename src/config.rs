use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::shared::constants;

/// Service configuration loaded from environment variables.
///
/// Every field has a default suitable for local runs. CLI flags override
/// individual fields after loading.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Directory holding the fitted anomaly model and the optional reducer.
    pub artifact_dir: PathBuf,
    /// Explicit embedding network path; falls back to `artifact_dir`.
    pub embedding_model: Option<PathBuf>,
    /// Root for stored uploads, served under `/media`.
    pub media_root: PathBuf,
    /// Parent of the per-request export directories.
    pub output_root: PathBuf,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    /// HTTP request timeout in seconds; `0` disables it.
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from the process environment (after `.env`).
    ///
    /// | Env Var                | Default                                       |
    /// |------------------------|-----------------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                                     |
    /// | `PORT`                 | `8000`                                        |
    /// | `ARTIFACT_DIR`         | `.`                                           |
    /// | `EMBEDDING_MODEL`      | `{ARTIFACT_DIR}/resnet50_notop.onnx`          |
    /// | `MEDIA_ROOT`           | `media`                                       |
    /// | `OUTPUT_ROOT`          | `anomalies_output`                            |
    /// | `CORS_ORIGINS`         | `http://localhost:5173,http://localhost:8080` |
    /// | `MAX_UPLOAD_BYTES`     | `536870912`                                   |
    /// | `REQUEST_TIMEOUT_SECS` | `0`                                           |
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| constants::DEFAULT_HOST.into());
        let port = parse_or(&lookup, "PORT", constants::DEFAULT_PORT)?;

        let artifact_dir = lookup("ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let embedding_model = lookup("EMBEDDING_MODEL").map(PathBuf::from);

        let media_root = lookup("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_MEDIA_ROOT));
        let output_root = lookup("OUTPUT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_OUTPUT_ROOT));

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| constants::DEFAULT_CORS_ORIGINS.into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_bytes =
            parse_or(&lookup, "MAX_UPLOAD_BYTES", constants::DEFAULT_MAX_UPLOAD_BYTES)?;
        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 0u64)?;

        Ok(Self {
            host,
            port,
            artifact_dir,
            embedding_model,
            media_root,
            output_root,
            cors_origins,
            max_upload_bytes,
            request_timeout_secs,
        })
    }

    pub fn embedding_model_path(&self) -> PathBuf {
        self.embedding_model
            .clone()
            .unwrap_or_else(|| self.artifact_dir.join(constants::EMBEDDING_MODEL_FILE))
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.media_root.join(constants::UPLOAD_SUBDIR)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.output_root, PathBuf::from("anomalies_output"));
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.request_timeout_secs, 0);
        assert_eq!(
            config.embedding_model_path(),
            PathBuf::from(".").join("resnet50_notop.onnx")
        );
        assert_eq!(config.upload_dir(), PathBuf::from("media").join("uploads"));
    }

    #[test]
    fn test_embedding_model_follows_artifact_dir() {
        let config = AppConfig::from_lookup(lookup_from(&[("ARTIFACT_DIR", "/srv/models")])).unwrap();
        assert_eq!(
            config.embedding_model_path(),
            PathBuf::from("/srv/models/resnet50_notop.onnx")
        );

        let config = AppConfig::from_lookup(lookup_from(&[
            ("ARTIFACT_DIR", "/srv/models"),
            ("EMBEDDING_MODEL", "/opt/net.onnx"),
        ]))
        .unwrap();
        assert_eq!(config.embedding_model_path(), PathBuf::from("/opt/net.onnx"));
    }

    #[test]
    fn test_cors_origins_are_trimmed() {
        let config = AppConfig::from_lookup(lookup_from(&[(
            "CORS_ORIGINS",
            " http://a.test , ,http://b.test",
        )]))
        .unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
