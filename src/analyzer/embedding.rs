use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use opencv::{
    core::{self, Mat, Scalar, Size},
    dnn,
    prelude::*,
};

use crate::error::ArtifactError;
use crate::shared::constants;

/// Maps a normalized frame to a fixed-length feature vector.
///
/// Input is always `FRAME_SIZE x FRAME_SIZE` with three identical 8-bit
/// channels. Implementations must be deterministic for a given input.
pub trait Embedder: Send + Sync {
    fn embed(&self, input: &Mat) -> opencv::Result<Vec<f32>>;
}

/// Pretrained ResNet-50 (no classification head, global average pooling)
/// executed through OpenCV's DNN module.
pub struct OnnxEmbedder {
    // forward() needs &mut; concurrent requests take turns
    net: Mutex<dnn::Net>,
    path: PathBuf,
}

impl OnnxEmbedder {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.is_file() {
            return Err(ArtifactError::Missing {
                what: "embedding network",
                path: path.to_path_buf(),
            });
        }

        let embedding_err = |source| ArtifactError::Embedding {
            path: path.to_path_buf(),
            source,
        };

        let mut net = dnn::read_net_from_onnx(&path.to_string_lossy()).map_err(embedding_err)?;
        if net.empty().map_err(embedding_err)? {
            return Err(ArtifactError::Invalid {
                path: path.to_path_buf(),
                reason: "network has no layers".into(),
            });
        }
        net.set_preferable_backend(dnn::DNN_BACKEND_OPENCV)
            .map_err(embedding_err)?;
        net.set_preferable_target(dnn::DNN_TARGET_CPU)
            .map_err(embedding_err)?;

        tracing::info!(path = %path.display(), "embedding network loaded");

        Ok(Self {
            net: Mutex::new(net),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, input: &Mat) -> opencv::Result<Vec<f32>> {
        let [b, g, r] = constants::EMBEDDING_MEAN_BGR;
        // Channels are identical, so no R/B swap; the means land in B, G, R order
        let blob = dnn::blob_from_image(
            input,
            1.0,
            Size::new(constants::FRAME_SIZE, constants::FRAME_SIZE),
            Scalar::new(b, g, r, 0.0),
            false,
            false,
            core::CV_32F,
        )?;

        let mut net = self.net.lock().unwrap_or_else(PoisonError::into_inner);
        net.set_input(&blob, "", 1.0, Scalar::default())?;
        let output = net.forward_single("")?;
        flatten(&output)
    }
}

/// Copy a network output tensor into a flat vector.
pub fn flatten(output: &Mat) -> opencv::Result<Vec<f32>> {
    if output.typ() != core::CV_32F || !output.is_continuous() {
        return Err(opencv::Error::new(
            core::StsUnmatchedFormats,
            "embedding output is not a contiguous f32 tensor",
        ));
    }
    Ok(output.data_typed::<f32>()?.to_vec())
}
