//! inswapper identity transfer via ONNX Runtime.
//!
//! The target face is aligned to a 128x128 crop, the source identity is
//! projected into the generator's latent space through the `emap` matrix,
//! and the rendered crop is optionally pasted back into the full frame.

use crate::alignment;
use crate::device::{self, Device};
use crate::onnx_graph;
use crate::ports::{IdentityTransfer, ModelError};
use crate::types::{DetectedFace, Embedding};
use image::{Rgb, RgbImage};
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use thiserror::Error;

const INSWAPPER_INPUT_SIZE: usize = 128;
const INSWAPPER_LATENT_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum SwapperError {
    #[error("identity-transfer model not found at {} (place inswapper_128.onnx there)", .0.display())]
    ModelNotFound(PathBuf),
    #[error("cannot read latent projection matrix from {}: {reason} (or provide a 512x512 little-endian f32 sidecar)", .path.display())]
    EmbeddedEmap { path: PathBuf, reason: String },
    #[error("latent projection matrix {} has {len} bytes, expected {expected}", .path.display())]
    InvalidEmap { path: PathBuf, len: usize, expected: usize },
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("source embedding has {0} dimensions, expected 512")]
    EmbeddingDim(usize),
    #[error("target face has no landmarks; the detector must return landmarks for alignment")]
    NoLandmarks,
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// inswapper_128 identity-transfer renderer.
pub struct FaceSwapper {
    session: Session,
    /// Row-major 512x512 projection from ArcFace space to the generator latent.
    emap: Vec<f32>,
}

impl FaceSwapper {
    /// Load the swap model and its latent projection matrix.
    ///
    /// The matrix comes from the `emap_path` sidecar when it exists and
    /// otherwise from the model's last initializer, where the stock
    /// `inswapper_128.onnx` keeps it.
    pub fn load(
        model_path: &Path,
        emap_path: &Path,
        device: Device,
        intra_threads: usize,
    ) -> Result<Self, SwapperError> {
        if !model_path.exists() {
            return Err(SwapperError::ModelNotFound(model_path.to_path_buf()));
        }
        let emap = load_emap(model_path, emap_path)?;

        let session = device::load_session(model_path, device, intra_threads)?;

        tracing::info!(
            path = %model_path.display(),
            %device,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            "loaded inswapper model"
        );

        Ok(Self { session, emap })
    }

    /// Render `source` onto `target_face`.
    ///
    /// Paste-back blends only inside `target_face.bbox`, so callers widen the
    /// box first to give the blend room around hair and chin.
    pub fn swap(
        &mut self,
        target: &RgbImage,
        target_face: &DetectedFace,
        source: &Embedding,
        paste_back: bool,
    ) -> Result<RgbImage, SwapperError> {
        let landmarks = target_face.landmarks.as_ref().ok_or(SwapperError::NoLandmarks)?;
        if source.values.len() != INSWAPPER_LATENT_DIM {
            return Err(SwapperError::EmbeddingDim(source.values.len()));
        }

        let (aligned, matrix) = alignment::norm_crop(target, landmarks, INSWAPPER_INPUT_SIZE as u32);
        let target_tensor = preprocess(&aligned);
        let latent = Array2::from_shape_vec(
            (1, INSWAPPER_LATENT_DIM),
            project_latent(&source.normalized(), &self.emap),
        )
        .map_err(|e| SwapperError::InferenceFailed(format!("latent shape: {e}")))?;

        let outputs = self.session.run(ort::inputs![
            "target" => TensorRef::from_array_view(target_tensor.view())?,
            "source" => TensorRef::from_array_view(latent.view())?
        ])?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| SwapperError::InferenceFailed(format!("swap output: {e}")))?;

        let crop = postprocess(data)?;

        if paste_back {
            Ok(alignment::paste_back(target, &crop, &matrix, &target_face.bbox))
        } else {
            Ok(crop)
        }
    }
}

impl IdentityTransfer for FaceSwapper {
    fn transfer(
        &mut self,
        target: &RgbImage,
        target_face: &DetectedFace,
        source_face: &DetectedFace,
        paste_back: bool,
    ) -> Result<RgbImage, ModelError> {
        let embedding = source_face.embedding.as_ref().ok_or(ModelError::MissingEmbedding)?;
        Ok(self.swap(target, target_face, embedding, paste_back)?)
    }
}

/// Read the projection matrix from the sidecar, falling back to the model graph.
fn load_emap(model_path: &Path, emap_path: &Path) -> Result<Vec<f32>, SwapperError> {
    let read = |path: &Path| {
        std::fs::read(path).map_err(|source| SwapperError::Io {
            path: path.to_path_buf(),
            source,
        })
    };

    if emap_path.exists() {
        let bytes = read(emap_path)?;
        return parse_emap(&bytes).ok_or_else(|| SwapperError::InvalidEmap {
            path: emap_path.to_path_buf(),
            len: bytes.len(),
            expected: INSWAPPER_LATENT_DIM * INSWAPPER_LATENT_DIM * 4,
        });
    }

    tracing::debug!(
        sidecar = %emap_path.display(),
        model = %model_path.display(),
        "no emap sidecar; reading projection matrix from the model"
    );
    let model = read(model_path)?;
    onnx_graph::last_square_initializer(&model, INSWAPPER_LATENT_DIM).map_err(|reason| {
        SwapperError::EmbeddedEmap {
            path: model_path.to_path_buf(),
            reason,
        }
    })
}

/// Decode a little-endian f32 512x512 matrix.
fn parse_emap(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() != INSWAPPER_LATENT_DIM * INSWAPPER_LATENT_DIM * 4 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// `normalize(embedding · emap)`, with `emap` row-major and square.
fn project_latent(embedding: &[f32], emap: &[f32]) -> Vec<f32> {
    let dim = embedding.len();
    let mut latent = vec![0.0f32; dim];
    for (i, &e) in embedding.iter().enumerate() {
        let row = &emap[i * dim..(i + 1) * dim];
        for (l, &m) in latent.iter_mut().zip(row) {
            *l += e * m;
        }
    }

    Embedding { values: latent, model_version: None }.normalized()
}

/// RGB crop scaled to [0, 1] as a NCHW tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = INSWAPPER_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, px) in aligned.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = px[c] as f32 / 255.0;
        }
    }
    tensor
}

/// NCHW [0, 1] output back to an RGB crop.
fn postprocess(data: &[f32]) -> Result<RgbImage, SwapperError> {
    let size = INSWAPPER_INPUT_SIZE;
    let plane = size * size;
    if data.len() != 3 * plane {
        return Err(SwapperError::InferenceFailed(format!(
            "expected {} output values, got {}",
            3 * plane,
            data.len()
        )));
    }

    Ok(RgbImage::from_fn(size as u32, size as u32, |x, y| {
        let offset = y as usize * size + x as usize;
        Rgb(std::array::from_fn(|c| {
            (data[c * plane + offset].clamp(0.0, 1.0) * 255.0).round() as u8
        }))
    }))
}
