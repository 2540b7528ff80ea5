//! Capability ports consumed by the transfer pipeline.
//!
//! The pipeline only talks to these traits. The ONNX adapters in this crate
//! implement them; tests substitute their own.

use crate::detector::DetectorError;
use crate::recognizer::RecognizerError;
use crate::swapper::SwapperError;
use crate::types::{DetectedFace, Embedding};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("swapper: {0}")]
    Swapper(#[from] SwapperError),
    #[error("unsupported device: {0} (use 'cpu', 'cuda' or 'cuda:N')")]
    UnsupportedDevice(String),
    #[error("source face carries no identity embedding")]
    MissingEmbedding,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Face detection and identity embedding.
pub trait FaceAnalyzer: Send {
    /// Detect every face in `image`. An empty result is not an error.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ModelError>;

    /// Compute the identity embedding of a face previously detected in `image`.
    fn compute_identity(
        &mut self,
        image: &RgbImage,
        face: &DetectedFace,
    ) -> Result<Embedding, ModelError>;
}

/// Identity-swap rendering.
pub trait IdentityTransfer: Send {
    /// Render `source_face`'s identity onto `target_face` inside `target`.
    ///
    /// With `paste_back` the result is the full target frame; otherwise only
    /// the aligned face crop is returned.
    fn transfer(
        &mut self,
        target: &RgbImage,
        target_face: &DetectedFace,
        source_face: &DetectedFace,
        paste_back: bool,
    ) -> Result<RgbImage, ModelError>;
}
