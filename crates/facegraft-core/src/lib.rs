//! facegraft-core: face data model and model adapters for identity transfer.
//!
//! Uses SCRFD for face detection, ArcFace for identity embeddings and
//! inswapper for rendering, all running via ONNX Runtime. The selection and
//! region helpers are pure and model-independent.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod device;
mod onnx_graph;
pub mod ports;
pub mod recognizer;
pub mod region;
pub mod select;
pub mod swapper;
pub mod types;

pub use analyzer::InsightFaceAnalyzer;
pub use detector::{FaceDetector, SCRFD_DEFAULT_INPUT_SIZE};
pub use device::Device;
pub use ports::{FaceAnalyzer, IdentityTransfer, ModelError};
pub use recognizer::FaceRecognizer;
pub use region::{expand_region, DEFAULT_EXPAND_SCALE};
pub use select::{best_by_score_then_area, largest_by_area, SelectionPolicy};
pub use swapper::FaceSwapper;
pub use types::{DetectedFace, Embedding, FaceBox};

use std::path::PathBuf;

/// Default model directory, `~/.insightface/models`.
///
/// Falls back to `/tmp/.insightface/models` when `HOME` is unset.
pub fn default_model_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".insightface").join("models")
}
