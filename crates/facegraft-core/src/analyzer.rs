//! SCRFD + ArcFace bundled behind the [`FaceAnalyzer`] port.

use crate::detector::FaceDetector;
use crate::ports::{FaceAnalyzer, ModelError};
use crate::recognizer::FaceRecognizer;
use crate::types::{DetectedFace, Embedding};
use image::RgbImage;

/// The buffalo_l detection and recognition pair.
pub struct InsightFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl InsightFaceAnalyzer {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer) -> Self {
        Self { detector, recognizer }
    }
}

impl FaceAnalyzer for InsightFaceAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ModelError> {
        Ok(self.detector.detect(image)?)
    }

    fn compute_identity(
        &mut self,
        image: &RgbImage,
        face: &DetectedFace,
    ) -> Result<Embedding, ModelError> {
        Ok(self.recognizer.extract(image, face)?)
    }
}
