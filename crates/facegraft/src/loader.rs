//! ONNX-backed [`ModelLoader`] driven by [`Config`].

use crate::config::Config;
use crate::registry::ModelLoader;
use facegraft_core::{
    Device, FaceAnalyzer, FaceDetector, FaceRecognizer, FaceSwapper, IdentityTransfer,
    InsightFaceAnalyzer, ModelError,
};

pub struct OnnxModelLoader {
    config: Config,
}

impl OnnxModelLoader {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn device(&self) -> Result<Device, ModelError> {
        self.config.device.parse()
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load_face_model(&self) -> Result<Box<dyn FaceAnalyzer>, ModelError> {
        let device = self.device()?;
        let detector = FaceDetector::load(
            &self.config.detector_model_path(),
            self.config.det_size,
            device,
            self.config.intra_threads,
        )?;
        let recognizer = FaceRecognizer::load(
            &self.config.recognizer_model_path(),
            device,
            self.config.intra_threads,
        )?;
        Ok(Box::new(InsightFaceAnalyzer::new(detector, recognizer)))
    }

    fn load_transfer_model(&self) -> Result<Box<dyn IdentityTransfer>, ModelError> {
        let device = self.device()?;
        let swapper = FaceSwapper::load(
            &self.config.swapper_model_path(),
            &self.config.swapper_emap_path(),
            device,
            self.config.intra_threads,
        )?;
        Ok(Box::new(swapper))
    }
}
