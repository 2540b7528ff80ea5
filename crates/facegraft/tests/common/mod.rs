//! Fake model ports keyed by image width, so each test picks a page's
//! behavior through the size of the image it writes.

#![allow(dead_code)]

use facegraft::ModelLoader;
use facegraft_core::{DetectedFace, Embedding, FaceAnalyzer, FaceBox, IdentityTransfer, ModelError};
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One face at (20, 20)-(40, 40).
pub const ONE_FACE: u32 = 64;
/// Detector finds nothing.
pub const NO_FACE: u32 = 48;
/// One face, but the transfer model errors on it.
pub const TRANSFER_ERROR: u32 = 50;
/// The detector panics.
pub const DETECT_PANIC: u32 = 52;
/// Two faces: a large low-confidence one and a small confident one.
pub const TWO_FACES: u32 = 80;

pub const HEIGHT: u32 = 60;

pub fn face(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> DetectedFace {
    let mut face = DetectedFace::new(FaceBox::new(x1, y1, x2, y2), score);
    face.landmarks = Some([(x1, y1), (x2, y1), ((x1 + x2) / 2.0, (y1 + y2) / 2.0), (x1, y2), (x2, y2)]);
    face
}

/// Write a flat gray PNG whose width selects the fake behavior.
pub fn write_page(path: &Path, width: u32) {
    RgbImage::from_pixel(width, HEIGHT, Rgb([120, 120, 120]))
        .save(path)
        .unwrap();
}

pub fn faces_for_width(width: u32) -> Vec<DetectedFace> {
    match width {
        NO_FACE => Vec::new(),
        TWO_FACES => vec![
            face(2.0, 2.0, 42.0, 42.0, 0.6),
            face(50.0, 10.0, 70.0, 30.0, 0.95),
        ],
        _ => vec![face(20.0, 20.0, 40.0, 40.0, 0.9)],
    }
}

pub struct FakeAnalyzer;

impl FaceAnalyzer for FakeAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, ModelError> {
        if image.width() == DETECT_PANIC {
            panic!("detector session crashed");
        }
        Ok(faces_for_width(image.width()))
    }

    fn compute_identity(&mut self, _: &RgbImage, face: &DetectedFace) -> Result<Embedding, ModelError> {
        Ok(Embedding {
            values: vec![face.score; 512],
            model_version: Some("fake".into()),
        })
    }
}

/// Paints the adjusted face box red and remembers the faces it was given.
#[derive(Default)]
pub struct FakeTransfer {
    pub calls: Arc<Mutex<Vec<(DetectedFace, DetectedFace)>>>,
}

impl IdentityTransfer for FakeTransfer {
    fn transfer(
        &mut self,
        target: &RgbImage,
        target_face: &DetectedFace,
        source_face: &DetectedFace,
        paste_back: bool,
    ) -> Result<RgbImage, ModelError> {
        assert!(paste_back, "batch pages always paste back");
        self.calls
            .lock()
            .unwrap()
            .push((target_face.clone(), source_face.clone()));

        if target.width() == TRANSFER_ERROR {
            return Err(ModelError::Inference("swap session returned no output".into()));
        }

        let mut out = target.clone();
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            if target_face.bbox.contains(x as f32 + 0.5, y as f32 + 0.5) {
                *pixel = Rgb([255, 0, 0]);
            }
        }
        Ok(out)
    }
}

#[derive(Clone, Default)]
pub struct FakeLoader {
    pub face_loads: Arc<AtomicUsize>,
    pub transfer_loads: Arc<AtomicUsize>,
    pub transfer_calls: Arc<Mutex<Vec<(DetectedFace, DetectedFace)>>>,
    /// When set, the transfer model fails to load with this message.
    pub transfer_missing: Option<String>,
}

impl ModelLoader for FakeLoader {
    fn load_face_model(&self) -> Result<Box<dyn FaceAnalyzer>, ModelError> {
        self.face_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeAnalyzer))
    }

    fn load_transfer_model(&self) -> Result<Box<dyn IdentityTransfer>, ModelError> {
        self.transfer_loads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.transfer_missing {
            return Err(ModelError::Inference(message.clone()));
        }
        Ok(Box::new(FakeTransfer {
            calls: Arc::clone(&self.transfer_calls),
        }))
    }
}

pub fn failing_loader(message: &str) -> FakeLoader {
    FakeLoader {
        transfer_missing: Some(message.to_string()),
        ..FakeLoader::default()
    }
}

pub fn loads(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
