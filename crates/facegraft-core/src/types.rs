use serde::{Deserialize, Serialize};

/// Axis-aligned face rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl FaceBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Box area, treating inverted extents as empty.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Whether the pixel center `(x, y)` lies inside the box.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x1 && x < self.x2 && y >= self.y1 && y < self.y2
    }
}

/// A face found by the detection capability.
///
/// Library-specific detection output is reduced to these fields at the
/// adapter boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: FaceBox,
    /// Detection confidence, higher = more confident.
    pub score: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
    /// Identity embedding. Only the source face needs one.
    pub embedding: Option<Embedding>,
}

impl DetectedFace {
    pub fn new(bbox: FaceBox, score: f32) -> Self {
        Self {
            bbox,
            score,
            landmarks: None,
            embedding: None,
        }
    }

    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Euclidean (L2) norm of the vector.
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Unit-length copy of the values. A zero vector is returned unchanged.
    pub fn normalized(&self) -> Vec<f32> {
        let norm = self.norm();
        if norm > 0.0 {
            self.values.iter().map(|v| v / norm).collect()
        } else {
            self.values.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_box_area() {
        let b = FaceBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 40.0);
        assert_eq!(b.area(), 800.0);
    }

    #[test]
    fn test_face_box_inverted_area_is_zero() {
        let b = FaceBox::new(30.0, 20.0, 10.0, 60.0);
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn test_face_box_contains() {
        let b = FaceBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(0.0, 0.0));
        assert!(b.contains(9.5, 9.5));
        assert!(!b.contains(10.0, 5.0));
        assert!(!b.contains(-0.5, 5.0));
    }

    #[test]
    fn test_embedding_normalized() {
        let e = Embedding { values: vec![3.0, 4.0], model_version: None };
        assert!((e.norm() - 5.0).abs() < 1e-6);
        let n = e.normalized();
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_zero_vector_unchanged() {
        let e = Embedding { values: vec![0.0, 0.0], model_version: None };
        assert_eq!(e.normalized(), vec![0.0, 0.0]);
    }
}
