//! Bounding-box padding applied before identity transfer.
//!
//! Detector boxes sit tight around the face and clip hair and chin, which
//! shows up as seams after paste-back. The transfer step blends only inside
//! the adjusted box, so the box is grown by a fraction of its own size.

use crate::types::{DetectedFace, FaceBox};

/// Fraction of the box size added on each side.
pub const DEFAULT_EXPAND_SCALE: f32 = 0.18;

/// Grow `face.bbox` by `scale` of its width/height on every edge, clamped to
/// an image of `height` x `width` pixels.
///
/// Returns a new face; score, landmarks and embedding are copied unchanged.
pub fn expand_region(face: &DetectedFace, height: u32, width: u32, scale: f32) -> DetectedFace {
    let b = face.bbox;
    let pad_w = (scale * b.width()).round();
    let pad_h = (scale * b.height()).round();

    let max_x = width as f32;
    let max_y = height as f32;

    let bbox = FaceBox {
        x1: (b.x1 - pad_w).clamp(0.0, max_x),
        y1: (b.y1 - pad_h).clamp(0.0, max_y),
        x2: (b.x2 + pad_w).clamp(0.0, max_x),
        y2: (b.y2 + pad_h).clamp(0.0, max_y),
    };

    DetectedFace {
        bbox,
        ..face.clone()
    }
}
