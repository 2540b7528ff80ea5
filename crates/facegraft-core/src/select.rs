//! Deterministic choice of one face out of a detection result.
//!
//! Two policies exist on purpose: illustrated pages can contain background
//! characters, so target pages rank by detection score first, while the
//! subject photo is expected to hold one dominant face and ranks by area.

use crate::types::DetectedFace;
use std::cmp::Ordering;

/// How to pick a face from a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Largest bounding-box area wins.
    LargestByArea,
    /// Highest detection score wins; equal scores fall back to larger area.
    BestByScoreThenArea,
}

impl SelectionPolicy {
    /// Select one face, or `None` when `faces` is empty.
    pub fn select(self, faces: &[DetectedFace]) -> Option<&DetectedFace> {
        match self {
            SelectionPolicy::LargestByArea => largest_by_area(faces),
            SelectionPolicy::BestByScoreThenArea => best_by_score_then_area(faces),
        }
    }
}

/// Face with the largest bounding-box area. Ties keep the earliest face.
pub fn largest_by_area(faces: &[DetectedFace]) -> Option<&DetectedFace> {
    first_max_by(faces, |a, b| a.area().total_cmp(&b.area()))
}

/// Face with the highest `(score, area)` key. Ties keep the earliest face.
pub fn best_by_score_then_area(faces: &[DetectedFace]) -> Option<&DetectedFace> {
    first_max_by(faces, |a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| a.area().total_cmp(&b.area()))
    })
}

/// `Iterator::max_by` keeps the last maximum; selection must keep the first.
fn first_max_by<F>(faces: &[DetectedFace], mut cmp: F) -> Option<&DetectedFace>
where
    F: FnMut(&DetectedFace, &DetectedFace) -> Ordering,
{
    faces.iter().fold(None, |best, face| match best {
        Some(b) if cmp(face, b) != Ordering::Greater => Some(b),
        _ => Some(face),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceBox;

    /// Square face at the origin with the given score and area.
    fn face(score: f32, area: f32) -> DetectedFace {
        let side = area.sqrt();
        DetectedFace::new(FaceBox::new(0.0, 0.0, side, side), score)
    }

    #[test]
    fn test_score_tie_larger_area_wins() {
        let faces = vec![face(0.9, 100.0), face(0.9, 50.0)];
        let best = best_by_score_then_area(&faces).unwrap();
        assert!((best.area() - 100.0).abs() < 1e-3);

        // Order must not matter.
        let faces = vec![face(0.9, 50.0), face(0.9, 100.0)];
        let best = best_by_score_then_area(&faces).unwrap();
        assert!((best.area() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_score_dominates_area() {
        let faces = vec![face(0.80, 1000.0), face(0.95, 10.0)];
        let best = best_by_score_then_area(&faces).unwrap();
        assert!((best.score - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_largest_by_area_ignores_score() {
        let faces = vec![face(0.99, 10.0), face(0.51, 400.0), face(0.7, 300.0)];
        let best = largest_by_area(&faces).unwrap();
        assert!((best.score - 0.51).abs() < 1e-6);
    }

    #[test]
    fn test_exact_tie_keeps_first() {
        let mut a = face(0.9, 100.0);
        a.bbox = FaceBox::new(0.0, 0.0, 10.0, 10.0);
        let mut b = face(0.9, 100.0);
        b.bbox = FaceBox::new(50.0, 50.0, 60.0, 60.0);
        let faces = vec![a, b];

        let best = best_by_score_then_area(&faces).unwrap();
        assert_eq!(best.bbox.x1, 0.0);
        let largest = largest_by_area(&faces).unwrap();
        assert_eq!(largest.bbox.x1, 0.0);
    }

    #[test]
    fn test_empty_input_selects_nothing() {
        assert!(largest_by_area(&[]).is_none());
        assert!(best_by_score_then_area(&[]).is_none());
        assert!(SelectionPolicy::BestByScoreThenArea.select(&[]).is_none());
    }

    #[test]
    fn test_policy_dispatch() {
        let faces = vec![face(0.95, 10.0), face(0.80, 1000.0)];
        let by_score = SelectionPolicy::BestByScoreThenArea.select(&faces).unwrap();
        let by_area = SelectionPolicy::LargestByArea.select(&faces).unwrap();
        assert!((by_score.score - 0.95).abs() < 1e-6);
        assert!((by_area.score - 0.80).abs() < 1e-6);
    }
}
