//! Per-page identity transfer with page-scoped failure containment.
//!
//! A page walks `load → detect → select → expand → transfer → write`. Any
//! failure on the way is turned into a [`PageResult`] and, where the target
//! file exists, a verbatim copy of the target at the output path. Nothing
//! raised while processing a page escapes [`PageProcessor::process`].

use crate::registry::{lock, SharedFaceModel, SharedTransferModel};
use facegraft_core::{best_by_score_then_area, expand_region, DetectedFace, Embedding};
use image::RgbImage;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// The subject face every page receives. Always carries an embedding.
#[derive(Debug, Clone)]
pub struct SourceIdentity {
    face: DetectedFace,
}

impl SourceIdentity {
    pub fn new(mut face: DetectedFace, embedding: Embedding) -> Self {
        face.embedding = Some(embedding);
        Self { face }
    }

    pub fn face(&self) -> &DetectedFace {
        &self.face
    }
}

/// One target page to process.
#[derive(Debug, Clone)]
pub struct PageJob {
    /// 1-based position in the batch.
    pub page_index: usize,
    pub target_path: PathBuf,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PageOutcome {
    Success,
    NoFaceDetected,
    UnreadableImage,
    TransferFailed,
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageOutcome::Success => "success",
            PageOutcome::NoFaceDetected => "noFaceDetected",
            PageOutcome::UnreadableImage => "unreadableImage",
            PageOutcome::TransferFailed => "transferFailed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PageResult {
    pub page_index: usize,
    pub outcome: PageOutcome,
    /// Where the page's output belongs, whether or not it was written.
    pub output_path: PathBuf,
    /// False only when the target could not be located or the fallback copy failed.
    pub output_written: bool,
    pub error: Option<String>,
}

impl PageResult {
    pub fn is_success(&self) -> bool {
        self.outcome == PageOutcome::Success
    }
}

/// Last stage a failed page reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStage {
    Detect,
    Transfer,
    Write,
}

impl fmt::Display for PageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageStage::Detect => "detection",
            PageStage::Transfer => "transfer",
            PageStage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PageFailure {
    #[error("target image not found: {}", .0.display())]
    TargetMissing(PathBuf),
    #[error("cannot read target image: {0}")]
    TargetUnreadable(String),
    #[error("no face detected in target image")]
    NoFace,
    #[error("{stage} failed: {detail}")]
    Stage { stage: PageStage, detail: String },
}

impl PageFailure {
    pub fn outcome(&self) -> PageOutcome {
        match self {
            PageFailure::TargetMissing(_) | PageFailure::TargetUnreadable(_) => {
                PageOutcome::UnreadableImage
            }
            PageFailure::NoFace => PageOutcome::NoFaceDetected,
            PageFailure::Stage { .. } => PageOutcome::TransferFailed,
        }
    }

    /// Whether the original target should be copied to the output path.
    fn wants_fallback_copy(&self) -> bool {
        !matches!(self, PageFailure::TargetMissing(_))
    }
}

/// Runs the per-page pipeline against shared model handles.
pub struct PageProcessor {
    face: SharedFaceModel,
    transfer: SharedTransferModel,
    expand_scale: f32,
}

impl PageProcessor {
    pub fn new(face: SharedFaceModel, transfer: SharedTransferModel, expand_scale: f32) -> Self {
        Self {
            face,
            transfer,
            expand_scale,
        }
    }

    pub fn face_model(&self) -> &SharedFaceModel {
        &self.face
    }

    /// Process one page. Always returns a result; never panics or errors.
    pub fn process(&self, source: &SourceIdentity, job: &PageJob) -> PageResult {
        let started = Instant::now();

        let result = match self.attempt(source, job) {
            Ok(()) => PageResult {
                page_index: job.page_index,
                outcome: PageOutcome::Success,
                output_path: job.output_path.clone(),
                output_written: true,
                error: None,
            },
            Err(failure) => recover(job, failure),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result.error {
            None => tracing::info!(
                page = job.page_index,
                output = %job.output_path.display(),
                elapsed_ms,
                "page transferred"
            ),
            Some(error) => tracing::warn!(
                page = job.page_index,
                outcome = %result.outcome,
                output_written = result.output_written,
                elapsed_ms,
                error = %error,
                "page degraded"
            ),
        }

        result
    }

    /// The pipeline without any fallback. `Ok` means the transferred page is on disk.
    pub fn attempt(&self, source: &SourceIdentity, job: &PageJob) -> Result<(), PageFailure> {
        let image = load_target(&job.target_path)?;

        let faces = guarded(PageStage::Detect, || lock(&self.face).detect(&image))?;
        let selected = best_by_score_then_area(&faces).ok_or(PageFailure::NoFace)?;
        let adjusted = expand_region(selected, image.height(), image.width(), self.expand_scale);
        tracing::debug!(
            page = job.page_index,
            faces = faces.len(),
            score = selected.score,
            bbox = ?adjusted.bbox,
            "target face selected"
        );

        let rendered = guarded(PageStage::Transfer, || {
            lock(&self.transfer).transfer(&image, &adjusted, source.face(), true)
        })?;

        guarded(PageStage::Write, || rendered.save(&job.output_path))
    }
}

fn load_target(path: &Path) -> Result<RgbImage, PageFailure> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => PageFailure::TargetMissing(path.to_path_buf()),
        _ => PageFailure::TargetUnreadable(e.to_string()),
    })?;
    image::load_from_memory(&bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| PageFailure::TargetUnreadable(e.to_string()))
}

/// Run one stage, turning both errors and panics into a stage failure.
fn guarded<T, E: fmt::Display>(
    stage: PageStage,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, PageFailure> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PageFailure::Stage {
            stage,
            detail: e.to_string(),
        }),
        Err(payload) => Err(PageFailure::Stage {
            stage,
            detail: format!("panicked: {}", panic_message(&*payload)),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn recover(job: &PageJob, failure: PageFailure) -> PageResult {
    let outcome = failure.outcome();
    let detail = failure.to_string();

    let (output_written, error) = if !failure.wants_fallback_copy() {
        (false, detail)
    } else {
        match std::fs::copy(&job.target_path, &job.output_path) {
            Ok(_) => (true, detail),
            Err(e) => (false, format!("{detail}; fallback copy failed: {e}")),
        }
    };

    PageResult {
        page_index: job.page_index,
        outcome,
        output_path: job.output_path.clone(),
        output_written,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path, target: &str) -> PageJob {
        PageJob {
            page_index: 3,
            target_path: dir.join(target),
            output_path: dir.join("swapped-3.png"),
        }
    }

    #[test]
    fn test_failure_outcomes() {
        assert_eq!(
            PageFailure::TargetMissing(PathBuf::from("x")).outcome(),
            PageOutcome::UnreadableImage
        );
        assert_eq!(
            PageFailure::TargetUnreadable("bad".into()).outcome(),
            PageOutcome::UnreadableImage
        );
        assert_eq!(PageFailure::NoFace.outcome(), PageOutcome::NoFaceDetected);
        let stage = PageFailure::Stage {
            stage: PageStage::Transfer,
            detail: "boom".into(),
        };
        assert_eq!(stage.outcome(), PageOutcome::TransferFailed);
        assert_eq!(stage.to_string(), "transfer failed: boom");
    }

    #[test]
    fn test_guarded_contains_panics() {
        let result: Result<(), _> = guarded(PageStage::Detect, || -> Result<(), String> {
            panic!("onnx exploded")
        });
        match result {
            Err(PageFailure::Stage { stage, detail }) => {
                assert_eq!(stage, PageStage::Detect);
                assert!(detail.contains("onnx exploded"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_target_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "absent.png");

        let failure = load_target(&job.target_path).unwrap_err();
        assert!(matches!(failure, PageFailure::TargetMissing(_)));

        let result = recover(&job, failure);
        assert_eq!(result.outcome, PageOutcome::UnreadableImage);
        assert!(!result.output_written);
        assert!(!job.output_path.exists());
    }

    #[test]
    fn test_undecodable_target_is_copied_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let job = job(dir.path(), "page.png");
        std::fs::write(&job.target_path, b"not an image").unwrap();

        let failure = load_target(&job.target_path).unwrap_err();
        let result = recover(&job, failure);
        assert_eq!(result.outcome, PageOutcome::UnreadableImage);
        assert!(result.output_written);
        assert_eq!(std::fs::read(&job.output_path).unwrap(), b"not an image");
    }

    #[test]
    fn test_failed_fallback_records_both_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job(dir.path(), "page.png");
        std::fs::write(&job.target_path, b"bytes").unwrap();
        job.output_path = dir.path().join("no-such-dir").join("swapped-3.png");

        let result = recover(&job, PageFailure::NoFace);
        assert_eq!(result.outcome, PageOutcome::NoFaceDetected);
        assert!(!result.output_written);
        let error = result.error.unwrap();
        assert!(error.starts_with("no face detected"));
        assert!(error.contains("fallback copy failed"));
    }
}
