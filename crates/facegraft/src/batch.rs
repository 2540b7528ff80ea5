//! One source identity applied across an ordered list of target pages.

use crate::config::Config;
use crate::page::{PageJob, PageProcessor, PageResult, SourceIdentity};
use crate::registry::{lock, ModelRegistry, ModelUnavailable, SharedFaceModel};
use crate::report::SingleSwapResult;
use facegraft_core::{largest_by_area, ModelError, DEFAULT_EXPAND_SCALE};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Conditions that stop a batch before any page is processed.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailable),
    #[error("cannot read source image {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error("no face found in source image {}; use a clear front-facing photo", path.display())]
    NoSourceFace { path: PathBuf },
    #[error("cannot analyze source face in {}: {source}", path.display())]
    SourceAnalysis {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// One result per target, in input order.
    pub results: Vec<PageResult>,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_count: usize,
}

impl BatchSummary {
    pub fn from_results(results: Vec<PageResult>) -> Self {
        let success_count = results.iter().filter(|r| r.is_success()).count();
        let total_count = results.len();
        Self {
            results,
            success_count,
            failure_count: total_count - success_count,
            total_count,
        }
    }
}

/// Output path of page `page_index` (1-based) inside a batch output directory.
pub fn batch_output_path(output_dir: &Path, page_index: usize, extension: &str) -> PathBuf {
    output_dir.join(format!("swapped-{page_index}.{extension}"))
}

pub struct BatchOrchestrator<'r> {
    registry: &'r ModelRegistry,
    expand_scale: f32,
    output_extension: String,
}

impl<'r> BatchOrchestrator<'r> {
    pub fn new(registry: &'r ModelRegistry) -> Self {
        Self {
            registry,
            expand_scale: DEFAULT_EXPAND_SCALE,
            output_extension: "png".to_string(),
        }
    }

    pub fn from_config(registry: &'r ModelRegistry, config: &Config) -> Self {
        Self::new(registry)
            .with_expand_scale(config.expand_scale)
            .with_output_extension(&config.output_extension)
    }

    pub fn with_expand_scale(mut self, scale: f32) -> Self {
        self.expand_scale = scale;
        self
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    /// Transfer the face in `source` onto every target, writing
    /// `swapped-<i>.<ext>` into `output_dir`.
    ///
    /// Only source-level problems and model initialization fail the call.
    /// Every target yields exactly one result, in input order.
    pub fn run_batch(
        &self,
        source: &Path,
        targets: &[PathBuf],
        output_dir: &Path,
    ) -> Result<BatchSummary, BatchError> {
        let started = Instant::now();
        let processor = self.processor()?;
        let identity = load_source_identity(processor.face_model(), source)?;

        std::fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDirectory {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let total = targets.len();
        let mut results = Vec::with_capacity(total);
        for (i, target) in targets.iter().enumerate() {
            let job = PageJob {
                page_index: i + 1,
                target_path: target.clone(),
                output_path: batch_output_path(output_dir, i + 1, &self.output_extension),
            };
            tracing::info!(page = job.page_index, total, target = %target.display(), "processing page");
            results.push(processor.process(&identity, &job));
        }

        let summary = BatchSummary::from_results(results);
        tracing::info!(
            success = summary.success_count,
            total = summary.total_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch complete"
        );
        Ok(summary)
    }

    /// Transfer the face in `source` onto one `target`, writing `output`.
    ///
    /// Unlike a batch page there is no fallback copy: a failed transfer
    /// leaves `output` untouched and is reported in the result.
    pub fn swap_single(
        &self,
        source: &Path,
        target: &Path,
        output: &Path,
    ) -> Result<SingleSwapResult, ModelUnavailable> {
        let processor = self.processor()?;

        let identity = match load_source_identity(processor.face_model(), source) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "source rejected");
                return Ok(SingleSwapResult::failed(e));
            }
        };

        let job = PageJob {
            page_index: 1,
            target_path: target.to_path_buf(),
            output_path: output.to_path_buf(),
        };
        match processor.attempt(&identity, &job) {
            Ok(()) => {
                tracing::info!(output = %output.display(), "transfer complete");
                Ok(SingleSwapResult::written(job.output_path))
            }
            Err(failure) => {
                tracing::warn!(error = %failure, outcome = %failure.outcome(), "transfer failed");
                Ok(SingleSwapResult::failed(failure))
            }
        }
    }

    /// Page processor over the registry's models, loading them if needed.
    pub fn processor(&self) -> Result<PageProcessor, ModelUnavailable> {
        Ok(PageProcessor::new(
            self.registry.face_model()?,
            self.registry.transfer_model()?,
            self.expand_scale,
        ))
    }
}

fn load_source_identity(face_model: &SharedFaceModel, path: &Path) -> Result<SourceIdentity, BatchError> {
    let unreadable = |reason: String| BatchError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;
    // Decoded by content, not extension, the same way target pages are.
    let image = image::load_from_memory(&bytes)
        .map_err(|e| unreadable(e.to_string()))?
        .to_rgb8();

    let analysis = |source| BatchError::SourceAnalysis {
        path: path.to_path_buf(),
        source,
    };

    let mut model = lock(face_model);
    let faces = model.detect(&image).map_err(analysis)?;
    let face = largest_by_area(&faces).ok_or_else(|| BatchError::NoSourceFace {
        path: path.to_path_buf(),
    })?;
    let embedding = model.compute_identity(&image, face).map_err(analysis)?;

    tracing::info!(
        path = %path.display(),
        faces = faces.len(),
        score = face.score,
        "source face selected"
    );
    Ok(SourceIdentity::new(face.clone(), embedding))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageOutcome;

    fn result(index: usize, outcome: PageOutcome) -> PageResult {
        PageResult {
            page_index: index,
            outcome,
            output_path: PathBuf::from(format!("swapped-{index}.png")),
            output_written: true,
            error: None,
        }
    }

    #[test]
    fn test_summary_counts() {
        let summary = BatchSummary::from_results(vec![
            result(1, PageOutcome::Success),
            result(2, PageOutcome::NoFaceDetected),
            result(3, PageOutcome::TransferFailed),
            result(4, PageOutcome::Success),
        ]);
        assert_eq!(summary.total_count, 4);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_results(Vec::new());
        assert_eq!(summary.total_count, 0);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 0);
    }

    #[test]
    fn test_batch_output_path() {
        assert_eq!(
            batch_output_path(Path::new("/out"), 3, "png"),
            PathBuf::from("/out/swapped-3.png")
        );
    }
}
