//! JSON records printed for callers of the pipeline.

use crate::batch::BatchSummary;
use crate::page::{PageOutcome, PageResult};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub page: usize,
    pub success: bool,
    pub outcome: PageOutcome,
    pub output: PathBuf,
    pub output_written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PageResult> for PageRecord {
    fn from(result: &PageResult) -> Self {
        Self {
            page: result.page_index,
            success: result.is_success(),
            outcome: result.outcome,
            output: result.output_path.clone(),
            output_written: result.output_written,
            error: result.error.clone(),
        }
    }
}

/// Completed batch. `success` is true even when individual pages degraded;
/// per-page status lives in `results`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub success: bool,
    pub results: Vec<PageRecord>,
    pub success_count: usize,
    pub fail_count: usize,
    pub total_pages: usize,
}

impl From<&BatchSummary> for BatchRecord {
    fn from(summary: &BatchSummary) -> Self {
        Self {
            success: true,
            results: summary.results.iter().map(PageRecord::from).collect(),
            success_count: summary.success_count,
            fail_count: summary.failure_count,
            total_pages: summary.total_count,
        }
    }
}

/// A fatal error that stopped the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub success: bool,
    pub error: String,
}

impl FailureRecord {
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

/// Outcome of a one-off transfer onto a single target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSwapResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SingleSwapResult {
    pub fn written(output: PathBuf) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
        }
    }
}
