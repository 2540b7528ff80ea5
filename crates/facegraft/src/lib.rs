//! facegraft: batch face-identity transfer.
//!
//! A [`ModelRegistry`] owns the detection/embedding and transfer models for
//! the life of the process. [`BatchOrchestrator`] extracts one source identity
//! and applies it to each target page through a [`PageProcessor`], which
//! guarantees one result (and, where possible, one output file) per page.

pub mod batch;
pub mod config;
pub mod loader;
pub mod manifest;
pub mod page;
pub mod registry;
pub mod report;

pub use batch::{batch_output_path, BatchError, BatchOrchestrator, BatchSummary};
pub use config::Config;
pub use loader::OnnxModelLoader;
pub use manifest::{is_manifest, read_manifest, ManifestError};
pub use page::{PageFailure, PageJob, PageOutcome, PageProcessor, PageResult, PageStage, SourceIdentity};
pub use registry::{ModelLoader, ModelRegistry, ModelUnavailable, SharedFaceModel, SharedTransferModel};
pub use report::{BatchRecord, FailureRecord, PageRecord, SingleSwapResult};
