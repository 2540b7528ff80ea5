//! Process-wide owner of the two model capabilities.
//!
//! Each capability is built on first use through a [`ModelLoader`] and then
//! shared for the rest of the process. Construct one registry and pass it by
//! reference to whatever runs batches.

use facegraft_core::{FaceAnalyzer, IdentityTransfer, ModelError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Shared detector/embedder handle. Lock it for one inference call at a time.
pub type SharedFaceModel = Arc<Mutex<Box<dyn FaceAnalyzer>>>;

/// Shared identity-transfer handle.
pub type SharedTransferModel = Arc<Mutex<Box<dyn IdentityTransfer>>>;

/// A model could not be initialized. Fatal: nothing can be processed
/// until the environment is fixed.
#[derive(Error, Debug)]
#[error("{model} model unavailable: {source}")]
pub struct ModelUnavailable {
    pub model: &'static str,
    #[source]
    pub source: ModelError,
}

/// Builds the model capabilities. Called at most once per successful load.
pub trait ModelLoader: Send + Sync {
    fn load_face_model(&self) -> Result<Box<dyn FaceAnalyzer>, ModelError>;
    fn load_transfer_model(&self) -> Result<Box<dyn IdentityTransfer>, ModelError>;
}

pub struct ModelRegistry {
    loader: Box<dyn ModelLoader>,
    face: OnceLock<SharedFaceModel>,
    transfer: OnceLock<SharedTransferModel>,
    /// Serializes initialization; reads of a loaded handle never take it.
    init_lock: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            face: OnceLock::new(),
            transfer: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Detector/embedder, loading it on first call.
    pub fn face_model(&self) -> Result<SharedFaceModel, ModelUnavailable> {
        get_or_init(&self.face, &self.init_lock, "face analysis", || {
            self.loader
                .load_face_model()
                .map(|model| Arc::new(Mutex::new(model)))
        })
    }

    /// Identity-transfer renderer, loading it on first call.
    pub fn transfer_model(&self) -> Result<SharedTransferModel, ModelUnavailable> {
        get_or_init(&self.transfer, &self.init_lock, "identity transfer", || {
            self.loader
                .load_transfer_model()
                .map(|model| Arc::new(Mutex::new(model)))
        })
    }

    pub fn is_face_model_loaded(&self) -> bool {
        self.face.get().is_some()
    }

    pub fn is_transfer_model_loaded(&self) -> bool {
        self.transfer.get().is_some()
    }
}

/// Double-checked lazy initialization. A failed load caches nothing, so the
/// next call tries again.
fn get_or_init<T: Clone>(
    cell: &OnceLock<T>,
    init_lock: &Mutex<()>,
    model: &'static str,
    init: impl FnOnce() -> Result<T, ModelError>,
) -> Result<T, ModelUnavailable> {
    if let Some(handle) = cell.get() {
        return Ok(handle.clone());
    }

    let _guard = lock(init_lock);
    if let Some(handle) = cell.get() {
        return Ok(handle.clone());
    }

    tracing::info!(model, "loading model; this can take a while on first use");
    let started = Instant::now();

    let handle = init().map_err(|source| {
        tracing::error!(model, error = %source, "model load failed");
        ModelUnavailable { model, source }
    })?;

    tracing::info!(
        model,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "model ready"
    );
    Ok(cell.get_or_init(|| handle).clone())
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Model sessions hold no per-call state, so a panic mid-inference leaves
/// them usable.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
