use std::path::PathBuf;

/// Pipeline configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing ONNX model files (default: ~/.insightface/models).
    pub model_dir: PathBuf,
    /// Detection/recognition pack subdirectory under `model_dir`.
    pub face_pack: String,
    /// Explicit path to the identity-transfer model, if not under `model_dir`.
    pub swapper_path: Option<PathBuf>,
    /// Explicit path to the transfer model's latent projection matrix.
    pub swapper_emap_path: Option<PathBuf>,
    /// Preferred inference device: `cpu`, `cuda` or `cuda:N`.
    pub device: String,
    /// Square detector input size in pixels.
    pub det_size: usize,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Fraction of the face box added on each side before transfer.
    pub expand_scale: f32,
    /// File extension (and encoder) for batch outputs.
    pub output_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: facegraft_core::default_model_dir(),
            face_pack: "buffalo_l".to_string(),
            swapper_path: None,
            swapper_emap_path: None,
            device: "cpu".to_string(),
            det_size: facegraft_core::SCRFD_DEFAULT_INPUT_SIZE,
            intra_threads: 2,
            expand_scale: facegraft_core::DEFAULT_EXPAND_SCALE,
            output_extension: "png".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `FACEGRAFT_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            model_dir: std::env::var("FACEGRAFT_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            face_pack: std::env::var("FACEGRAFT_FACE_PACK").unwrap_or(defaults.face_pack),
            swapper_path: std::env::var("FACEGRAFT_SWAPPER_PATH").ok().map(PathBuf::from),
            swapper_emap_path: std::env::var("FACEGRAFT_SWAPPER_EMAP_PATH").ok().map(PathBuf::from),
            device: std::env::var("FACEGRAFT_DEVICE").unwrap_or(defaults.device),
            det_size: env_parse("FACEGRAFT_DET_SIZE", defaults.det_size),
            intra_threads: env_parse("FACEGRAFT_INTRA_THREADS", defaults.intra_threads),
            expand_scale: checked_expand_scale(
                env_parse("FACEGRAFT_EXPAND_SCALE", defaults.expand_scale),
                defaults.expand_scale,
            ),
            output_extension: std::env::var("FACEGRAFT_OUTPUT_EXT")
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .unwrap_or(defaults.output_extension),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.face_pack).join("det_10g.onnx")
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.face_pack).join("w600k_r50.onnx")
    }

    /// Path to the inswapper identity-transfer model.
    pub fn swapper_model_path(&self) -> PathBuf {
        self.swapper_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join("inswapper_128.onnx"))
    }

    /// Path to the inswapper latent projection matrix, next to the model by default.
    pub fn swapper_emap_path(&self) -> PathBuf {
        self.swapper_emap_path
            .clone()
            .unwrap_or_else(|| self.swapper_model_path().with_extension("emap"))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// A negative or non-finite scale would shrink or erase the transfer region.
fn checked_expand_scale(value: f32, default: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        tracing::warn!(
            value = %value,
            default,
            "FACEGRAFT_EXPAND_SCALE must be a finite non-negative number; using default"
        );
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_layout() {
        let config = Config {
            model_dir: PathBuf::from("/models"),
            ..Config::default()
        };
        assert_eq!(config.detector_model_path(), PathBuf::from("/models/buffalo_l/det_10g.onnx"));
        assert_eq!(config.recognizer_model_path(), PathBuf::from("/models/buffalo_l/w600k_r50.onnx"));
        assert_eq!(config.swapper_model_path(), PathBuf::from("/models/inswapper_128.onnx"));
        assert_eq!(config.swapper_emap_path(), PathBuf::from("/models/inswapper_128.emap"));
    }

    #[test]
    fn test_explicit_swapper_path_moves_emap() {
        let config = Config {
            swapper_path: Some(PathBuf::from("/opt/swap/inswapper_128.onnx")),
            ..Config::default()
        };
        assert_eq!(config.swapper_emap_path(), PathBuf::from("/opt/swap/inswapper_128.emap"));
    }

    #[test]
    fn test_expand_scale_rejects_invalid_values() {
        assert_eq!(checked_expand_scale(0.25, 0.18), 0.25);
        assert_eq!(checked_expand_scale(0.0, 0.18), 0.0);
        assert_eq!(checked_expand_scale(-0.6, 0.18), 0.18);
        assert_eq!(checked_expand_scale(f32::NAN, 0.18), 0.18);
        assert_eq!(checked_expand_scale(f32::INFINITY, 0.18), 0.18);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.device, "cpu");
        assert_eq!(config.det_size, 640);
        assert!((config.expand_scale - 0.18).abs() < 1e-6);
        assert_eq!(config.output_extension, "png");
    }
}
