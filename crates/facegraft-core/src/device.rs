//! Execution device selection for ONNX Runtime sessions.

use crate::ports::ModelError;
use ort::session::Session;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA device, with CPU registered after it as the fallback.
    Cuda { device_id: i32 },
}

impl FromStr for Device {
    type Err = ModelError;

    /// Accepts `cpu`, `cuda`, `gpu` and `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda { device_id: 0 }),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse::<i32>().ok())
                .filter(|id| *id >= 0)
                .map(|device_id| Device::Cuda { device_id })
                .ok_or_else(|| ModelError::UnsupportedDevice(s.to_string())),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

/// Open an ONNX session on `device`, registering CPU after any accelerator.
pub(crate) fn load_session(
    model_path: &Path,
    device: Device,
    intra_threads: usize,
) -> Result<Session, ort::Error> {
    let cpu = ort::execution_providers::CPUExecutionProvider::default().build();

    let providers = match device {
        Device::Cpu => vec![cpu],
        #[cfg(feature = "cuda")]
        Device::Cuda { device_id } => {
            let cuda = ort::execution_providers::CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build();
            // ORT skips providers that fail to register, so CPU takes over.
            vec![cuda, cpu]
        }
        #[cfg(not(feature = "cuda"))]
        Device::Cuda { device_id } => {
            tracing::warn!(
                device_id,
                "CUDA requested but built without the `cuda` feature; falling back to CPU"
            );
            vec![cpu]
        }
    };

    let session = Session::builder()?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(providers)?
        .commit_from_file(model_path)?;

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!(" CPU ".parse::<Device>().unwrap(), Device::Cpu);
    }

    #[test]
    fn test_parse_cuda() {
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda { device_id: 0 });
        assert_eq!("gpu".parse::<Device>().unwrap(), Device::Cuda { device_id: 0 });
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda { device_id: 2 });
    }

    #[test]
    fn test_parse_unsupported() {
        for bad in ["tpu", "cuda:", "cuda:x", "cuda:-1", ""] {
            let err = bad.parse::<Device>().unwrap_err();
            assert!(matches!(err, ModelError::UnsupportedDevice(_)), "{bad}");
        }
    }

    #[test]
    fn test_display_roundtrip() {
        for d in [Device::Cpu, Device::Cuda { device_id: 1 }] {
            assert_eq!(d.to_string().parse::<Device>().unwrap(), d);
        }
    }
}
