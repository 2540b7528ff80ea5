use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use facegraft::{
    is_manifest, read_manifest, BatchOrchestrator, BatchRecord, Config, FailureRecord, ModelRegistry,
    OnnxModelLoader,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facegraft", about = "Transfer a subject's face onto illustrated pages")]
struct Cli {
    /// Inference device: cpu, cuda or cuda:N (overrides FACEGRAFT_DEVICE)
    #[arg(long, global = true)]
    device: Option<String>,
    /// Model directory (overrides FACEGRAFT_MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Swap the subject's face onto one image
    ///
    /// A `.json` target is read as a list of pages and `output` as the
    /// directory to write them to.
    Swap {
        /// Photo of the subject
        source: PathBuf,
        /// Illustration to receive the face, or a JSON list of illustrations
        target: PathBuf,
        /// Output image, or output directory for a JSON list
        output: PathBuf,
    },
    /// Swap the subject's face onto every page, writing swapped-<n>.<ext>
    Batch {
        /// Photo of the subject
        source: PathBuf,
        /// Pages in order
        targets: Vec<PathBuf>,
        /// JSON array of page paths, appended after any listed targets
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Directory for the swapped pages
        #[arg(short, long)]
        output_dir: PathBuf,
    },
    /// Report which model files are present
    Models,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(error = %message, "facegraft failed");
            // stdout is reserved for JSON; nothing else to do if it is gone.
            let _ = emit(&FailureRecord::new(message));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(device) = cli.device {
        config.device = device;
    }
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::Swap {
            source,
            target,
            output,
        } => {
            require_file("source", &source)?;
            if is_manifest(&target) {
                let targets = read_manifest(&target)?;
                return run_batch(config, &source, &targets, &output);
            }
            require_file("target", &target)?;

            let registry = ModelRegistry::new(OnnxModelLoader::new(config.clone()));
            let result = BatchOrchestrator::from_config(&registry, &config)
                .swap_single(&source, &target, &output)?;
            emit(&result)
        }
        Commands::Batch {
            source,
            mut targets,
            manifest,
            output_dir,
        } => {
            require_file("source", &source)?;
            if let Some(manifest) = manifest {
                targets.extend(read_manifest(&manifest)?);
            }
            if targets.is_empty() {
                bail!("no target pages given; list them or pass --manifest");
            }
            run_batch(config, &source, &targets, &output_dir)
        }
        Commands::Models => models(&config),
    }
}

fn run_batch(config: Config, source: &Path, targets: &[PathBuf], output_dir: &Path) -> Result<()> {
    tracing::info!(pages = targets.len(), output_dir = %output_dir.display(), "starting batch");
    let registry = ModelRegistry::new(OnnxModelLoader::new(config.clone()));
    let summary = BatchOrchestrator::from_config(&registry, &config).run_batch(source, targets, output_dir)?;
    emit(&BatchRecord::from(&summary))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactStatus {
    name: &'static str,
    path: PathBuf,
    present: bool,
    /// The emap sidecar is optional; the swapper reads the matrix from the model otherwise.
    required: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelsReport {
    model_dir: PathBuf,
    device: String,
    ready: bool,
    artifacts: Vec<ArtifactStatus>,
}

fn models(config: &Config) -> Result<()> {
    let artifacts: Vec<ArtifactStatus> = [
        ("detector", config.detector_model_path(), true),
        ("recognizer", config.recognizer_model_path(), true),
        ("swapper", config.swapper_model_path(), true),
        ("swapper_emap", config.swapper_emap_path(), false),
    ]
    .into_iter()
    .map(|(name, path, required)| ArtifactStatus {
        name,
        present: path.is_file(),
        path,
        required,
    })
    .collect();

    for missing in artifacts.iter().filter(|a| a.required && !a.present) {
        tracing::warn!(artifact = missing.name, path = %missing.path.display(), "model file missing");
    }

    emit(&ModelsReport {
        model_dir: config.model_dir.clone(),
        device: config.device.clone(),
        ready: artifacts.iter().all(|a| a.present || !a.required),
        artifacts,
    })
}

fn require_file(role: &str, path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("{role} file not found: {}", path.display());
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
