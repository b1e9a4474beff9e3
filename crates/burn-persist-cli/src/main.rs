//! burn-persist CLI
//!
//! Inspect and verify model directories written by `burn-persist`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use burn::prelude::*;
use burn_ndarray::NdArray;
use burn_persist::{load_model, ModelDirectory, PersistentModel};
use burn_persist_nn::{Sequential, SequentialConfig};
use clap::{Parser, Subcommand};

type CpuBackend = NdArray<f32>;

#[derive(Parser)]
#[command(name = "burn-persist")]
#[command(about = "Inspect and verify persisted model directories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a model directory's architecture document
    Inspect {
        /// Model directory
        dir: PathBuf,

        /// Also load the weights container and list parameters per layer
        #[arg(short, long)]
        weights: bool,
    },

    /// Load a model directory as a Sequential model on the CPU
    Verify {
        /// Model directory
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("burn_persist=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Inspect { dir, weights } => inspect(&dir, weights)?,
        Commands::Verify { dir } => verify(&dir)?,
    };
    print!("{report}");

    Ok(())
}

fn inspect(dir: &Path, show_weights: bool) -> Result<String> {
    let directory = ModelDirectory::new(dir);
    let document = directory
        .read_architecture()
        .with_context(|| format!("Failed to read architecture in {}", dir.display()))?;

    let mut out = String::new();
    writeln!(out, "Directory: {}", dir.display())?;
    writeln!(out, "Class: {}", document.class_name)?;
    writeln!(out, "Format version: {}", document.format_version)?;
    if let Some(generator) = &document.generator {
        writeln!(out, "Generator: {generator}")?;
    }

    let is_sequential =
        document.class_name == <Sequential<CpuBackend> as PersistentModel<CpuBackend>>::CLASS_NAME;
    if is_sequential {
        let config: SequentialConfig = serde_json::from_value(document.config.clone())
            .context("Failed to parse Sequential config")?;
        let summary = config.summary()?;

        writeln!(out, "Input: {:?} ({:?})", config.input.shape, config.input.dtype)?;
        writeln!(out, "\n{:<20} {:<20} {:<16} {:>10}", "Layer", "Class", "Output", "Params")?;
        for layer in &summary {
            writeln!(
                out,
                "{:<20} {:<20} {:<16} {:>10}",
                layer.name,
                layer.class_name,
                layer.output_shape.to_string(),
                layer.params
            )?;
        }
        let total: usize = summary.iter().map(|l| l.params).sum();
        writeln!(out, "\nTotal params: {total}")?;
    }

    if show_weights {
        let path = directory.weights_path();
        let size = std::fs::metadata(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .len();
        writeln!(out, "\nWeights: {} ({size} bytes)", path.display())?;

        if is_sequential {
            let model = load_sequential(dir)?;
            for (layer, config) in model.layers.iter().zip(model.config().layers.iter()) {
                writeln!(out, "{}: {}", config.name(), layer.num_params())?;
            }
        }
    }

    Ok(out)
}

fn load_sequential(dir: &Path) -> Result<Sequential<CpuBackend>> {
    let device = Default::default();
    load_model::<CpuBackend, Sequential<CpuBackend>, _>(dir, &device)
        .with_context(|| format!("Failed to load {}", dir.display()))
}

fn verify(dir: &Path) -> Result<String> {
    if !ModelDirectory::new(dir).exists() {
        bail!("{} is not a model directory", dir.display());
    }

    tracing::debug!(dir = %dir.display(), "verifying model directory");
    let model = load_sequential(dir)?;

    let output = model.config().output_shape()?;
    Ok(format!(
        "OK: {} layers, {} params, output {}\n",
        model.layers.len(),
        model.num_params(),
        output
    ))
}
