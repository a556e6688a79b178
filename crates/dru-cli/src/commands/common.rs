//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use dru_core::config::DocumentFormat;
use dru_core::{Dataset, Evaluation, RunConfig, SavedModel};

/// Output format of `predict` and `evaluate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Parse a `--format` value.
pub fn parse_format(format: &str) -> Result<OutputFormat> {
    match format.to_lowercase().as_str() {
        "table" | "text" => Ok(OutputFormat::Table),
        "json" => Ok(OutputFormat::Json),
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }
}

fn ensure_exists(path: &str) -> Result<()> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    Ok(())
}

/// Load a run configuration.
pub fn load_run_config(path: &str) -> Result<RunConfig> {
    ensure_exists(path)?;
    RunConfig::from_file(path).with_context(|| format!("Failed to load configuration: {path}"))
}

/// Load a labelled dataset.
pub fn load_dataset(path: &str) -> Result<Dataset> {
    ensure_exists(path)?;
    Dataset::from_file(path).with_context(|| format!("Failed to load dataset: {path}"))
}

/// Load a trained model.
pub fn load_model(path: &str) -> Result<SavedModel> {
    ensure_exists(path)?;
    SavedModel::from_file(path).with_context(|| format!("Failed to load model: {path}"))
}

/// Feature rows with labels when the file carries them.
#[derive(Debug, Clone)]
pub struct Samples {
    pub features: Array2<f64>,
    pub labels: Option<Vec<usize>>,
}

#[derive(Deserialize)]
struct SampleFile {
    features: Vec<Vec<f64>>,
    #[serde(default)]
    labels: Option<Vec<usize>>,
}

/// Load samples for prediction; `labels` may be absent.
pub fn load_samples(path: &str) -> Result<Samples> {
    ensure_exists(path)?;
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    let file: SampleFile = match DocumentFormat::from_path(Path::new(path)) {
        DocumentFormat::Yaml => serde_yaml_ng::from_str(&source)
            .with_context(|| format!("Failed to parse YAML: {path}"))?,
        DocumentFormat::Json => serde_json::from_str(&source)
            .with_context(|| format!("Failed to parse JSON: {path}"))?,
    };

    let rows = file.features.len();
    let width = file.features.first().map_or(0, Vec::len);
    if let Some(i) = file.features.iter().position(|r| r.len() != width) {
        anyhow::bail!("{path}: row {i} has {} features, row 0 has {width}", file.features[i].len());
    }
    if let Some(labels) = &file.labels {
        if labels.len() != rows {
            anyhow::bail!("{path}: {rows} feature rows but {} labels", labels.len());
        }
    }
    let features = Array2::from_shape_vec((rows, width), file.features.into_iter().flatten().collect())?;
    Ok(Samples {
        features,
        labels: file.labels,
    })
}

/// Serialize `value` as pretty JSON into `path`.
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write file: {path}"))?;
    Ok(())
}

/// Seeded RNG, or one drawn from system entropy.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Print confusion matrices, reports and the ROC summary.
pub fn print_evaluation(evaluation: &Evaluation) {
    for (name, split) in [("Train", &evaluation.train), ("Validation", &evaluation.validation)] {
        println!(
            "\n{} {} ({} samples, accuracy {:.4})",
            style("■").cyan().bold(),
            style(name).bold(),
            split.confusion.total(),
            split.report.accuracy
        );
        println!("\n{}", split.confusion);
        print!("{}", split.report);
    }

    if let Some(roc) = &evaluation.roc {
        println!(
            "\n{} ROC (positive class {}): AUC = {}",
            style("■").cyan().bold(),
            roc.positive_class,
            style(format!("{:.4}", roc.auc)).yellow()
        );
        println!("  {} thresholds", roc.curve.fpr.len());
    }
}
