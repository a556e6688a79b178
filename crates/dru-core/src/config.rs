//! Run configuration.
//!
//! A run file holds the model shape and the training hyper-parameters:
//!
//! ```yaml
//! model:
//!   layers: 3
//!   entanglement: circular
//!   qubits: 2        # optional, defaults to ceil(log2 classes)
//! training:
//!   epochs: 200
//!   batch_size: 10
//!   cost: trace_distance
//!   seed: 7
//! ```
//!
//! Files ending in `.yaml`/`.yml` are read as YAML, everything else as JSON.
//! Missing fields take their defaults.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::circuit::{CircuitConfig, Entanglement};
use crate::cost::CostFunction;
use crate::error::{DruError, DruResult};
use crate::labels::required_qubits;
use crate::training::TrainConfig;

/// On-disk document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `serde_json`, pretty-printed on write.
    Json,
    /// `serde_yaml_ng`, for `.yaml` and `.yml`.
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml" | "yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Read and deserialize a JSON or YAML document.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> DruResult<T> {
    let contents = std::fs::read_to_string(path)?;
    match DocumentFormat::from_path(path) {
        DocumentFormat::Json => Ok(serde_json::from_str(&contents)?),
        DocumentFormat::Yaml => Ok(serde_yaml_ng::from_str(&contents)?),
    }
}

/// Serialize and write a JSON or YAML document.
pub(crate) fn write_document<T: Serialize>(path: &Path, value: &T) -> DruResult<()> {
    let contents = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => serde_json::to_string_pretty(value)?,
        DocumentFormat::Yaml => serde_yaml_ng::to_string(value)?,
    };
    std::fs::write(path, contents)?;
    Ok(())
}

/// Model shape; the register size may be left to the label count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of re-uploading layers.
    pub layers: usize,
    /// Register width; `None` picks `max(1, ceil(log2 classes))`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qubits: Option<usize>,
    /// Entangling stage after each layer.
    pub entanglement: Entanglement,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            layers: 2,
            qubits: None,
            entanglement: Entanglement::Linear,
        }
    }
}

impl ModelConfig {
    /// Resolve the circuit for `num_classes` classes.
    pub fn circuit_config(&self, num_classes: usize) -> DruResult<CircuitConfig> {
        let needed = required_qubits(num_classes).max(1);
        let qubits = self.qubits.unwrap_or(needed);
        if qubits < needed {
            return Err(DruError::Configuration(format!(
                "{num_classes} classes need at least {needed} qubits, configured {qubits}"
            )));
        }
        let config = CircuitConfig {
            layers: self.layers,
            qubits,
            entanglement: self.entanglement,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Everything a training run needs apart from the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Circuit shape.
    pub model: ModelConfig,
    /// Optimizer and stopping policy.
    pub training: TrainConfig,
}

impl RunConfig {
    /// Load from a JSON or YAML file and validate the training section.
    ///
    /// Unknown entanglement or cost names are configuration errors, not
    /// parse errors.
    pub fn from_file<P: AsRef<Path>>(path: P) -> DruResult<Self> {
        let document: serde_json::Value = read_document(path.as_ref())?;
        Self::from_document(document)
    }

    fn from_document(document: serde_json::Value) -> DruResult<Self> {
        if let Some(mode) = document.pointer("/model/entanglement").and_then(|v| v.as_str()) {
            mode.parse::<Entanglement>()?;
        }
        if let Some(cost) = document.pointer("/training/cost").and_then(|v| v.as_str()) {
            cost.parse::<CostFunction>()?;
        }
        let config: RunConfig = serde_json::from_value(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Write to a JSON or YAML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> DruResult<()> {
        write_document(path.as_ref(), self)
    }

    /// Check everything that does not depend on the data.
    pub fn validate(&self) -> DruResult<()> {
        if self.model.layers == 0 {
            return Err(DruError::Configuration("layers must be at least 1".into()));
        }
        if self.model.qubits == Some(0) {
            return Err(DruError::Configuration("qubits must be at least 1".into()));
        }
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("run.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("run.YAML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("run.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("run")), DocumentFormat::Json);
    }

    #[test]
    fn test_yaml_with_defaults() {
        let yaml = "model:\n  layers: 3\n  entanglement: full\ntraining:\n  cost: renyi_two\n  epochs: 20\n";
        let config: RunConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.model.layers, 3);
        assert_eq!(config.model.entanglement, Entanglement::Full);
        assert_eq!(config.model.qubits, None);
        assert_eq!(config.training.cost, CostFunction::RenyiTwo);
        assert_eq!(config.training.epochs, 20);
        assert_eq!(config.training.batch_size, 10);
    }

    #[test]
    fn test_unknown_entanglement_fails_to_parse() {
        let json = r#"{"model": {"entanglement": "star"}}"#;
        assert!(serde_json::from_str::<RunConfig>(json).is_err());
    }

    #[test]
    fn test_unknown_modes_in_run_file_are_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "model:\n  entanglement: star\n").unwrap();
        assert!(matches!(
            RunConfig::from_file(&path),
            Err(DruError::Configuration(_))
        ));

        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"training": {"cost": "hellinger"}}"#).unwrap();
        assert!(matches!(
            RunConfig::from_file(&path),
            Err(DruError::Configuration(_))
        ));
    }

    #[test]
    fn test_run_file_names_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yml");
        std::fs::write(&path, "model:\n  entanglement: Circular\ntraining:\n  cost: Trace-Distance\n").unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.model.entanglement, Entanglement::Circular);
        assert_eq!(config.training.cost, CostFunction::TraceDistance);
    }

    #[test]
    fn test_circuit_config_defaults_qubits() {
        let model = ModelConfig::default();
        assert_eq!(model.circuit_config(2).unwrap().qubits, 1);
        assert_eq!(model.circuit_config(3).unwrap().qubits, 2);
        assert_eq!(model.circuit_config(1).unwrap().qubits, 1);
    }

    #[test]
    fn test_circuit_config_register_too_small() {
        let model = ModelConfig {
            qubits: Some(1),
            ..ModelConfig::default()
        };
        assert!(matches!(
            model.circuit_config(4),
            Err(DruError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_layers() {
        let config = RunConfig {
            model: ModelConfig {
                layers: 0,
                ..ModelConfig::default()
            },
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
