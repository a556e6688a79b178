//! Trained-model persistence.
//!
//! A saved model is the flattened parameter vector with its two shape
//! tuples, plus enough context to rebuild the circuit and label set.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::circuit::{ANGLES_PER_ROTATION, CircuitConfig, ReuploadingCircuit};
use crate::config::{read_document, write_document};
use crate::cost::CostFunction;
use crate::encoding::{ParamShapes, Parameters, reshape_params};
use crate::error::{DruError, DruResult};
use crate::labels::LabelSet;
use crate::training::{TrainOutcome, TrainingState};

/// Current on-disk schema.
pub const SCHEMA_VERSION: u32 = 1;

/// A trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedModel {
    /// Must equal [`SCHEMA_VERSION`].
    pub schema_version: u32,
    /// When the model was captured.
    pub created_at: DateTime<Utc>,
    /// Layers, register width and entanglement.
    pub circuit: CircuitConfig,
    /// Number of label states.
    pub num_classes: usize,
    /// Feature width of every sample.
    pub num_features: usize,
    /// Cost the parameters were trained against.
    pub cost: CostFunction,
    /// Shapes of `theta` and `w`.
    pub shapes: ParamShapes,
    /// `theta` then `w`, row-major.
    pub params: Vec<f64>,
    /// How training ended.
    pub state: TrainingState,
    /// Lowest epoch loss, absent when no epoch ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_loss: Option<f64>,
    /// Validation accuracy at the lowest loss.
    pub best_acc_val: f64,
}

impl SavedModel {
    /// Capture the best parameters of a finished run.
    pub fn from_outcome(
        circuit: CircuitConfig,
        num_classes: usize,
        num_features: usize,
        cost: CostFunction,
        outcome: &TrainOutcome,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            circuit,
            num_classes,
            num_features,
            cost,
            shapes: outcome.shapes,
            params: outcome.best_params.to_vec(),
            state: outcome.state,
            best_loss: outcome.best_loss,
            best_acc_val: outcome.best_acc_val,
        }
    }

    /// Load and validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> DruResult<Self> {
        let model: SavedModel = read_document(path.as_ref())?;
        model.validate()?;
        info!(
            path = %path.as_ref().display(),
            classes = model.num_classes,
            parameters = model.params.len(),
            "loaded model"
        );
        Ok(model)
    }

    /// Write as JSON (or YAML for `.yaml`/`.yml`).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> DruResult<()> {
        write_document(path.as_ref(), self)
    }

    /// Check the schema, circuit and parameter shapes agree.
    pub fn validate(&self) -> DruResult<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(DruError::Serialization(format!(
                "unsupported model schema {} (expected {SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        self.circuit.validate()?;
        if self.shapes.theta != self.shapes.w {
            return Err(DruError::ShapeMismatch(format!(
                "stored shapes differ: theta {:?}, w {:?}",
                self.shapes.theta, self.shapes.w
            )));
        }
        if self.shapes.theta.1 != ANGLES_PER_ROTATION {
            return Err(DruError::ShapeMismatch(format!(
                "parameter rows are {} wide, each rotation takes {ANGLES_PER_ROTATION} angles",
                self.shapes.theta.1
            )));
        }
        let expected_rows = ReuploadingCircuit::subchunks(self.num_features)
            * self.circuit.layers
            * self.circuit.qubits;
        if self.shapes.theta.0 != expected_rows {
            return Err(DruError::ShapeMismatch(format!(
                "{} parameter rows stored, circuit for {} features needs {expected_rows}",
                self.shapes.theta.0, self.num_features
            )));
        }
        self.parameters().map(|_| ())
    }

    /// `theta` and `w`.
    pub fn parameters(&self) -> DruResult<Parameters> {
        reshape_params(ndarray::ArrayView1::from(&self.params[..]), &self.shapes)
    }

    /// The circuit these parameters belong to.
    pub fn circuit(&self) -> DruResult<ReuploadingCircuit> {
        ReuploadingCircuit::new(self.circuit)
    }

    /// The label states on the circuit's register.
    pub fn labels(&self) -> DruResult<LabelSet> {
        LabelSet::for_register(self.num_classes, self.circuit.qubits)
    }
}
