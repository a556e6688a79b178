//! Parametric re-uploading circuit.
//!
//! Each layer applies one `RZ-RY-RZ` triple per (subchunk, qubit) pair,
//! subchunk-major and qubit-minor, taking the next unread row of the angle
//! tensor, then an entangling stage of CNOTs:
//!
//! ```text
//! layer l:  for v in 0..subchunks
//!             for q in 0..qubits
//!               RZ(phi[r,0]) RY(phi[r,1]) RZ(phi[r,2])  on q     r += 1
//!           entangle(topology)
//! ```
//!
//! Building produces a [`CircuitProgram`], a flat gate list plus the exact
//! sequence of angle rows read. State evolution is done by
//! [`Statevector`](crate::statevector::Statevector).

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use num_complex::Complex64;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoding::{self, DEFAULT_CHUNK_WIDTH, Parameters};
use crate::error::{DruError, DruResult};
use crate::statevector::Statevector;

/// Angles consumed by one rotation triple.
pub const ANGLES_PER_ROTATION: usize = DEFAULT_CHUNK_WIDTH;

/// Largest register the statevector engine accepts.
pub const MAX_QUBITS: usize = 20;

// ---------------------------------------------------------------------------
// Entanglement topology
// ---------------------------------------------------------------------------

/// Entangling stage applied after the rotations of every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Entanglement {
    /// CNOT chain `i → i+1`.
    #[default]
    Linear,
    /// CNOT on every pair `i < j`.
    Full,
    /// Linear chain plus a wrap-around `last → 0`.
    Circular,
    /// No entangling gates.
    None,
}

impl Entanglement {
    /// `(control, target)` pairs of one entangling stage, in application order.
    pub fn pairs(self, qubits: usize) -> Vec<(usize, usize)> {
        let chain = (0..qubits.saturating_sub(1)).map(|i| (i, i + 1));
        match self {
            Entanglement::Linear => chain.collect(),
            Entanglement::Full => (0..qubits)
                .flat_map(|i| (i + 1..qubits).map(move |j| (i, j)))
                .collect(),
            Entanglement::Circular => {
                let mut pairs: Vec<_> = chain.collect();
                if qubits >= 2 {
                    pairs.push((qubits - 1, 0));
                }
                pairs
            }
            Entanglement::None => Vec::new(),
        }
    }

    /// Number of CNOTs per layer.
    pub fn gate_count(self, qubits: usize) -> usize {
        match self {
            Entanglement::Linear => qubits.saturating_sub(1),
            Entanglement::Full => qubits * qubits.saturating_sub(1) / 2,
            Entanglement::Circular if qubits >= 2 => qubits,
            Entanglement::Circular => 0,
            Entanglement::None => 0,
        }
    }
}

impl FromStr for Entanglement {
    type Err = DruError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Entanglement::Linear),
            "full" => Ok(Entanglement::Full),
            "circular" => Ok(Entanglement::Circular),
            "none" => Ok(Entanglement::None),
            other => Err(DruError::Configuration(format!(
                "unknown entanglement mode '{other}' (expected linear, full, circular or none)"
            ))),
        }
    }
}

impl TryFrom<String> for Entanglement {
    type Error = DruError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for Entanglement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entanglement::Linear => "linear",
            Entanglement::Full => "full",
            Entanglement::Circular => "circular",
            Entanglement::None => "none",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Gates and programs
// ---------------------------------------------------------------------------

/// A gate of the re-uploading circuit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    /// Z rotation.
    Rz { qubit: usize, angle: f64 },
    /// Y rotation.
    Ry { qubit: usize, angle: f64 },
    /// Controlled-X.
    Cx { control: usize, target: usize },
}

impl Gate {
    /// Lowercase gate name.
    pub fn name(&self) -> &'static str {
        match self {
            Gate::Rz { .. } => "rz",
            Gate::Ry { .. } => "ry",
            Gate::Cx { .. } => "cx",
        }
    }

    /// True for two-qubit gates.
    pub fn is_entangling(&self) -> bool {
        matches!(self, Gate::Cx { .. })
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Rz { qubit, angle } | Gate::Ry { qubit, angle } => {
                write!(f, "{}({angle:.6}) q[{qubit}]", self.name())
            }
            Gate::Cx { control, target } => write!(f, "cx q[{control}], q[{target}]"),
        }
    }
}

/// A fully bound circuit ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitProgram {
    num_qubits: usize,
    gates: Vec<Gate>,
    angle_rows: Vec<usize>,
}

impl CircuitProgram {
    /// Register width.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Gates in application order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Angle-tensor rows in the order they were read.
    pub fn angle_rows(&self) -> &[usize] {
        &self.angle_rows
    }

    /// Number of single-qubit rotations.
    pub fn rotation_count(&self) -> usize {
        self.gates.iter().filter(|g| !g.is_entangling()).count()
    }

    /// Number of CNOTs.
    pub fn entangling_count(&self) -> usize {
        self.gates.iter().filter(|g| g.is_entangling()).count()
    }
}

impl fmt::Display for CircuitProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "qreg q[{}];", self.num_qubits)?;
        for gate in &self.gates {
            writeln!(f, "{gate};")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Circuit configuration
// ---------------------------------------------------------------------------

/// Shape of a re-uploading circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Number of re-uploading layers.
    pub layers: usize,
    /// Register width.
    pub qubits: usize,
    /// Entangling stage after each layer.
    #[serde(default)]
    pub entanglement: Entanglement,
}

impl CircuitConfig {
    /// Reject configurations no circuit can be built from.
    pub fn validate(&self) -> DruResult<()> {
        if self.layers == 0 {
            return Err(DruError::Configuration("layers must be at least 1".into()));
        }
        if self.qubits == 0 {
            return Err(DruError::Configuration("qubits must be at least 1".into()));
        }
        if self.qubits > MAX_QUBITS {
            return Err(DruError::Configuration(format!(
                "{} qubits exceeds the simulator limit of {MAX_QUBITS}",
                self.qubits
            )));
        }
        if self.entanglement == Entanglement::Circular && self.qubits < 2 {
            return Err(DruError::Configuration(
                "circular entanglement needs at least 2 qubits".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// State evaluation
// ---------------------------------------------------------------------------

/// Maps a feature vector and parameters to the final state vector.
pub trait StateEvaluator {
    /// Register width of the produced state.
    fn num_qubits(&self) -> usize;

    /// Evaluate the model on one sample. The result has `2^num_qubits`
    /// amplitudes.
    fn evaluate(&self, x: ArrayView1<'_, f64>, params: &Parameters) -> DruResult<Vec<Complex64>>;
}

/// The data re-uploading circuit over a validated [`CircuitConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReuploadingCircuit {
    config: CircuitConfig,
}

impl ReuploadingCircuit {
    /// Validate `config` and wrap it.
    pub fn new(config: CircuitConfig) -> DruResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration.
    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// Number of chunks a feature vector of `num_features` splits into.
    pub fn subchunks(num_features: usize) -> usize {
        num_features.div_ceil(ANGLES_PER_ROTATION)
    }

    /// Angle rows needed for a feature vector of `num_features`.
    pub fn rotation_slots(&self, num_features: usize) -> usize {
        Self::subchunks(num_features) * self.config.layers * self.config.qubits
    }

    /// Random initial parameters sized for `num_features`.
    pub fn init_parameters<R: Rng + ?Sized>(
        &self,
        num_features: usize,
        rng: &mut R,
    ) -> DruResult<Parameters> {
        if num_features == 0 {
            return Err(DruError::InvalidInput(
                "feature vectors must have at least one entry".into(),
            ));
        }
        encoding::init_parameters(
            Self::subchunks(num_features),
            self.config.layers,
            ANGLES_PER_ROTATION,
            self.config.qubits,
            rng,
        )
    }

    /// Encode `x` and lay out the full gate sequence.
    ///
    /// Fails with `ShapeMismatch` before any angle is read if the parameter
    /// rows do not equal `subchunks · layers · qubits`.
    pub fn build(&self, x: ArrayView1<'_, f64>, params: &Parameters) -> DruResult<CircuitProgram> {
        if x.is_empty() {
            return Err(DruError::InvalidInput(
                "cannot build a circuit for an empty feature vector".into(),
            ));
        }
        if params.chunk_width() != ANGLES_PER_ROTATION {
            return Err(DruError::ShapeMismatch(format!(
                "parameter rows have width {}, each rotation needs {ANGLES_PER_ROTATION}",
                params.chunk_width()
            )));
        }
        let CircuitConfig {
            layers,
            qubits,
            entanglement,
        } = self.config;
        let (chunks, subchunks) = encoding::reshape_to_chunks(x, ANGLES_PER_ROTATION)?;
        let expected = subchunks * layers * qubits;
        if params.rotation_slots() != expected {
            return Err(DruError::ShapeMismatch(format!(
                "{} angle rows supplied, circuit with {subchunks} subchunks, {layers} layers \
                 and {qubits} qubits reads {expected}",
                params.rotation_slots()
            )));
        }
        let phi = encoding::encode_angles_distributed(
            chunks.view(),
            params.theta().view(),
            params.w().view(),
        )?;

        let pairs = entanglement.pairs(qubits);
        let mut gates = Vec::with_capacity(layers * (subchunks * qubits * 3 + pairs.len()));
        let mut angle_rows = Vec::with_capacity(expected);
        let mut cursor = 0;
        for _ in 0..layers {
            for _ in 0..subchunks {
                for qubit in 0..qubits {
                    let row = phi.row(cursor);
                    gates.push(Gate::Rz { qubit, angle: row[0] });
                    gates.push(Gate::Ry { qubit, angle: row[1] });
                    gates.push(Gate::Rz { qubit, angle: row[2] });
                    angle_rows.push(cursor);
                    cursor += 1;
                }
            }
            gates.extend(
                pairs
                    .iter()
                    .map(|&(control, target)| Gate::Cx { control, target }),
            );
        }

        debug!(
            layers,
            qubits,
            subchunks,
            %entanglement,
            gates = gates.len(),
            "built re-uploading circuit"
        );
        Ok(CircuitProgram {
            num_qubits: qubits,
            gates,
            angle_rows,
        })
    }
}

impl StateEvaluator for ReuploadingCircuit {
    fn num_qubits(&self) -> usize {
        self.config.qubits
    }

    fn evaluate(&self, x: ArrayView1<'_, f64>, params: &Parameters) -> DruResult<Vec<Complex64>> {
        let program = self.build(x, params)?;
        Ok(Statevector::run(&program).into_amplitudes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn circuit(layers: usize, qubits: usize, entanglement: Entanglement) -> ReuploadingCircuit {
        ReuploadingCircuit::new(CircuitConfig {
            layers,
            qubits,
            entanglement,
        })
        .unwrap()
    }

    #[test]
    fn test_topology_sizes() {
        for q in 2..7 {
            assert_eq!(Entanglement::Linear.pairs(q).len(), q - 1);
            assert_eq!(Entanglement::Full.pairs(q).len(), q * (q - 1) / 2);
            assert_eq!(Entanglement::Circular.pairs(q).len(), q);
            assert!(Entanglement::None.pairs(q).is_empty());
            for e in [
                Entanglement::Linear,
                Entanglement::Full,
                Entanglement::Circular,
                Entanglement::None,
            ] {
                assert_eq!(e.pairs(q).len(), e.gate_count(q));
            }
        }
    }

    #[test]
    fn test_circular_wraps_around() {
        assert_eq!(
            Entanglement::Circular.pairs(3),
            vec![(0, 1), (1, 2), (2, 0)]
        );
    }

    #[test]
    fn test_parse_entanglement() {
        assert_eq!("linear".parse::<Entanglement>().unwrap(), Entanglement::Linear);
        assert_eq!("Full".parse::<Entanglement>().unwrap(), Entanglement::Full);
        assert_eq!("NONE".parse::<Entanglement>().unwrap(), Entanglement::None);
        assert!(matches!(
            "ring".parse::<Entanglement>(),
            Err(DruError::Configuration(_))
        ));
    }

    #[test]
    fn test_circular_single_qubit_rejected() {
        let config = CircuitConfig {
            layers: 1,
            qubits: 1,
            entanglement: Entanglement::Circular,
        };
        assert!(matches!(
            ReuploadingCircuit::new(config),
            Err(DruError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_layers_rejected() {
        let config = CircuitConfig {
            layers: 0,
            qubits: 2,
            entanglement: Entanglement::Linear,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gate_sequence_order() {
        let c = circuit(2, 2, Entanglement::Linear);
        let x = array![0.1, 0.2, 0.3, 0.4];
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let params = c.init_parameters(x.len(), &mut rng).unwrap();
        let program = c.build(x.view(), &params).unwrap();

        // 2 subchunks x 2 qubits x 3 rotations + 1 cx, per layer
        assert_eq!(program.gates().len(), 2 * (12 + 1));
        assert_eq!(program.rotation_count(), 24);
        assert_eq!(program.entangling_count(), 2);
        assert!(matches!(program.gates()[0], Gate::Rz { qubit: 0, .. }));
        assert!(matches!(program.gates()[1], Gate::Ry { qubit: 0, .. }));
        assert!(matches!(program.gates()[3], Gate::Rz { qubit: 1, .. }));
        assert!(matches!(program.gates()[6], Gate::Rz { qubit: 0, .. }));
        assert_eq!(
            program.gates()[12],
            Gate::Cx {
                control: 0,
                target: 1
            }
        );
        assert_eq!(program.angle_rows(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_angles_come_from_encoding() {
        let c = circuit(1, 1, Entanglement::None);
        let x = array![1.0, 2.0, 3.0];
        let params =
            Parameters::new(array![[0.5, 0.5, 0.5]], array![[2.0, 1.0, 0.0]]).unwrap();
        let program = c.build(x.view(), &params).unwrap();
        assert_eq!(
            program.gates(),
            &[
                Gate::Rz { qubit: 0, angle: 2.5 },
                Gate::Ry { qubit: 0, angle: 2.5 },
                Gate::Rz { qubit: 0, angle: 0.5 },
            ]
        );
    }

    #[test]
    fn test_row_mismatch_rejected() {
        let c = circuit(2, 2, Entanglement::Linear);
        let x = array![0.1, 0.2, 0.3];
        let params = Parameters::new(Array2::zeros((3, 3)), Array2::zeros((3, 3))).unwrap();
        assert!(matches!(
            c.build(x.view(), &params),
            Err(DruError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_evaluate_returns_normalized_state() {
        let c = circuit(2, 3, Entanglement::Full);
        let x = array![0.3, -0.7, 1.1, 0.05];
        let mut rng = rand::rngs::mock::StepRng::new(7, 3);
        let params = c.init_parameters(x.len(), &mut rng).unwrap();
        let state = c.evaluate(x.view(), &params).unwrap();
        assert_eq!(state.len(), 8);
        let norm: f64 = state.iter().map(|a| a.norm_sqr()).sum();
        assert!((norm - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_program_display() {
        let c = circuit(1, 2, Entanglement::Linear);
        let x = array![0.0];
        let params = Parameters::new(Array2::zeros((2, 3)), Array2::zeros((2, 3))).unwrap();
        let text = c.build(x.view(), &params).unwrap().to_string();
        assert!(text.starts_with("qreg q[2];"));
        assert!(text.contains("cx q[0], q[1];"));
    }
}
