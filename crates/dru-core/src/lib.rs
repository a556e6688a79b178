//! `dru-core` — data re-uploading quantum classifiers.
//!
//! A classical feature vector is cut into chunks of three, combined affinely
//! with trainable tensors `theta` and `w`, and re-uploaded as `RZ-RY-RZ`
//! rotations in every layer of a parametric circuit. Training minimises a
//! density-matrix divergence between the circuit's output state and the
//! basis-state label of each sample.
//!
//! - [`encoding`] chunking, affine angle encoding, flat parameter vectors
//! - [`circuit`] gate layout, entanglement topologies, [`StateEvaluator`]
//! - [`cost`] fidelity, trace distance, von Neumann and Rényi divergences
//! - [`training`] mini-batch Adam with early and accuracy stopping
//! - [`predict`] / [`metrics`] predictions, confusion matrices, ROC/AUC
//!
//! # Quick start
//!
//! ```rust
//! use dru_core::{CircuitConfig, Dataset, Entanglement, LabelSet, ReuploadingCircuit,
//!                TrainConfig, Trainer};
//! use ndarray::array;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let data = Dataset::new(array![[0.1, 0.2], [2.9, 3.0]], vec![0, 1]).unwrap();
//! let circuit = ReuploadingCircuit::new(CircuitConfig {
//!     layers: 1,
//!     qubits: 1,
//!     entanglement: Entanglement::None,
//! })
//! .unwrap();
//! let labels = LabelSet::new(2).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let init = circuit.init_parameters(data.num_features(), &mut rng).unwrap();
//! let config = TrainConfig { epochs: 2, batch_size: 2, ..TrainConfig::default() };
//! let outcome = Trainer::new(&circuit, &labels, config)
//!     .unwrap()
//!     .fit(&data, &data, &init, &mut rng)
//!     .unwrap();
//! assert!(outcome.epochs_run() >= 1);
//! ```

pub mod circuit;
pub mod config;
pub mod cost;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod labels;
pub mod linalg;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod predict;
pub mod statevector;
pub mod training;

pub use circuit::{
    CircuitConfig, CircuitProgram, Entanglement, Gate, ReuploadingCircuit, StateEvaluator,
};
pub use config::{ModelConfig, RunConfig};
pub use cost::CostFunction;
pub use dataset::Dataset;
pub use encoding::{ParamShapes, Parameters, flatten_params, reshape_params};
pub use error::{DruError, DruResult};
pub use labels::LabelSet;
pub use metrics::{Evaluation, evaluate_classification};
pub use model::SavedModel;
pub use optimizer::{AdamOptimizer, FiniteDifference, Optimizer};
pub use predict::{accuracy, predict, predict_proba};
pub use statevector::Statevector;
pub use training::{
    EpochRecord, NoopObserver, TrainConfig, TrainOutcome, Trainer, TrainingHistory,
    TrainingObserver, TrainingState,
};
