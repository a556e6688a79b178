//! Mini-batch training with early and accuracy stopping.
//!
//! One epoch:
//!
//! 1. shuffle the training set with the caller's RNG and cut it into
//!    contiguous batches of `batch_size` (the last may be shorter);
//! 2. per batch, take one optimizer step on the mean batch cost and record
//!    the cost at the updated parameters;
//! 3. average the batch losses and re-predict the full training and
//!    validation sets for the accuracies;
//! 4. append an [`EpochRecord`] and feed [`EarlyStopping`].
//!
//! The run ends in one of three terminal [`TrainingState`]s, reported in
//! [`TrainOutcome::state`].

use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::circuit::StateEvaluator;
use crate::cost::CostFunction;
use crate::dataset::Dataset;
use crate::encoding::{ParamShapes, Parameters, flatten_params, reshape_params};
use crate::error::{DruError, DruResult, ensure_finite};
use crate::labels::LabelSet;
use crate::linalg::outer_product;
use crate::optimizer::{AdamConfig, AdamOptimizer, DEFAULT_GRADIENT_STEP, FiniteDifference, Optimizer};
use crate::predict::accuracy;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Training hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Epoch budget.
    pub epochs: usize,
    /// Samples per optimizer step.
    pub batch_size: usize,
    /// Adam step size.
    pub stepsize: f64,
    /// Non-improving epochs tolerated before stopping.
    pub patience: usize,
    /// Minimum loss decrease that counts as an improvement.
    pub min_delta: f64,
    /// Stop as soon as validation accuracy exceeds this.
    pub acc_stop: f64,
    /// Cost function.
    pub cost: CostFunction,
    /// Seed for initialisation and shuffling; random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Finite-difference probe distance.
    pub gradient_step: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 500,
            batch_size: 10,
            stepsize: 0.05,
            patience: 100,
            min_delta: 1e-4,
            acc_stop: 0.98,
            cost: CostFunction::Fidelity,
            seed: None,
            gradient_step: DEFAULT_GRADIENT_STEP,
        }
    }
}

impl TrainConfig {
    /// Reject values no run can use.
    pub fn validate(&self) -> DruResult<()> {
        if self.batch_size == 0 {
            return Err(DruError::Configuration("batch_size must be at least 1".into()));
        }
        if !self.stepsize.is_finite() || self.stepsize <= 0.0 {
            return Err(DruError::Configuration(format!(
                "stepsize must be positive, got {}",
                self.stepsize
            )));
        }
        if !self.min_delta.is_finite() || self.min_delta < 0.0 {
            return Err(DruError::Configuration(format!(
                "min_delta must be non-negative, got {}",
                self.min_delta
            )));
        }
        if self.acc_stop.is_nan() {
            return Err(DruError::Configuration("acc_stop must be a number".into()));
        }
        if !self.gradient_step.is_finite() || self.gradient_step <= 0.0 {
            return Err(DruError::Configuration(format!(
                "gradient_step must be positive, got {}",
                self.gradient_step
            )));
        }
        Ok(())
    }

    /// The Adam optimizer these settings describe.
    pub fn optimizer(&self) -> DruResult<AdamOptimizer> {
        AdamOptimizer::with_config(
            AdamConfig {
                stepsize: self.stepsize,
                ..AdamConfig::default()
            },
            FiniteDifference::new(self.gradient_step)?,
        )
    }
}

// ---------------------------------------------------------------------------
// State and history
// ---------------------------------------------------------------------------

/// Where a training run is, or why it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    /// Still iterating.
    Running,
    /// `patience` epochs without sufficient improvement.
    EarlyStopped,
    /// Validation accuracy passed `acc_stop`.
    AccuracyStopped,
    /// Epoch budget exhausted.
    Completed,
}

impl TrainingState {
    /// True for every state but `Running`.
    pub fn is_terminal(self) -> bool {
        self != TrainingState::Running
    }
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrainingState::Running => "running",
            TrainingState::EarlyStopped => "early stopped",
            TrainingState::AccuracyStopped => "accuracy stopped",
            TrainingState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Metrics and parameter snapshot of one finished epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 0-based epoch index.
    pub epoch: usize,
    /// Mean post-step batch loss.
    pub loss: f64,
    /// Accuracy on the full training set.
    pub acc_train: f64,
    /// Accuracy on the validation set.
    pub acc_val: f64,
    /// Flattened parameters at the end of the epoch.
    pub params: Vec<f64>,
}

/// Append-only list of epoch records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingHistory {
    records: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub(crate) fn push(&mut self, record: EpochRecord) {
        self.records.push(record);
    }

    /// All records in epoch order.
    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    /// Number of recorded epochs.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True before the first epoch finished.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The most recent record.
    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    /// Epoch losses.
    pub fn losses(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.loss).collect()
    }

    /// Training accuracies.
    pub fn train_accuracies(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.acc_train).collect()
    }

    /// Validation accuracies.
    pub fn val_accuracies(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.acc_val).collect()
    }

    /// Moving average of the losses over full windows only; entry `i`
    /// averages epochs `i..i + window`. Empty when fewer than `window`
    /// epochs were recorded.
    pub fn loss_moving_average(&self, window: usize) -> DruResult<Vec<f64>> {
        if window == 0 {
            return Err(DruError::InvalidInput("window must be at least 1".into()));
        }
        let losses = self.losses();
        Ok(losses
            .windows(window)
            .map(|w| w.iter().sum::<f64>() / window as f64)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Stopping policy
// ---------------------------------------------------------------------------

/// Tracks the best loss and decides when to stop.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_delta: f64,
    acc_stop: f64,
    best_loss: f64,
    best_acc_val: f64,
    best_params: Array1<f64>,
    wait: usize,
}

impl EarlyStopping {
    /// Start with `best_loss = +∞` and `init_params` as the best snapshot.
    pub fn new(patience: usize, min_delta: f64, acc_stop: f64, init_params: Array1<f64>) -> Self {
        Self {
            patience,
            min_delta,
            acc_stop,
            best_loss: f64::INFINITY,
            best_acc_val: 0.0,
            best_params: init_params,
            wait: 0,
        }
    }

    /// Update with one epoch's results.
    ///
    /// The best-loss bookkeeping runs first. Accuracy stopping then takes
    /// precedence over an exhausted patience window in the same epoch.
    pub fn observe(&mut self, loss: f64, acc_val: f64, params: &Array1<f64>) -> TrainingState {
        let exhausted = if loss < self.best_loss - self.min_delta {
            self.best_loss = loss;
            self.best_params = params.clone();
            self.best_acc_val = acc_val;
            self.wait = 0;
            false
        } else {
            self.wait += 1;
            self.wait >= self.patience
        };

        if acc_val > self.acc_stop {
            TrainingState::AccuracyStopped
        } else if exhausted {
            TrainingState::EarlyStopped
        } else {
            TrainingState::Running
        }
    }

    /// Lowest loss seen, `None` before the first improvement.
    pub fn best_loss(&self) -> Option<f64> {
        self.best_loss.is_finite().then_some(self.best_loss)
    }

    /// Validation accuracy at the best loss.
    pub fn best_acc_val(&self) -> f64 {
        self.best_acc_val
    }

    /// Parameters at the best loss.
    pub fn best_params(&self) -> &Array1<f64> {
        &self.best_params
    }

    /// Epochs since the last improvement.
    pub fn wait(&self) -> usize {
        self.wait
    }

    fn into_best_params(self) -> Array1<f64> {
        self.best_params
    }
}

// ---------------------------------------------------------------------------
// Outcome and observers
// ---------------------------------------------------------------------------

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Flattened parameters at the lowest epoch loss.
    pub best_params: Array1<f64>,
    /// Shapes to unflatten `best_params`.
    pub shapes: ParamShapes,
    /// Lowest epoch loss; `None` if no epoch ran.
    pub best_loss: Option<f64>,
    /// Validation accuracy at the lowest loss.
    pub best_acc_val: f64,
    /// Per-epoch records.
    pub history: TrainingHistory,
    /// Why the run ended.
    pub state: TrainingState,
}

impl TrainOutcome {
    /// Number of epochs that ran.
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }

    /// `best_params` reshaped into `theta` and `w`.
    pub fn best_parameters(&self) -> DruResult<Parameters> {
        reshape_params(self.best_params.view(), &self.shapes)
    }
}

/// Progress hooks for a training run.
pub trait TrainingObserver {
    /// Called once before the first epoch with the epoch budget.
    fn on_start(&mut self, _epochs: usize) {}

    /// Called after every epoch with the state it produced.
    fn on_epoch(&mut self, _record: &EpochRecord, _state: TrainingState) {}

    /// Called once with the final outcome.
    fn on_finish(&mut self, _outcome: &TrainOutcome) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {}

// ---------------------------------------------------------------------------
// Batch cost
// ---------------------------------------------------------------------------

/// Mean cost of a batch at the flattened parameters `flat`.
pub fn batch_cost<E: StateEvaluator + ?Sized>(
    evaluator: &E,
    labels: &LabelSet,
    cost: CostFunction,
    flat: ArrayView1<'_, f64>,
    shapes: &ParamShapes,
    features: ArrayView2<'_, f64>,
    targets: &[usize],
) -> DruResult<f64> {
    if targets.is_empty() {
        return Err(DruError::EmptyDataset("batch"));
    }
    if targets.len() != features.nrows() {
        return Err(DruError::ShapeMismatch(format!(
            "{} labels for {} samples in batch",
            targets.len(),
            features.nrows()
        )));
    }
    let params = reshape_params(flat, shapes)?;
    let mut total = 0.0;
    for (x, &y) in features.rows().into_iter().zip(targets) {
        let state = evaluator.evaluate(x, &params)?;
        if state.len() != labels.dimension() {
            return Err(DruError::ShapeMismatch(format!(
                "state has {} amplitudes, labels live in dimension {}",
                state.len(),
                labels.dimension()
            )));
        }
        let pred = outer_product(&state);
        total += cost.evaluate(&pred, labels.density_matrix(y)?)?;
    }
    ensure_finite(total / targets.len() as f64, format!("{cost} batch cost"))
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Fits re-uploading parameters against a label set.
pub struct Trainer<'a, E: StateEvaluator + ?Sized> {
    evaluator: &'a E,
    labels: &'a LabelSet,
    config: TrainConfig,
}

impl<'a, E: StateEvaluator + ?Sized> Trainer<'a, E> {
    /// Validate `config` and check the evaluator's register matches the
    /// labels.
    pub fn new(evaluator: &'a E, labels: &'a LabelSet, config: TrainConfig) -> DruResult<Self> {
        config.validate()?;
        if evaluator.num_qubits() != labels.num_qubits() {
            return Err(DruError::ShapeMismatch(format!(
                "evaluator has {} qubits, labels use {}",
                evaluator.num_qubits(),
                labels.num_qubits()
            )));
        }
        Ok(Self {
            evaluator,
            labels,
            config,
        })
    }

    /// The training settings.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train with Adam as configured and no progress reporting.
    pub fn fit<R: Rng + ?Sized>(
        &self,
        train: &Dataset,
        validation: &Dataset,
        init: &Parameters,
        rng: &mut R,
    ) -> DruResult<TrainOutcome> {
        let mut optimizer = self.config.optimizer()?;
        self.fit_with(&mut optimizer, train, validation, init, rng, &mut NoopObserver)
    }

    /// Train with an explicit optimizer and observer.
    pub fn fit_with<O, R, Obs>(
        &self,
        optimizer: &mut O,
        train: &Dataset,
        validation: &Dataset,
        init: &Parameters,
        rng: &mut R,
        observer: &mut Obs,
    ) -> DruResult<TrainOutcome>
    where
        O: Optimizer,
        R: Rng + ?Sized,
        Obs: TrainingObserver + ?Sized,
    {
        self.check_inputs(train, validation, init)?;
        let TrainConfig {
            epochs,
            batch_size,
            patience,
            min_delta,
            acc_stop,
            cost,
            ..
        } = self.config;

        let (mut flat, shapes) = flatten_params(init);
        let mut stopper = EarlyStopping::new(patience, min_delta, acc_stop, flat.clone());
        let mut history = TrainingHistory::default();
        let mut state = TrainingState::Running;

        info!(
            train_samples = train.len(),
            validation_samples = validation.len(),
            parameters = flat.len(),
            epochs,
            batch_size,
            %cost,
            "starting training"
        );
        observer.on_start(epochs);

        let mut order: Vec<usize> = (0..train.len()).collect();
        for epoch in 0..epochs {
            order.shuffle(rng);
            let mut batch_losses = Vec::with_capacity(train.len().div_ceil(batch_size));
            for chunk in order.chunks(batch_size) {
                let batch = train.select(chunk)?;
                let objective = |p: ArrayView1<'_, f64>| {
                    batch_cost(
                        self.evaluator,
                        self.labels,
                        cost,
                        p,
                        &shapes,
                        batch.features(),
                        batch.labels(),
                    )
                };
                flat = optimizer.step(&objective, &flat)?;
                batch_losses.push(objective(flat.view())?);
            }

            let loss = ensure_finite(
                batch_losses.iter().sum::<f64>() / batch_losses.len() as f64,
                format!("epoch {epoch} loss"),
            )?;
            let params = reshape_params(flat.view(), &shapes)?;
            let acc_train = accuracy(self.evaluator, train.features(), train.labels(), &params)?;
            let acc_val = accuracy(
                self.evaluator,
                validation.features(),
                validation.labels(),
                &params,
            )?;

            state = stopper.observe(loss, acc_val, &flat);
            let record = EpochRecord {
                epoch,
                loss,
                acc_train,
                acc_val,
                params: flat.to_vec(),
            };
            debug!(
                epoch,
                loss,
                acc_train,
                acc_val,
                best_loss = stopper.best_loss(),
                wait = stopper.wait(),
                "epoch finished"
            );
            observer.on_epoch(&record, state);
            history.push(record);

            if state.is_terminal() {
                break;
            }
        }

        if state == TrainingState::Running {
            state = TrainingState::Completed;
        }
        info!(
            %state,
            epochs_run = history.len(),
            best_loss = stopper.best_loss(),
            best_acc_val = stopper.best_acc_val(),
            "training finished"
        );

        let outcome = TrainOutcome {
            best_loss: stopper.best_loss(),
            best_acc_val: stopper.best_acc_val(),
            best_params: stopper.into_best_params(),
            shapes,
            history,
            state,
        };
        observer.on_finish(&outcome);
        Ok(outcome)
    }

    fn check_inputs(&self, train: &Dataset, validation: &Dataset, init: &Parameters) -> DruResult<()> {
        if train.is_empty() {
            return Err(DruError::EmptyDataset("training set"));
        }
        if validation.is_empty() {
            return Err(DruError::EmptyDataset("validation set"));
        }
        if validation.num_features() != train.num_features() {
            return Err(DruError::ShapeMismatch(format!(
                "training samples have {} features, validation samples {}",
                train.num_features(),
                validation.num_features()
            )));
        }
        let classes = self.labels.num_classes();
        for (name, data) in [("training", train), ("validation", validation)] {
            if let Some(&bad) = data.labels().iter().find(|&&y| y >= classes) {
                return Err(DruError::InvalidInput(format!(
                    "{name} label {bad} out of range for {classes} classes"
                )));
            }
        }
        // Surface shape errors before the first optimizer step.
        self.evaluator.evaluate(train.features().row(0), init)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_values() {
        let c = TrainConfig::default();
        assert_eq!(c.epochs, 500);
        assert_eq!(c.batch_size, 10);
        assert_eq!(c.stepsize, 0.05);
        assert_eq!(c.patience, 100);
        assert_eq!(c.min_delta, 1e-4);
        assert_eq!(c.acc_stop, 0.98);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad = [
            TrainConfig {
                batch_size: 0,
                ..TrainConfig::default()
            },
            TrainConfig {
                stepsize: -0.1,
                ..TrainConfig::default()
            },
            TrainConfig {
                min_delta: f64::NAN,
                ..TrainConfig::default()
            },
            TrainConfig {
                gradient_step: 0.0,
                ..TrainConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(DruError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_early_stopping_after_patience() {
        let p = |v: f64| Array1::from_elem(2, v);
        let mut stop = EarlyStopping::new(3, 1e-4, 0.98, p(-1.0));
        assert_eq!(stop.observe(1.0, 0.5, &p(0.0)), TrainingState::Running);
        assert_eq!(stop.observe(1.0, 0.5, &p(1.0)), TrainingState::Running);
        assert_eq!(stop.observe(0.99995, 0.5, &p(2.0)), TrainingState::Running);
        assert_eq!(stop.observe(1.2, 0.5, &p(3.0)), TrainingState::EarlyStopped);
        assert_eq!(stop.best_params(), &p(0.0));
        assert_eq!(stop.best_loss(), Some(1.0));
    }

    #[test]
    fn test_improvement_resets_wait() {
        let p = Array1::zeros(1);
        let mut stop = EarlyStopping::new(2, 0.0, 1.0, p.clone());
        stop.observe(1.0, 0.1, &p);
        stop.observe(1.0, 0.1, &p);
        assert_eq!(stop.wait(), 1);
        stop.observe(0.5, 0.3, &p);
        assert_eq!(stop.wait(), 0);
        assert_eq!(stop.best_acc_val(), 0.3);
    }

    #[test]
    fn test_accuracy_stop_takes_precedence() {
        let p = Array1::zeros(1);
        let mut stop = EarlyStopping::new(1, 1e-4, 0.98, p.clone());
        stop.observe(1.0, 0.5, &p);
        // wait reaches patience and accuracy passes the threshold together
        assert_eq!(stop.observe(1.0, 0.99, &p), TrainingState::AccuracyStopped);
    }

    #[test]
    fn test_accuracy_must_exceed_threshold() {
        let p = Array1::zeros(1);
        let mut stop = EarlyStopping::new(10, 1e-4, 0.75, p.clone());
        assert_eq!(stop.observe(1.0, 0.75, &p), TrainingState::Running);
    }

    #[test]
    fn test_moving_average() {
        let mut history = TrainingHistory::default();
        for (epoch, loss) in [4.0, 2.0, 6.0, 0.0].into_iter().enumerate() {
            history.push(EpochRecord {
                epoch,
                loss,
                acc_train: 0.0,
                acc_val: 0.0,
                params: vec![],
            });
        }
        assert_eq!(history.loss_moving_average(2).unwrap(), vec![3.0, 4.0, 3.0]);
        assert_eq!(history.loss_moving_average(4).unwrap(), vec![3.0]);
        assert!(history.loss_moving_average(5).unwrap().is_empty());
        assert!(history.loss_moving_average(0).is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TrainingState::AccuracyStopped.to_string(), "accuracy stopped");
        assert!(!TrainingState::Running.is_terminal());
        assert!(TrainingState::Completed.is_terminal());
    }
}
