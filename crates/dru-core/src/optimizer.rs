//! First-order optimizers over the flattened parameter vector.
//!
//! Gradients are estimated numerically with central differences,
//! `∂f/∂p_i ≈ (f(p + h e_i) - f(p - h e_i)) / 2h`, which costs `2·len`
//! cost evaluations per step.

use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{DruError, DruResult, ensure_finite};

/// Default finite-difference step.
pub const DEFAULT_GRADIENT_STEP: f64 = 1e-5;

/// Performs one update of a flat parameter vector against a scalar cost.
pub trait Optimizer {
    /// Return the parameters after one step. `params` itself is left as is.
    fn step<F>(&mut self, cost: F, params: &Array1<f64>) -> DruResult<Array1<f64>>
    where
        F: FnMut(ArrayView1<'_, f64>) -> DruResult<f64>;
}

/// Central finite-difference gradient estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiniteDifference {
    step: f64,
}

impl FiniteDifference {
    /// Estimator with probe distance `step`.
    pub fn new(step: f64) -> DruResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(DruError::Configuration(format!(
                "finite-difference step must be positive, got {step}"
            )));
        }
        Ok(Self { step })
    }

    /// Probe distance.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Gradient of `cost` at `params`. Any non-finite probe or component is
    /// an error.
    pub fn gradient<F>(&self, cost: &mut F, params: &Array1<f64>) -> DruResult<Array1<f64>>
    where
        F: FnMut(ArrayView1<'_, f64>) -> DruResult<f64>,
    {
        let mut probe = params.clone();
        let mut grad = Array1::zeros(params.len());
        for i in 0..params.len() {
            let original = probe[i];
            probe[i] = original + self.step;
            let forward = ensure_finite(cost(probe.view())?, "cost at forward probe")?;
            probe[i] = original - self.step;
            let backward = ensure_finite(cost(probe.view())?, "cost at backward probe")?;
            probe[i] = original;
            grad[i] = ensure_finite(
                (forward - backward) / (2.0 * self.step),
                format!("gradient component {i}"),
            )?;
        }
        Ok(grad)
    }
}

impl Default for FiniteDifference {
    fn default() -> Self {
        Self {
            step: DEFAULT_GRADIENT_STEP,
        }
    }
}

/// Adam hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    /// Base step size.
    pub stepsize: f64,
    /// First-moment decay.
    pub beta1: f64,
    /// Second-moment decay.
    pub beta2: f64,
    /// Denominator offset.
    pub eps: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            stepsize: 0.01,
            beta1: 0.9,
            beta2: 0.99,
            eps: 1e-8,
        }
    }
}

/// Adaptive-moment optimizer.
///
/// The bias correction is folded into the step size:
///
/// ```text
/// m ← β1 m + (1-β1) g
/// v ← β2 v + (1-β2) g²
/// p ← p - η √(1-β2^t) / (1-β1^t) · m / (√v + ε)
/// ```
#[derive(Debug, Clone)]
pub struct AdamOptimizer {
    config: AdamConfig,
    gradient: FiniteDifference,
    first_moment: Option<Array1<f64>>,
    second_moment: Option<Array1<f64>>,
    t: i32,
}

impl AdamOptimizer {
    /// Adam with default moments and the given step size.
    pub fn new(stepsize: f64) -> DruResult<Self> {
        Self::with_config(
            AdamConfig {
                stepsize,
                ..AdamConfig::default()
            },
            FiniteDifference::default(),
        )
    }

    /// Adam with explicit hyper-parameters and gradient estimator.
    pub fn with_config(config: AdamConfig, gradient: FiniteDifference) -> DruResult<Self> {
        let valid_beta = |b: f64| (0.0..1.0).contains(&b);
        if !config.stepsize.is_finite() || config.stepsize <= 0.0 {
            return Err(DruError::Configuration(format!(
                "stepsize must be positive, got {}",
                config.stepsize
            )));
        }
        if !valid_beta(config.beta1) || !valid_beta(config.beta2) {
            return Err(DruError::Configuration(format!(
                "Adam decay rates must lie in [0, 1), got beta1={} beta2={}",
                config.beta1, config.beta2
            )));
        }
        if !config.eps.is_finite() || config.eps <= 0.0 {
            return Err(DruError::Configuration(format!(
                "Adam eps must be positive, got {}",
                config.eps
            )));
        }
        Ok(Self {
            config,
            gradient,
            first_moment: None,
            second_moment: None,
            t: 0,
        })
    }

    /// Hyper-parameters.
    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    /// Steps taken since construction or the last [`reset`](Self::reset).
    pub fn iterations(&self) -> i32 {
        self.t
    }

    /// Forget the accumulated moments.
    pub fn reset(&mut self) {
        self.first_moment = None;
        self.second_moment = None;
        self.t = 0;
    }

    /// Apply one Adam update for a known gradient.
    pub fn apply_gradient(&mut self, params: &Array1<f64>, grad: &Array1<f64>) -> DruResult<Array1<f64>> {
        if grad.len() != params.len() {
            return Err(DruError::ShapeMismatch(format!(
                "gradient has {} components, parameters have {}",
                grad.len(),
                params.len()
            )));
        }
        let AdamConfig {
            stepsize,
            beta1,
            beta2,
            eps,
        } = self.config;

        let n = params.len();
        let m = self.first_moment.get_or_insert_with(|| Array1::zeros(n));
        let v = self.second_moment.get_or_insert_with(|| Array1::zeros(n));
        if m.len() != n || v.len() != n {
            return Err(DruError::ShapeMismatch(format!(
                "optimizer state holds {} moments, parameters have {n}",
                m.len()
            )));
        }

        self.t += 1;
        Zip::from(&mut *m)
            .and(grad)
            .for_each(|m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        Zip::from(&mut *v)
            .and(grad)
            .for_each(|v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        let lr = stepsize * (1.0 - beta2.powi(self.t)).sqrt() / (1.0 - beta1.powi(self.t));
        let mut updated = params.clone();
        Zip::from(&mut updated)
            .and(&*m)
            .and(&*v)
            .for_each(|p, &m, &v| *p -= lr * m / (v.sqrt() + eps));
        trace!(t = self.t, lr, "adam step");
        Ok(updated)
    }
}

impl Optimizer for AdamOptimizer {
    fn step<F>(&mut self, mut cost: F, params: &Array1<f64>) -> DruResult<Array1<f64>>
    where
        F: FnMut(ArrayView1<'_, f64>) -> DruResult<f64>,
    {
        let grad = self.gradient.gradient(&mut cost, params)?;
        self.apply_gradient(params, &grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn quadratic(p: ArrayView1<'_, f64>) -> DruResult<f64> {
        Ok(p.iter().map(|x| (x - 1.0).powi(2)).sum())
    }

    #[test]
    fn test_finite_difference_quadratic() {
        let fd = FiniteDifference::default();
        let grad = fd.gradient(&mut quadratic, &array![0.0, 3.0]).unwrap();
        assert!((grad[0] + 2.0).abs() < 1e-6);
        assert!((grad[1] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_first_adam_step_moves_by_stepsize() {
        // t = 1: lr = η·√(1-β2)/(1-β1), m = (1-β1)g, √v = √(1-β2)|g|
        // so |Δp| = η up to eps
        let mut adam = AdamOptimizer::new(0.05).unwrap();
        let out = adam.step(quadratic, &array![0.0, 3.0]).unwrap();
        assert!((out[0] - 0.05).abs() < 1e-6);
        assert!((out[1] - 2.95).abs() < 1e-6);
        assert_eq!(adam.iterations(), 1);
    }

    #[test]
    fn test_adam_converges_on_quadratic() {
        let mut adam = AdamOptimizer::new(0.1).unwrap();
        let mut p = array![-2.0, 4.0, 0.5];
        for _ in 0..500 {
            p = adam.step(quadratic, &p).unwrap();
        }
        assert!(quadratic(p.view()).unwrap() < 1e-2);
    }

    #[test]
    fn test_non_finite_cost_aborts_step() {
        let mut adam = AdamOptimizer::new(0.1).unwrap();
        let params = array![1.0];
        let result = adam.step(|_| Ok(f64::NAN), &params);
        assert!(matches!(result, Err(DruError::NumericalInstability { .. })));
        assert_eq!(adam.iterations(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AdamOptimizer::new(0.0).is_err());
        assert!(FiniteDifference::new(-1e-3).is_err());
        let config = AdamConfig {
            beta1: 1.0,
            ..AdamConfig::default()
        };
        assert!(AdamOptimizer::with_config(config, FiniteDifference::default()).is_err());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut adam = AdamOptimizer::new(0.1).unwrap();
        adam.step(quadratic, &array![0.0]).unwrap();
        adam.reset();
        assert_eq!(adam.iterations(), 0);
        // a different length is accepted after reset
        adam.step(quadratic, &array![0.0, 0.0]).unwrap();
    }
}
