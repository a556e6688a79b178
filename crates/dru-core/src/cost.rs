//! Divergence costs between a predicted and a target density matrix.
//!
//! Every function maps `(pred, target)` to a real scalar where lower is
//! better. Targets that are pure computational-basis projectors are first
//! replaced by the near-pure state of [`regularize_near_pure`] in the costs
//! that need `log` or negative powers of the target. The caller's matrix is
//! never touched.
//!
//! | cost | formula |
//! |------|---------|
//! | fidelity | `1 - (Tr √(√ρ σ √ρ))²` |
//! | trace distance | `½ Tr √((ρ-σ)†(ρ-σ))` |
//! | von Neumann | `Tr ρ (log ρ - log σ)` |
//! | Rényi α | `1/(α-1) · log(Tr (σ^k ρ σ^k)^α / Tr ρ)`, `k = (1-α)/2α` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DruError, DruResult, ensure_finite};
use crate::linalg::{
    DensityMatrix, EIGEN_TOLERANCE, hermitian_eigenvalues, matrix_log, matrix_pow, matrix_sqrt,
    real_trace, regularize_near_pure, xlogx_trace,
};

/// Uhlmann fidelity `(Tr √(√ρ σ √ρ))²`.
pub fn fidelity(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
    check_shapes(pred, target)?;
    let sqrt_pred = matrix_sqrt(pred)?;
    let inner = &sqrt_pred * target * &sqrt_pred;
    let root_trace: f64 = hermitian_eigenvalues(&inner)?
        .iter()
        .filter(|&&l| l > EIGEN_TOLERANCE)
        .map(|l| l.sqrt())
        .sum();
    ensure_finite(root_trace * root_trace, "fidelity")
}

/// `1 - fidelity(pred, target)`.
pub fn fidelity_cost(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
    ensure_finite(1.0 - fidelity(pred, target)?, "fidelity cost")
}

/// Trace distance against the regularised target.
pub fn trace_distance(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
    check_shapes(pred, target)?;
    let target = regularize_near_pure(target);
    let diff = pred - &target;
    let gram = diff.adjoint() * &diff;
    let root = matrix_sqrt(&gram)?;
    ensure_finite(0.5 * real_trace(&root), "trace distance")
}

/// Quantum relative entropy `Tr ρ (log ρ - log σ)` against the regularised
/// target.
pub fn von_neumann_divergence(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
    check_shapes(pred, target)?;
    let target = regularize_near_pure(target);
    let self_term = xlogx_trace(pred)?;
    let cross_term = real_trace(&(pred * matrix_log(&target)?));
    ensure_finite(self_term - cross_term, "von Neumann divergence")
}

/// Sandwiched Rényi divergence of order `alpha` against the regularised
/// target.
///
/// `alpha` must be positive, finite and different from 1.
pub fn renyi_divergence(pred: &DensityMatrix, target: &DensityMatrix, alpha: f64) -> DruResult<f64> {
    if !alpha.is_finite() || alpha <= 0.0 || alpha == 1.0 {
        return Err(DruError::InvalidInput(format!(
            "Rényi order must be positive, finite and not 1, got {alpha}"
        )));
    }
    check_shapes(pred, target)?;
    let target = regularize_near_pure(target);
    let sandwich = matrix_pow(&target, (1.0 - alpha) / (2.0 * alpha))?;
    let inner = &sandwich * pred * &sandwich;
    let numerator = real_trace(&matrix_pow(&inner, alpha)?);
    let ratio = numerator / real_trace(pred);
    ensure_finite(ratio.ln() / (alpha - 1.0), "Rényi divergence")
}

/// Rényi divergence of order ½.
pub fn renyi_divergence_half(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
    renyi_divergence(pred, target, 0.5)
}

/// Rényi divergence of order 2.
pub fn renyi_divergence_two(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
    renyi_divergence(pred, target, 2.0)
}

fn check_shapes(pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<()> {
    if pred.shape() != target.shape() || !pred.is_square() {
        return Err(DruError::ShapeMismatch(format!(
            "predicted density matrix is {:?}, target is {:?}",
            pred.shape(),
            target.shape()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Cost selector
// ---------------------------------------------------------------------------

/// The cost function a model is trained against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum CostFunction {
    /// `1 - F(ρ, σ)`.
    #[default]
    Fidelity,
    /// Regularised trace distance.
    TraceDistance,
    /// Regularised quantum relative entropy.
    VonNeumann,
    /// Sandwiched Rényi divergence, α = ½.
    RenyiHalf,
    /// Sandwiched Rényi divergence, α = 2.
    RenyiTwo,
}

impl CostFunction {
    /// All selectable costs.
    pub const ALL: [CostFunction; 5] = [
        CostFunction::Fidelity,
        CostFunction::TraceDistance,
        CostFunction::VonNeumann,
        CostFunction::RenyiHalf,
        CostFunction::RenyiTwo,
    ];

    /// Evaluate the cost on one prediction.
    pub fn evaluate(self, pred: &DensityMatrix, target: &DensityMatrix) -> DruResult<f64> {
        match self {
            CostFunction::Fidelity => fidelity_cost(pred, target),
            CostFunction::TraceDistance => trace_distance(pred, target),
            CostFunction::VonNeumann => von_neumann_divergence(pred, target),
            CostFunction::RenyiHalf => renyi_divergence_half(pred, target),
            CostFunction::RenyiTwo => renyi_divergence_two(pred, target),
        }
    }

    /// Stable identifier, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            CostFunction::Fidelity => "fidelity",
            CostFunction::TraceDistance => "trace_distance",
            CostFunction::VonNeumann => "von_neumann",
            CostFunction::RenyiHalf => "renyi_half",
            CostFunction::RenyiTwo => "renyi_two",
        }
    }
}

impl TryFrom<String> for CostFunction {
    type Error = DruError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for CostFunction {
    type Err = DruError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CostFunction::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                DruError::Configuration(format!(
                    "unknown cost function '{s}' (expected one of: {})",
                    CostFunction::ALL.map(CostFunction::as_str).join(", ")
                ))
            })
    }
}

impl fmt::Display for CostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
