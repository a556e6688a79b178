//! Density-matrix linear algebra.
//!
//! All matrix functions go through a Hermitian eigen-decomposition
//! `A = V diag(λ) V†`, apply a scalar function to the eigenvalues and
//! reassemble. Inputs are density matrices or products/differences of them,
//! so they are Hermitian by construction.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex64;

use crate::error::{DruError, DruResult};

/// A (complex) density matrix.
pub type DensityMatrix = DMatrix<Complex64>;

/// Weight kept on the hot diagonal entry by [`regularize_near_pure`].
pub const NEAR_PURE_WEIGHT: f64 = 0.999;

/// Eigenvalues below this are treated as zero by [`matrix_sqrt`] and
/// [`xlogx_trace`].
pub const EIGEN_TOLERANCE: f64 = 1e-12;

/// Iteration cap for the eigen solver.
const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// `|ψ⟩⟨ψ|` for a state vector.
pub fn outer_product(state: &[Complex64]) -> DensityMatrix {
    let n = state.len();
    DMatrix::from_fn(n, n, |i, j| state[i] * state[j].conj())
}

/// Real part of the trace.
pub fn real_trace(m: &DensityMatrix) -> f64 {
    m.trace().re
}

/// Hermitian eigen-decomposition.
///
/// Fails with `NumericalInstability` if the matrix holds non-finite entries or
/// the solver does not converge.
pub fn hermitian_eigen(m: &DensityMatrix) -> DruResult<SymmetricEigen<Complex64, nalgebra::Dyn>> {
    if !m.is_square() {
        return Err(DruError::ShapeMismatch(format!(
            "eigen-decomposition needs a square matrix, got {}x{}",
            m.nrows(),
            m.ncols()
        )));
    }
    if let Some(bad) = m.iter().find(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(DruError::NumericalInstability {
            context: "matrix entry before eigen-decomposition".into(),
            value: if bad.re.is_finite() { bad.im } else { bad.re },
        });
    }
    SymmetricEigen::try_new(m.clone(), f64::EPSILON, MAX_EIGEN_ITERATIONS).ok_or_else(|| {
        DruError::NumericalInstability {
            context: "eigen-decomposition did not converge".into(),
            value: f64::NAN,
        }
    })
}

/// Eigenvalues of a Hermitian matrix (unordered).
pub fn hermitian_eigenvalues(m: &DensityMatrix) -> DruResult<DVector<f64>> {
    Ok(hermitian_eigen(m)?.eigenvalues)
}

/// Apply `f` to the eigenvalues of `m` and reassemble `V diag(f(λ)) V†`.
pub fn hermitian_function<F>(m: &DensityMatrix, f: F) -> DruResult<DensityMatrix>
where
    F: Fn(f64) -> f64,
{
    let eig = hermitian_eigen(m)?;
    let mapped = eig.eigenvalues.map(|l| Complex64::new(f(l), 0.0));
    let v = &eig.eigenvectors;
    Ok(v * DMatrix::from_diagonal(&mapped) * v.adjoint())
}

/// `P^power` as `V diag(sign(λ)·|λ|^power) V†`.
///
/// A zero eigenvalue maps to zero for every power. Near-singular inputs need
/// [`regularize_near_pure`] first when `power` is negative.
pub fn matrix_pow(m: &DensityMatrix, power: f64) -> DruResult<DensityMatrix> {
    hermitian_function(m, |l| {
        if l == 0.0 {
            0.0
        } else {
            l.signum() * l.abs().powf(power)
        }
    })
}

/// Principal square root of a positive semidefinite matrix.
///
/// Eigenvalues under [`EIGEN_TOLERANCE`] (solver round-off around a zero
/// eigenvalue) map to exactly zero.
pub fn matrix_sqrt(m: &DensityMatrix) -> DruResult<DensityMatrix> {
    hermitian_function(m, |l| if l < EIGEN_TOLERANCE { 0.0 } else { l.sqrt() })
}

/// Natural matrix logarithm. Singular inputs give non-finite entries.
pub fn matrix_log(m: &DensityMatrix) -> DruResult<DensityMatrix> {
    hermitian_function(m, f64::ln)
}

/// `Tr(ρ log ρ) = Σ λ ln λ` with the convention `0 · ln 0 = 0`.
pub fn xlogx_trace(m: &DensityMatrix) -> DruResult<f64> {
    Ok(hermitian_eigenvalues(m)?
        .iter()
        .filter(|&&l| l > EIGEN_TOLERANCE)
        .map(|&l| l * l.ln())
        .sum())
}

/// If `m` is a computational-basis projector (exactly one non-zero entry, on
/// the diagonal, equal to 1) return the index of that entry.
pub fn pure_basis_index(m: &DensityMatrix) -> Option<usize> {
    let zero = Complex64::new(0.0, 0.0);
    let mut hot = None;
    for ((i, j), z) in indexed(m) {
        if *z == zero {
            continue;
        }
        if i != j || hot.is_some() {
            return None;
        }
        hot = Some(i);
    }
    hot.filter(|&i| m[(i, i)] == Complex64::new(1.0, 0.0))
}

/// Replace a pure computational-basis projector by a near-pure mixed state.
///
/// The hot diagonal entry becomes [`NEAR_PURE_WEIGHT`] and the remainder
/// `(hot - NEAR_PURE_WEIGHT)` is spread evenly over the other diagonal
/// entries, so the trace is preserved. Any other matrix (including an
/// already-regularised one and 1×1 targets) is returned unchanged. The input
/// is never modified.
pub fn regularize_near_pure(target: &DensityMatrix) -> DensityMatrix {
    let n = target.nrows();
    let Some(hot) = pure_basis_index(target) else {
        return target.clone();
    };
    if n < 2 {
        return target.clone();
    }
    let spread = (target[(hot, hot)].re - NEAR_PURE_WEIGHT) / (n - 1) as f64;
    let mut out = DMatrix::zeros(n, n);
    for i in 0..n {
        out[(i, i)] = Complex64::new(spread, 0.0);
    }
    out[(hot, hot)] = Complex64::new(NEAR_PURE_WEIGHT, 0.0);
    out
}

fn indexed(m: &DensityMatrix) -> impl Iterator<Item = ((usize, usize), &Complex64)> {
    let rows = m.nrows();
    // nalgebra storage is column-major
    m.iter().enumerate().map(move |(k, z)| ((k % rows, k / rows), z))
}
