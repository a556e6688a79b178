//! Class prediction from evaluated states.
//!
//! The probability of class `c` is the Born probability `|⟨c|ψ⟩|²` of basis
//! state `c`; the predicted class is the first index of the largest one.

use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;

use crate::circuit::StateEvaluator;
use crate::encoding::Parameters;
use crate::error::{DruError, DruResult};

/// Born probabilities of a state vector.
pub fn probabilities(state: &[Complex64]) -> Vec<f64> {
    state.iter().map(|a| a.norm_sqr()).collect()
}

/// Index of the first maximum.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Probability vector per sample, shape `(samples, 2^qubits)`.
pub fn predict_proba<E: StateEvaluator + ?Sized>(
    evaluator: &E,
    features: ArrayView2<'_, f64>,
    params: &Parameters,
) -> DruResult<Array2<f64>> {
    let dim = 1usize << evaluator.num_qubits();
    let mut probs = Array2::zeros((features.nrows(), dim));
    for (x, mut row) in features.rows().into_iter().zip(probs.rows_mut()) {
        let p = probabilities(&evaluator.evaluate(x, params)?);
        if p.len() != dim {
            return Err(DruError::ShapeMismatch(format!(
                "evaluator returned {} amplitudes, expected {dim}",
                p.len()
            )));
        }
        row.assign(&ndarray::ArrayView1::from(&p[..]));
    }
    Ok(probs)
}

/// Predicted class index per sample.
pub fn predict<E: StateEvaluator + ?Sized>(
    evaluator: &E,
    features: ArrayView2<'_, f64>,
    params: &Parameters,
) -> DruResult<Vec<usize>> {
    features
        .rows()
        .into_iter()
        .map(|x| {
            let p = probabilities(&evaluator.evaluate(x, params)?);
            argmax(&p).ok_or_else(|| {
                DruError::InvalidInput("evaluator returned an empty state".into())
            })
        })
        .collect()
}

/// Fraction of samples whose prediction matches `labels`.
pub fn accuracy<E: StateEvaluator + ?Sized>(
    evaluator: &E,
    features: ArrayView2<'_, f64>,
    labels: &[usize],
    params: &Parameters,
) -> DruResult<f64> {
    if labels.is_empty() {
        return Err(DruError::EmptyDataset("label set"));
    }
    if labels.len() != features.nrows() {
        return Err(DruError::ShapeMismatch(format!(
            "{} labels for {} samples",
            labels.len(),
            features.nrows()
        )));
    }
    let predicted = predict(evaluator, features, params)?;
    let correct = predicted
        .iter()
        .zip(labels)
        .filter(|(p, y)| p == y)
        .count();
    Ok(correct as f64 / labels.len() as f64)
}
