//! Class label states.
//!
//! Class `c` of `C` is the computational-basis state `|c⟩` in a register of
//! `ceil(log2 C)` qubits; its target density matrix is the projector
//! `|c⟩⟨c|`.

use nalgebra::DVector;
use num_complex::Complex64;
use tracing::info;

use crate::error::{DruError, DruResult};
use crate::linalg::DensityMatrix;

/// Smallest register able to hold `num_classes` basis states.
pub fn required_qubits(num_classes: usize) -> usize {
    if num_classes <= 1 {
        0
    } else {
        (usize::BITS - (num_classes - 1).leading_zeros()) as usize
    }
}

/// Kets and projectors for every class.
#[derive(Debug, Clone)]
pub struct LabelSet {
    num_qubits: usize,
    kets: Vec<DVector<Complex64>>,
    density_matrices: Vec<DensityMatrix>,
}

impl LabelSet {
    /// Label states on the suggested register of `ceil(log2 C)` qubits.
    pub fn new(num_classes: usize) -> DruResult<Self> {
        Self::for_register(num_classes, required_qubits(num_classes))
    }

    /// Label states embedded in a register of `num_qubits` qubits.
    pub fn for_register(num_classes: usize, num_qubits: usize) -> DruResult<Self> {
        if num_classes == 0 {
            return Err(DruError::InvalidInput(
                "at least one class is required".into(),
            ));
        }
        let needed = required_qubits(num_classes);
        if num_qubits < needed {
            return Err(DruError::InvalidInput(format!(
                "{num_classes} classes need at least {needed} qubits, register has {num_qubits}"
            )));
        }
        info!(num_classes, suggested_qubits = needed, num_qubits, "building label states");

        let dim = 1usize << num_qubits;
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        let kets: Vec<DVector<Complex64>> = (0..num_classes)
            .map(|c| DVector::from_fn(dim, |i, _| if i == c { one } else { zero }))
            .collect();
        let density_matrices = kets.iter().map(|k| k * k.adjoint()).collect();
        Ok(Self {
            num_qubits,
            kets,
            density_matrices,
        })
    }

    /// Number of classes.
    pub fn num_classes(&self) -> usize {
        self.kets.len()
    }

    /// Register width the labels live in.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Hilbert-space dimension `2^num_qubits`.
    pub fn dimension(&self) -> usize {
        1 << self.num_qubits
    }

    /// Basis ket of a class.
    pub fn ket(&self, class: usize) -> DruResult<&DVector<Complex64>> {
        self.kets.get(class).ok_or_else(|| self.out_of_range(class))
    }

    /// Projector of a class.
    pub fn density_matrix(&self, class: usize) -> DruResult<&DensityMatrix> {
        self.density_matrices
            .get(class)
            .ok_or_else(|| self.out_of_range(class))
    }

    /// All projectors, indexed by class.
    pub fn density_matrices(&self) -> &[DensityMatrix] {
        &self.density_matrices
    }

    fn out_of_range(&self, class: usize) -> DruError {
        DruError::InvalidInput(format!(
            "label {class} out of range for {} classes",
            self.num_classes()
        ))
    }
}

impl PartialEq for LabelSet {
    fn eq(&self, other: &Self) -> bool {
        self.num_qubits == other.num_qubits && self.density_matrices == other.density_matrices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_qubits() {
        assert_eq!(required_qubits(1), 0);
        assert_eq!(required_qubits(2), 1);
        assert_eq!(required_qubits(3), 2);
        assert_eq!(required_qubits(4), 2);
        assert_eq!(required_qubits(5), 3);
        assert_eq!(required_qubits(8), 3);
        assert_eq!(required_qubits(9), 4);
    }

    #[test]
    fn test_three_classes_on_two_qubits() {
        let labels = LabelSet::new(3).unwrap();
        assert_eq!(labels.num_qubits(), 2);
        assert_eq!(labels.dimension(), 4);
        for c in 0..3 {
            let dm = labels.density_matrix(c).unwrap();
            assert_eq!(dm.shape(), (4, 4));
            for i in 0..4 {
                for j in 0..4 {
                    let expected = if i == c && j == c { 1.0 } else { 0.0 };
                    assert_eq!(dm[(i, j)], Complex64::new(expected, 0.0));
                }
            }
        }
    }

    #[test]
    fn test_register_too_small() {
        assert!(matches!(
            LabelSet::for_register(5, 2),
            Err(DruError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_larger_register_pads_dimension() {
        let labels = LabelSet::for_register(2, 3).unwrap();
        assert_eq!(labels.dimension(), 8);
        assert_eq!(labels.density_matrix(1).unwrap()[(1, 1)].re, 1.0);
    }

    #[test]
    fn test_zero_classes_rejected() {
        assert!(LabelSet::new(0).is_err());
    }

    #[test]
    fn test_label_out_of_range() {
        let labels = LabelSet::new(2).unwrap();
        assert!(labels.density_matrix(2).is_err());
    }
}
