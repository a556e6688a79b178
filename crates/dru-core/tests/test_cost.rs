//! Tests for the divergence cost library.

use dru_core::cost::{
    CostFunction, fidelity_cost, renyi_divergence, renyi_divergence_half, trace_distance,
};
use dru_core::labels::LabelSet;
use dru_core::linalg::{DensityMatrix, outer_product, real_trace};
use dru_core::{DruError, ReuploadingCircuit};
use dru_core::circuit::{CircuitConfig, Entanglement, StateEvaluator};
use nalgebra::DMatrix;
use ndarray::array;
use num_complex::Complex64;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn circuit_state(seed: u64) -> DensityMatrix {
    let c = ReuploadingCircuit::new(CircuitConfig {
        layers: 2,
        qubits: 2,
        entanglement: Entanglement::Linear,
    })
    .unwrap();
    let x = array![0.3, 0.8, -0.5];
    let params = c
        .init_parameters(x.len(), &mut StdRng::seed_from_u64(seed))
        .unwrap();
    outer_product(&c.evaluate(x.view(), &params).unwrap())
}

#[test]
fn fidelity_cost_zero_for_identical_states() {
    for seed in 0..5 {
        let rho = circuit_state(seed);
        assert!(fidelity_cost(&rho, &rho).unwrap().abs() < 1e-9);
    }
}

#[test]
fn fidelity_cost_within_unit_interval() {
    let labels = LabelSet::new(4).unwrap();
    for seed in 0..5 {
        let rho = circuit_state(seed);
        for target in labels.density_matrices() {
            let cost = fidelity_cost(&rho, target).unwrap();
            assert!((-1e-9..=1.0 + 1e-9).contains(&cost), "{cost}");
        }
    }
}

#[test]
fn distances_are_non_negative() {
    let labels = LabelSet::new(3).unwrap();
    for seed in 0..4 {
        let rho = circuit_state(seed);
        for target in labels.density_matrices() {
            assert!(trace_distance(&rho, target).unwrap() >= 0.0);
            let vn = CostFunction::VonNeumann.evaluate(&rho, target).unwrap();
            assert!(vn > 0.0, "{vn}");
        }
    }
}

#[test]
fn fidelity_of_basis_target_is_overlap() {
    let labels = LabelSet::new(4).unwrap();
    let state = [
        Complex64::new(0.5, 0.0),
        Complex64::new(0.0, 0.5),
        Complex64::new(-0.5, 0.0),
        Complex64::new(0.0, -0.5),
    ];
    let rho = outer_product(&state);
    for target in labels.density_matrices() {
        let cost = fidelity_cost(&rho, target).unwrap();
        assert!((cost - 0.75).abs() < 1e-9);
    }
}

#[test]
fn regularized_targets_keep_caller_matrix_intact() {
    let labels = LabelSet::new(4).unwrap();
    let before = labels.clone();
    let rho = circuit_state(1);
    for cost in CostFunction::ALL {
        for target in labels.density_matrices() {
            cost.evaluate(&rho, target).unwrap();
        }
    }
    assert_eq!(labels, before);
}

#[test]
fn renyi_half_equals_renyi_at_half() {
    let labels = LabelSet::new(2).unwrap();
    let s = 0.6_f64.sqrt();
    let rho = outer_product(&[Complex64::new(s, 0.0), Complex64::new(0.4_f64.sqrt(), 0.0)]);
    let target = labels.density_matrix(1).unwrap();
    assert_eq!(
        renyi_divergence_half(&rho, target).unwrap(),
        renyi_divergence(&rho, target, 0.5).unwrap()
    );
}

#[test]
fn renyi_divergence_grows_with_order() {
    let labels = LabelSet::new(2).unwrap();
    let rho = circuit_state(3);
    let reduced = DMatrix::from_fn(2, 2, |i, j| rho[(i, j)] + rho[(i + 2, j + 2)]);
    let target = labels.density_matrix(0).unwrap();
    let half = CostFunction::RenyiHalf.evaluate(&reduced, target).unwrap();
    let two = CostFunction::RenyiTwo.evaluate(&reduced, target).unwrap();
    assert!(two >= half - 1e-9, "D_2 = {two} < D_1/2 = {half}");
}

#[test]
fn single_dimension_target_is_not_regularized() {
    let one = DMatrix::from_element(1, 1, Complex64::new(1.0, 0.0));
    assert!(trace_distance(&one, &one).unwrap().abs() < 1e-12);
    assert!((real_trace(&one) - 1.0).abs() < 1e-12);
    let vn = CostFunction::VonNeumann.evaluate(&one, &one).unwrap();
    assert!(vn.abs() < 1e-12);
}

#[test]
fn non_finite_prediction_is_numerical_instability() {
    let labels = LabelSet::new(2).unwrap();
    let nan = DMatrix::from_element(2, 2, Complex64::new(f64::NAN, 0.0));
    for cost in CostFunction::ALL {
        assert!(
            matches!(
                cost.evaluate(&nan, labels.density_matrix(0).unwrap()),
                Err(DruError::NumericalInstability { .. })
            ),
            "{cost}"
        );
    }
}
