//! End-to-end evaluation of fixed parameters.

use dru_core::circuit::{CircuitConfig, Entanglement, ReuploadingCircuit};
use dru_core::encoding::Parameters;
use dru_core::{Dataset, evaluate_classification};
use ndarray::{Array2, array};

/// `P(1) = sin²(v / 2)` for a sample `[0, v]`.
fn flip_model() -> (ReuploadingCircuit, Parameters) {
    let circuit = ReuploadingCircuit::new(CircuitConfig {
        layers: 1,
        qubits: 1,
        entanglement: Entanglement::None,
    })
    .unwrap();
    let params = Parameters::new(Array2::zeros((1, 3)), array![[0.0, 1.0, 0.0]]).unwrap();
    (circuit, params)
}

fn samples(values: &[f64], labels: Vec<usize>) -> Dataset {
    let rows = values.iter().map(|&v| vec![0.0, v]).collect();
    Dataset::from_rows(rows, labels).unwrap()
}

#[test]
fn binary_evaluation_with_roc() {
    let (circuit, params) = flip_model();
    let train = samples(&[0.1, 3.0], vec![0, 1]);
    let validation = samples(&[2.8, 2.5, 2.0, 1.2, 1.0, 0.2], vec![1, 0, 1, 1, 0, 0]);

    let eval = evaluate_classification(&circuit, &params, &train, &validation, true).unwrap();
    assert_eq!(eval.classes, vec![0, 1]);
    assert_eq!(eval.train.predictions, vec![0, 1]);
    assert_eq!(eval.train.report.accuracy, 1.0);
    assert_eq!(eval.validation.predictions, vec![1, 1, 1, 0, 0, 0]);
    assert_eq!(
        eval.validation.confusion.counts(),
        &array![[2, 1], [1, 2]]
    );
    assert!((eval.validation.report.accuracy - 4.0 / 6.0).abs() < 1e-12);

    let roc = eval.roc.expect("binary split has a ROC curve");
    assert_eq!(roc.positive_class, 1);
    // 7 of 9 (positive, negative) pairs are ranked correctly
    assert!((roc.auc - 7.0 / 9.0).abs() < 1e-12, "{}", roc.auc);
    assert_eq!(roc.curve.fpr.first(), Some(&0.0));
    assert_eq!(roc.curve.tpr.last(), Some(&1.0));
    assert_eq!(roc.curve.fpr.len(), 7);
}

#[test]
fn roc_omitted_when_not_requested() {
    let (circuit, params) = flip_model();
    let data = samples(&[0.1, 3.0], vec![0, 1]);
    let eval = evaluate_classification(&circuit, &params, &data, &data, false).unwrap();
    assert!(eval.roc.is_none());
}

#[test]
fn roc_skipped_for_single_class_validation() {
    let (circuit, params) = flip_model();
    let train = samples(&[0.1, 3.0], vec![0, 1]);
    let validation = samples(&[0.3, 0.5], vec![0, 0]);
    let eval = evaluate_classification(&circuit, &params, &train, &validation, true).unwrap();
    assert!(eval.roc.is_none());
    assert_eq!(eval.validation.report.accuracy, 1.0);
}

#[test]
fn multiclass_has_no_roc() {
    let circuit = ReuploadingCircuit::new(CircuitConfig {
        layers: 1,
        qubits: 2,
        entanglement: Entanglement::Linear,
    })
    .unwrap();
    let params = Parameters::new(Array2::zeros((2, 3)), Array2::zeros((2, 3))).unwrap();
    let data = Dataset::new(array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]], vec![0, 1, 2]).unwrap();
    let eval = evaluate_classification(&circuit, &params, &data, &data, true).unwrap();
    assert!(eval.roc.is_none());
    assert_eq!(eval.classes, vec![0, 1, 2]);
    // all-zero parameters leave the register in |00⟩
    assert_eq!(eval.train.predictions, vec![0, 0, 0]);
    assert_eq!(eval.train.confusion.correct(), 1);
}

#[test]
fn evaluation_serializes_to_json() {
    let (circuit, params) = flip_model();
    let data = samples(&[0.1, 3.0], vec![0, 1]);
    let eval = evaluate_classification(&circuit, &params, &data, &data, true).unwrap();
    let json = serde_json::to_value(&eval).unwrap();
    assert_eq!(json["validation"]["confusion"]["counts"], serde_json::json!([[1, 0], [0, 1]]));
    assert_eq!(json["roc"]["auc"], serde_json::json!(1.0));
}
