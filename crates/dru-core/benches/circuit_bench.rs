//! Benchmarks for circuit evaluation and cost functions
//!
//! Run with: cargo bench -p dru-core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dru_core::circuit::{CircuitConfig, Entanglement, ReuploadingCircuit, StateEvaluator};
use dru_core::cost::CostFunction;
use dru_core::encoding::flatten_params;
use dru_core::labels::LabelSet;
use dru_core::linalg::outer_product;
use dru_core::training::batch_cost;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn circuit(qubits: usize) -> ReuploadingCircuit {
    ReuploadingCircuit::new(CircuitConfig {
        layers: 3,
        qubits,
        entanglement: Entanglement::Full,
    })
    .unwrap()
}

/// Build and simulate one sample.
fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let x = Array1::linspace(-1.0, 1.0, 6);

    for qubits in [1, 2, 4, 6, 8] {
        let circuit = circuit(qubits);
        let params = circuit
            .init_parameters(x.len(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        group.bench_with_input(BenchmarkId::new("full", qubits), &qubits, |b, _| {
            b.iter(|| circuit.evaluate(black_box(x.view()), black_box(&params)).unwrap());
        });
    }

    group.finish();
}

/// Each divergence on a 3-qubit state against a basis label.
fn bench_costs(c: &mut Criterion) {
    let mut group = c.benchmark_group("cost");
    let circuit = circuit(3);
    let x = Array1::linspace(0.0, 2.0, 4);
    let params = circuit
        .init_parameters(x.len(), &mut StdRng::seed_from_u64(1))
        .unwrap();
    let pred = outer_product(&circuit.evaluate(x.view(), &params).unwrap());
    let labels = LabelSet::new(8).unwrap();
    let target = labels.density_matrix(5).unwrap();

    for cost in CostFunction::ALL {
        group.bench_function(cost.as_str(), |b| {
            b.iter(|| cost.evaluate(black_box(&pred), black_box(target)).unwrap());
        });
    }

    group.finish();
}

/// Mean cost of a batch of ten samples, as seen by one gradient probe.
fn bench_batch_cost(c: &mut Criterion) {
    let circuit = circuit(2);
    let labels = LabelSet::new(4).unwrap();
    let features = Array2::from_shape_fn((10, 4), |(i, j)| (i * 4 + j) as f64 / 40.0);
    let targets: Vec<usize> = (0..10).map(|i| i % 4).collect();
    let params = circuit
        .init_parameters(4, &mut StdRng::seed_from_u64(2))
        .unwrap();
    let (flat, shapes) = flatten_params(&params);

    c.bench_function("batch_cost/fidelity", |b| {
        b.iter(|| {
            batch_cost(
                &circuit,
                &labels,
                CostFunction::Fidelity,
                black_box(flat.view()),
                &shapes,
                features.view(),
                &targets,
            )
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_evaluate, bench_costs, bench_batch_cost);
criterion_main!(benches);
