//! Circuit command implementation.

use anyhow::Result;
use console::style;
use ndarray::Array1;

use dru_core::ReuploadingCircuit;

use super::common::{load_run_config, make_rng};

/// Execute the circuit command.
pub fn execute(
    config_path: &str,
    features: usize,
    classes: usize,
    sample: &[f64],
    seed: Option<u64>,
    summary: bool,
) -> Result<()> {
    if features == 0 {
        anyhow::bail!("--features must be at least 1");
    }
    if !sample.is_empty() && sample.len() != features {
        anyhow::bail!(
            "--sample has {} values but --features is {features}",
            sample.len()
        );
    }

    let config = load_run_config(config_path)?;
    let circuit_config = config.model.circuit_config(classes)?;
    let circuit = ReuploadingCircuit::new(circuit_config)?;
    let mut rng = make_rng(seed.or(config.training.seed));
    let params = circuit.init_parameters(features, &mut rng)?;

    let x = if sample.is_empty() {
        Array1::zeros(features)
    } else {
        Array1::from(sample.to_vec())
    };
    let program = circuit.build(x.view(), &params)?;

    println!(
        "{} Re-uploading circuit: {} qubits, {} layers, {} entanglement",
        style("→").cyan().bold(),
        circuit_config.qubits,
        circuit_config.layers,
        style(circuit_config.entanglement).yellow()
    );
    println!(
        "  Subchunks per layer: {}",
        ReuploadingCircuit::subchunks(features)
    );
    println!(
        "  Gates: {} ({} rotations, {} CNOTs)",
        style(program.gates().len()).green(),
        program.rotation_count(),
        program.entangling_count()
    );
    println!("  Trainable parameters: {}", params.len());

    if !summary {
        println!();
        print!("{program}");
    }
    Ok(())
}
