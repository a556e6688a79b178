//! Predict command implementation.

use anyhow::Result;
use console::style;
use serde::Serialize;

use dru_core::predict::argmax;
use dru_core::predict_proba;

use super::common::{OutputFormat, load_model, load_samples, parse_format};

#[derive(Serialize)]
struct PredictionRow {
    index: usize,
    prediction: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probabilities: Option<Vec<f64>>,
}

/// Execute the predict command.
pub fn execute(model_path: &str, input: &str, probabilities: bool, format: &str) -> Result<()> {
    let format = parse_format(format)?;
    let model = load_model(model_path)?;
    let samples = load_samples(input)?;
    if samples.features.ncols() != model.num_features {
        anyhow::bail!(
            "Model expects {} features per sample, {input} has {}",
            model.num_features,
            samples.features.ncols()
        );
    }

    let circuit = model.circuit()?;
    let params = model.parameters()?;
    let probs = predict_proba(&circuit, samples.features.view(), &params)?;

    let rows: Vec<PredictionRow> = probs
        .rows()
        .into_iter()
        .enumerate()
        .map(|(index, p)| {
            let p = p.to_vec();
            let prediction = argmax(&p).unwrap_or(0);
            PredictionRow {
                index,
                prediction,
                label: samples.labels.as_ref().map(|l| l[index]),
                probabilities: probabilities.then_some(p),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => print_table(&rows, model.num_classes),
    }
    Ok(())
}

fn print_table(rows: &[PredictionRow], num_classes: usize) {
    print!("{:>6} {:>10}", "index", "prediction");
    if rows.iter().any(|r| r.label.is_some()) {
        print!(" {:>6}", "label");
    }
    if let Some(p) = rows.first().and_then(|r| r.probabilities.as_ref()) {
        for k in 0..p.len() {
            print!(" {:>8}", format!("p({k})"));
        }
    }
    println!();

    for row in rows {
        let prediction = if row.prediction < num_classes {
            style(row.prediction.to_string()).cyan()
        } else {
            style(row.prediction.to_string()).red()
        };
        print!("{:>6} {:>10}", row.index, prediction);
        if let Some(label) = row.label {
            let label = if label == row.prediction {
                style(label.to_string()).green()
            } else {
                style(label.to_string()).red()
            };
            print!(" {label:>6}");
        }
        if let Some(p) = &row.probabilities {
            for value in p {
                print!(" {value:>8.4}");
            }
        }
        println!();
    }

    let labelled: Vec<_> = rows.iter().filter_map(|r| r.label.map(|l| (l, r.prediction))).collect();
    if !labelled.is_empty() {
        let correct = labelled.iter().filter(|(l, p)| l == p).count();
        println!(
            "\n  Accuracy: {}",
            style(format!("{:.4}", correct as f64 / labelled.len() as f64)).yellow()
        );
    }
}
