//! Evaluate command implementation.

use anyhow::Result;
use console::style;

use dru_core::evaluate_classification;

use super::common::{
    OutputFormat, load_dataset, load_model, parse_format, print_evaluation, write_json,
};

/// Execute the evaluate command.
pub fn execute(
    model_path: &str,
    train: &str,
    validation: &str,
    format: &str,
    export: Option<&str>,
) -> Result<()> {
    let format = parse_format(format)?;
    let model = load_model(model_path)?;
    let train = load_dataset(train)?;
    let validation = load_dataset(validation)?;
    for (name, data) in [("training", &train), ("validation", &validation)] {
        if data.num_features() != model.num_features {
            anyhow::bail!(
                "Model expects {} features per sample, {name} set has {}",
                model.num_features,
                data.num_features()
            );
        }
    }

    let circuit = model.circuit()?;
    let params = model.parameters()?;
    let evaluation = evaluate_classification(&circuit, &params, &train, &validation, true)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&evaluation)?),
        OutputFormat::Table => {
            println!(
                "{} Evaluating {} ({} classes, {} cost, stopped: {})",
                style("→").cyan().bold(),
                style(model_path).green(),
                model.num_classes,
                model.cost,
                model.state
            );
            print_evaluation(&evaluation);
        }
    }

    if let Some(path) = export {
        write_json(path, &evaluation)?;
        if format == OutputFormat::Table {
            println!("\n  Report: {}", style(path).green());
        }
    }
    Ok(())
}
