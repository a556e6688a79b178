//! DRU Command-Line Interface
//!
//! Train, inspect and apply data re-uploading quantum classifiers.
//!
//! ```text
//! dru train    -c run.yaml --train train.json --validation val.json -o model.json
//! dru predict  -m model.json -i samples.json --probabilities
//! dru evaluate -m model.json --train train.json --validation val.json
//! dru circuit  -c run.yaml --features 4 --classes 3
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{circuit, evaluate, predict, train, version};

/// DRU - data re-uploading quantum classifiers
#[derive(Parser)]
#[command(name = "dru")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a classifier and save the best parameters
    Train {
        /// Run configuration (YAML or JSON)
        #[arg(short, long)]
        config: String,

        /// Training dataset
        #[arg(long)]
        train: String,

        /// Validation dataset (split off the training set if omitted)
        #[arg(long)]
        validation: Option<String>,

        /// Fraction of the training set held out when no validation file is given
        #[arg(long, default_value = "0.2")]
        validation_fraction: f64,

        /// Output model file
        #[arg(short, long, default_value = "model.json")]
        output: String,

        /// Write the per-epoch history as JSON
        #[arg(long)]
        history: Option<String>,

        /// Random seed (overrides the configuration)
        #[arg(long, env = "DRU_SEED")]
        seed: Option<u64>,

        /// Epoch budget (overrides the configuration)
        #[arg(long, env = "DRU_EPOCHS")]
        epochs: Option<usize>,
    },

    /// Predict classes for a feature file
    Predict {
        /// Trained model file
        #[arg(short, long)]
        model: String,

        /// Samples (`features`, optional `labels`)
        #[arg(short, long)]
        input: String,

        /// Print class probabilities as well
        #[arg(short, long)]
        probabilities: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Confusion matrices, per-class scores and ROC/AUC for a trained model
    Evaluate {
        /// Trained model file
        #[arg(short, long)]
        model: String,

        /// Training dataset
        #[arg(long)]
        train: String,

        /// Validation dataset
        #[arg(long)]
        validation: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Also write the JSON report to this file
        #[arg(short, long)]
        export: Option<String>,
    },

    /// Print the gate sequence of a configured circuit
    Circuit {
        /// Run configuration (YAML or JSON)
        #[arg(short, long)]
        config: String,

        /// Features per sample
        #[arg(long)]
        features: usize,

        /// Number of classes (sizes the register when `qubits` is unset)
        #[arg(long, default_value = "2")]
        classes: usize,

        /// Sample to encode, comma separated (zeros if omitted)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        sample: Vec<f64>,

        /// Seed for the random parameters
        #[arg(long, env = "DRU_SEED")]
        seed: Option<u64>,

        /// Only print gate counts
        #[arg(long)]
        summary: bool,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Train {
            config,
            train,
            validation,
            validation_fraction,
            output,
            history,
            seed,
            epochs,
        } => train::execute(&train::TrainArgs {
            config: &config,
            train: &train,
            validation: validation.as_deref(),
            validation_fraction,
            output: &output,
            history: history.as_deref(),
            seed,
            epochs,
        }),

        Commands::Predict {
            model,
            input,
            probabilities,
            format,
        } => predict::execute(&model, &input, probabilities, &format),

        Commands::Evaluate {
            model,
            train,
            validation,
            format,
            export,
        } => evaluate::execute(&model, &train, &validation, &format, export.as_deref()),

        Commands::Circuit {
            config,
            features,
            classes,
            sample,
            seed,
            summary,
        } => circuit::execute(&config, features, classes, &sample, seed, summary),

        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
