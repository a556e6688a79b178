//! Train command implementation.

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use dru_core::{
    EpochRecord, LabelSet, ReuploadingCircuit, SavedModel, TrainOutcome, Trainer,
    TrainingObserver, TrainingState, evaluate_classification,
};

use super::common::{load_dataset, load_run_config, make_rng, print_evaluation, write_json};

/// Arguments of `dru train`.
pub struct TrainArgs<'a> {
    pub config: &'a str,
    pub train: &'a str,
    pub validation: Option<&'a str>,
    pub validation_fraction: f64,
    pub output: &'a str,
    pub history: Option<&'a str>,
    pub seed: Option<u64>,
    pub epochs: Option<usize>,
}

/// Renders epochs as an `indicatif` progress bar.
struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl TrainingObserver for ProgressObserver {
    fn on_start(&mut self, epochs: usize) {
        self.bar.set_length(epochs as u64);
    }

    fn on_epoch(&mut self, record: &EpochRecord, _state: TrainingState) {
        self.bar.set_message(format!(
            "loss {:.5}  acc train {:.3}  val {:.3}",
            record.loss, record.acc_train, record.acc_val
        ));
        self.bar.inc(1);
    }

    fn on_finish(&mut self, _outcome: &TrainOutcome) {
        self.bar.finish_and_clear();
    }
}

/// Execute the train command.
pub fn execute(args: &TrainArgs<'_>) -> Result<()> {
    let mut config = load_run_config(args.config)?;
    if let Some(seed) = args.seed {
        config.training.seed = Some(seed);
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    let mut rng = make_rng(config.training.seed);

    let dataset = load_dataset(args.train)?;
    let (train, validation) = match args.validation {
        Some(path) => (dataset, load_dataset(path)?),
        None => dataset.train_validation_split(args.validation_fraction, &mut rng)?,
    };
    if validation.is_empty() {
        anyhow::bail!(
            "Validation set is empty; pass --validation or raise --validation-fraction"
        );
    }

    let num_classes = train.num_classes().max(validation.num_classes());
    let circuit_config = config.model.circuit_config(num_classes)?;
    let circuit = ReuploadingCircuit::new(circuit_config)?;
    let labels = LabelSet::for_register(num_classes, circuit_config.qubits)?;

    println!(
        "{} Training on {} samples ({} validation), {} features, {} classes",
        style("→").cyan().bold(),
        style(train.len()).green(),
        validation.len(),
        train.num_features(),
        num_classes
    );
    println!(
        "  Circuit: {} qubits, {} layers, {} entanglement",
        circuit_config.qubits, circuit_config.layers, circuit_config.entanglement
    );
    println!(
        "  Cost: {}, stepsize {}, batch size {}, up to {} epochs",
        style(config.training.cost).yellow(),
        config.training.stepsize,
        config.training.batch_size,
        config.training.epochs
    );

    let init = circuit.init_parameters(train.num_features(), &mut rng)?;
    let trainer = Trainer::new(&circuit, &labels, config.training.clone())?;
    let mut optimizer = config.training.optimizer()?;
    let mut observer = ProgressObserver::new()?;
    let outcome = trainer.fit_with(
        &mut optimizer,
        &train,
        &validation,
        &init,
        &mut rng,
        &mut observer,
    )?;

    println!(
        "{} Training {} after {} epochs",
        style("✓").green().bold(),
        outcome.state,
        outcome.epochs_run()
    );
    match outcome.best_loss {
        Some(loss) => println!(
            "  Best loss: {}  (validation accuracy {:.4})",
            style(format!("{loss:.6}")).yellow(),
            outcome.best_acc_val
        ),
        None => println!("  No epoch ran; saving the initial parameters"),
    }

    let model = SavedModel::from_outcome(
        circuit_config,
        num_classes,
        train.num_features(),
        config.training.cost,
        &outcome,
    );
    model.to_file(args.output)?;
    println!("  Model: {}", style(args.output).green());

    if let Some(path) = args.history {
        write_json(path, &outcome.history)?;
        println!("  History: {}", style(path).green());
    }

    let evaluation = evaluate_classification(
        &circuit,
        &outcome.best_parameters()?,
        &train,
        &validation,
        true,
    )?;
    print_evaluation(&evaluation);

    Ok(())
}
