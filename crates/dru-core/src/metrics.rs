//! Classification metrics.
//!
//! Confusion matrices and per-class precision/recall/F1 over an explicit
//! class list, plus ROC curves and AUC for binary problems. Divisions by
//! zero (a class never predicted, or absent from the ground truth) count as
//! 0.

use std::collections::BTreeSet;
use std::fmt;

use ndarray::Array2;
use serde::Serialize;
use tracing::warn;

use crate::circuit::StateEvaluator;
use crate::dataset::Dataset;
use crate::encoding::Parameters;
use crate::error::{DruError, DruResult};
use crate::predict::{predict, predict_proba};

// ---------------------------------------------------------------------------
// Confusion matrix
// ---------------------------------------------------------------------------

/// Counts of (true class, predicted class) pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "RawConfusion")]
pub struct ConfusionMatrix {
    classes: Vec<usize>,
    counts: Array2<usize>,
}

#[derive(Serialize)]
struct RawConfusion {
    classes: Vec<usize>,
    counts: Vec<Vec<usize>>,
}

impl From<ConfusionMatrix> for RawConfusion {
    fn from(m: ConfusionMatrix) -> Self {
        RawConfusion {
            counts: m.counts.rows().into_iter().map(|r| r.to_vec()).collect(),
            classes: m.classes,
        }
    }
}

impl ConfusionMatrix {
    /// Class order of rows and columns.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Row `i` = true class `classes[i]`, column `j` = predicted `classes[j]`.
    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    /// Number of samples counted.
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Number of samples on the diagonal.
    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .map(|c| c.to_string().len())
            .chain(self.classes.iter().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);
        write!(f, "{:>9}", "true\\pred")?;
        for c in &self.classes {
            write!(f, " {c:>width$}")?;
        }
        writeln!(f)?;
        for (class, row) in self.classes.iter().zip(self.counts.rows()) {
            write!(f, "{class:>9}")?;
            for count in row {
                write!(f, " {count:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Confusion matrix over `classes`. Pairs whose true or predicted class is
/// not in `classes` are skipped.
pub fn confusion_matrix(
    y_true: &[usize],
    y_pred: &[usize],
    classes: &[usize],
) -> DruResult<ConfusionMatrix> {
    check_pairs(y_true, y_pred)?;
    let index_of = |c: usize| classes.iter().position(|&k| k == c);
    let mut counts = Array2::zeros((classes.len(), classes.len()));
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if let (Some(i), Some(j)) = (index_of(t), index_of(p)) {
            counts[[i, j]] += 1;
        }
    }
    Ok(ConfusionMatrix {
        classes: classes.to_vec(),
        counts,
    })
}

fn check_pairs(y_true: &[usize], y_pred: &[usize]) -> DruResult<()> {
    if y_true.len() != y_pred.len() {
        return Err(DruError::ShapeMismatch(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(DruError::EmptyDataset("label set"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Classification report
// ---------------------------------------------------------------------------

/// Precision, recall, F1 and support of one class or an average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScores {
    /// True positives over predicted positives.
    pub precision: f64,
    /// True positives over actual positives.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Samples whose true label is this class.
    pub support: usize,
}

/// Per-class scores with accuracy and macro / weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// `(class, scores)` in class order.
    pub per_class: Vec<(usize, ClassScores)>,
    /// Diagonal over total of the underlying confusion matrix.
    pub accuracy: f64,
    /// Unweighted mean over classes.
    pub macro_avg: ClassScores,
    /// Support-weighted mean over classes.
    pub weighted_avg: ClassScores,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl ClassificationReport {
    /// Derive the report from a confusion matrix.
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let counts = matrix.counts();
        let per_class: Vec<(usize, ClassScores)> = matrix
            .classes()
            .iter()
            .enumerate()
            .map(|(i, &class)| {
                let tp = counts[[i, i]];
                let predicted = counts.column(i).sum();
                let support = counts.row(i).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                (
                    class,
                    ClassScores {
                        precision,
                        recall,
                        f1,
                        support,
                    },
                )
            })
            .collect();

        let total: usize = per_class.iter().map(|(_, s)| s.support).sum();
        let n = per_class.len().max(1) as f64;
        let mean = |f: fn(&ClassScores) -> f64| per_class.iter().map(|(_, s)| f(s)).sum::<f64>() / n;
        let weighted = |f: fn(&ClassScores) -> f64| {
            if total == 0 {
                0.0
            } else {
                per_class
                    .iter()
                    .map(|(_, s)| f(s) * s.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };

        let macro_avg = ClassScores {
            precision: mean(|s| s.precision),
            recall: mean(|s| s.recall),
            f1: mean(|s| s.f1),
            support: total,
        };
        let weighted_avg = ClassScores {
            precision: weighted(|s| s.precision),
            recall: weighted(|s| s.recall),
            f1: weighted(|s| s.f1),
            support: total,
        };
        Self {
            accuracy: ratio(matrix.correct(), matrix.total()),
            per_class,
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, name: &str, s: &ClassScores| {
            writeln!(
                f,
                "{name:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                s.precision, s.recall, s.f1, s.support
            )
        };
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (class, scores) in &self.per_class {
            row(f, &class.to_string(), scores)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

/// Confusion matrix and report in one call.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    classes: &[usize],
) -> DruResult<ClassificationReport> {
    Ok(ClassificationReport::from_confusion(&confusion_matrix(
        y_true, y_pred, classes,
    )?))
}

// ---------------------------------------------------------------------------
// ROC
// ---------------------------------------------------------------------------

/// Receiver operating characteristic of a binary scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// False-positive rate per threshold, starting at 0.
    pub fpr: Vec<f64>,
    /// True-positive rate per threshold, starting at 0.
    pub tpr: Vec<f64>,
    /// Decreasing thresholds; the first is `+∞`.
    #[serde(skip)]
    pub thresholds: Vec<f64>,
}

/// ROC curve for `scores` against `positive` flags. One point per distinct
/// score, from the highest threshold down.
pub fn roc_curve(positive: &[bool], scores: &[f64]) -> DruResult<RocCurve> {
    if positive.len() != scores.len() {
        return Err(DruError::ShapeMismatch(format!(
            "{} labels but {} scores",
            positive.len(),
            scores.len()
        )));
    }
    if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
        return Err(DruError::NumericalInstability {
            context: "ROC score".into(),
            value: *bad,
        });
    }
    let n_pos = positive.iter().filter(|&&p| p).count();
    let n_neg = positive.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(DruError::InvalidInput(
            "ROC needs both positive and negative samples".into(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    let (mut tp, mut fp) = (0usize, 0usize);
    for (k, &i) in order.iter().enumerate() {
        if positive[i] {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_score = order
            .get(k + 1)
            .is_none_or(|&next| scores[next] != scores[i]);
        if last_of_score {
            curve.fpr.push(fp as f64 / n_neg as f64);
            curve.tpr.push(tp as f64 / n_pos as f64);
            curve.thresholds.push(scores[i]);
        }
    }
    Ok(curve)
}

/// Trapezoidal area under a curve with non-decreasing `x`.
pub fn auc(x: &[f64], y: &[f64]) -> DruResult<f64> {
    if x.len() != y.len() {
        return Err(DruError::ShapeMismatch(format!(
            "{} x values but {} y values",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(DruError::InvalidInput(
            "area under curve needs at least 2 points".into(),
        ));
    }
    Ok(x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum())
}

// ---------------------------------------------------------------------------
// Model evaluation
// ---------------------------------------------------------------------------

/// Metrics of one data split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitEvaluation {
    /// Predicted label per sample, in input order.
    pub predictions: Vec<usize>,
    /// Counts over the evaluation's classes.
    pub confusion: ConfusionMatrix,
    /// Scores derived from `confusion`.
    pub report: ClassificationReport,
}

/// ROC analysis on the validation split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocAnalysis {
    /// Class treated as positive (the larger label).
    pub positive_class: usize,
    /// Operating points, one per distinct score.
    pub curve: RocCurve,
    /// Trapezoidal area under `curve`.
    pub auc: f64,
}

/// Full evaluation of trained parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Classes present in the ground truth of either split, ascending.
    pub classes: Vec<usize>,
    /// Training split.
    pub train: SplitEvaluation,
    /// Validation split.
    pub validation: SplitEvaluation,
    /// Present for binary problems when requested and computable.
    pub roc: Option<RocAnalysis>,
}

/// Predict both splits, tabulate them over the ground-truth classes and, for
/// binary problems with `with_roc`, score the validation split by the
/// positive class probability.
pub fn evaluate_classification<E: StateEvaluator + ?Sized>(
    evaluator: &E,
    params: &Parameters,
    train: &Dataset,
    validation: &Dataset,
    with_roc: bool,
) -> DruResult<Evaluation> {
    let classes: Vec<usize> = train
        .labels()
        .iter()
        .chain(validation.labels())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let split = |name: &str, data: &Dataset| -> DruResult<SplitEvaluation> {
        let predictions = predict(evaluator, data.features(), params)?;
        let outside = predictions.iter().filter(|&&p| !classes.contains(&p)).count();
        if outside > 0 {
            warn!(split = name, outside, "predictions outside the label set");
        }
        let confusion = confusion_matrix(data.labels(), &predictions, &classes)?;
        let report = ClassificationReport::from_confusion(&confusion);
        Ok(SplitEvaluation {
            predictions,
            confusion,
            report,
        })
    };
    let train_eval = split("train", train)?;
    let validation_eval = split("validation", validation)?;

    let roc = if with_roc && classes.len() == 2 {
        binary_roc(evaluator, params, validation, classes[1])?
    } else {
        None
    };

    Ok(Evaluation {
        classes,
        train: train_eval,
        validation: validation_eval,
        roc,
    })
}

fn binary_roc<E: StateEvaluator + ?Sized>(
    evaluator: &E,
    params: &Parameters,
    validation: &Dataset,
    positive_class: usize,
) -> DruResult<Option<RocAnalysis>> {
    let probs = predict_proba(evaluator, validation.features(), params)?;
    if positive_class >= probs.ncols() {
        warn!(positive_class, "positive class has no probability column, skipping ROC");
        return Ok(None);
    }
    let scores = probs.column(positive_class).to_vec();
    let positive: Vec<bool> = validation.labels().iter().map(|&y| y == positive_class).collect();
    if positive.iter().all(|&p| p) || positive.iter().all(|&p| !p) {
        warn!("validation split holds a single class, skipping ROC");
        return Ok(None);
    }
    let curve = roc_curve(&positive, &scores)?;
    let area = auc(&curve.fpr, &curve.tpr)?;
    Ok(Some(RocAnalysis {
        positive_class,
        curve,
        auc: area,
    }))
}
