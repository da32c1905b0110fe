//! Training metrics tracking and classification scoring.

use crate::error::MlError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Per-round loss history of an iterative fit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub epochs_completed: usize,
    pub loss_history: Vec<f64>,
    pub best_epoch: Option<usize>,
    pub best_loss: Option<f64>,
}

impl TrainingMetrics {
    pub fn record_epoch(&mut self, loss: f64) {
        self.loss_history.push(loss);
        self.epochs_completed += 1;

        if self.best_loss.is_none_or(|best| loss < best) {
            self.best_loss = Some(loss);
            self.best_epoch = Some(self.epochs_completed);
        }
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

/// Confusion matrix; rows are true labels, columns are predicted labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<usize>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &Array1<usize>, y_pred: &Array1<usize>, labels: &[usize]) -> Result<Self, MlError> {
        check_lengths(y_true, y_pred)?;
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (t, p) in y_true.iter().zip(y_pred) {
            if let (Some(i), Some(j)) = (labels.iter().position(|l| l == t), labels.iter().position(|l| l == p)) {
                counts[i][j] += 1;
            }
        }
        Ok(Self {
            labels: labels.to_vec(),
            counts,
        })
    }

    fn true_positives(&self, i: usize) -> usize {
        self.counts[i][i]
    }

    fn support(&self, i: usize) -> usize {
        self.counts[i].iter().sum()
    }

    fn predicted(&self, i: usize) -> usize {
        self.counts.iter().map(|row| row[i]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "true\\pred")?;
        for label in &self.labels {
            write!(f, " {label:>6}")?;
        }
        for (label, row) in self.labels.iter().zip(&self.counts) {
            writeln!(f)?;
            write!(f, "{label:>9}")?;
            for count in row {
                write!(f, " {count:>6}")?;
            }
        }
        Ok(())
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class and averaged scores of a set of predictions.
///
/// Undefined ratios (no predictions or no support for a class) count as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    pub confusion_matrix: ConfusionMatrix,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn check_lengths(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<(), MlError> {
    if y_true.len() != y_pred.len() {
        return Err(MlError::invalid_input(format!(
            "{} true labels but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}

/// Sorted union of the labels appearing in any of the given arrays.
pub fn label_union<'a>(arrays: impl IntoIterator<Item = &'a Array1<usize>>) -> Vec<usize> {
    let set: BTreeSet<usize> = arrays.into_iter().flat_map(|a| a.iter().copied()).collect();
    set.into_iter().collect()
}

impl ClassificationReport {
    /// Score predictions over an explicit label set.
    pub fn new(y_true: &Array1<usize>, y_pred: &Array1<usize>, labels: &[usize]) -> Result<Self, MlError> {
        let cm = ConfusionMatrix::new(y_true, y_pred, labels)?;
        let classes: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let precision = ratio(cm.true_positives(i), cm.predicted(i));
                let recall = ratio(cm.true_positives(i), cm.support(i));
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1_score: harmonic(precision, recall),
                    support: cm.support(i),
                }
            })
            .collect();

        let total: usize = classes.iter().map(|c| c.support).sum();
        let n = classes.len().max(1) as f64;
        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n,
            support: total,
        };
        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes.iter().map(|c| metric(c) * c.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = AverageMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support: total,
        };
        let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

        Ok(Self {
            classes,
            accuracy: ratio(correct, y_true.len()),
            macro_avg,
            weighted_avg,
            confusion_matrix: cm,
        })
    }

    /// Score predictions over the labels present in either array.
    pub fn from_predictions(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<Self, MlError> {
        Self::new(y_true, y_pred, &label_union([y_true, y_pred]))
    }

    pub fn class(&self, label: usize) -> Option<&ClassMetrics> {
        self.classes.iter().find(|c| c.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = 12;
        writeln!(f, "{:>w$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1_score, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, avg.support
            )?;
        }
        Ok(())
    }
}

/// Unweighted mean F1 over the labels present in either array.
pub fn f1_macro(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64, MlError> {
    Ok(ClassificationReport::from_predictions(y_true, y_pred)?.macro_avg.f1_score)
}
