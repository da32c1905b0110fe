//! Gradient-boosted trees for binary classification.
//!
//! Each round fits a regression tree to the gradient and hessian of the
//! logistic loss. Splits are found by the exact greedy method over feature
//! orderings sorted once per fit; trees are grown level by level up to
//! `max_depth`. Leaf weights are `-G / (H + lambda)`, shrunk by the learning
//! rate.

use super::{Classifier, Predict, check_shapes, encode_classes};
use crate::error::MlError;
use crate::training::metrics::TrainingMetrics;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoosting {
    /// Shrinkage applied to every leaf weight.
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Number of boosting rounds (trees).
    pub n_estimators: usize,
    /// L2 regularization on leaf weights.
    pub reg_lambda: f64,
    /// Minimum hessian sum in each child of a split.
    pub min_child_weight: f64,
    /// Fraction of rows sampled for each tree.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            max_depth: 6,
            n_estimators: 100,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            subsample: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum RegNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<RegNode>,
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                RegNode::Leaf { value } => return *value,
                RegNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }
}

/// A fitted boosted ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedModel {
    classes: Vec<usize>,
    base_margin: f64,
    trees: Vec<RegressionTree>,
    history: TrainingMetrics,
}

impl GradientBoostedModel {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Training log-loss after each round.
    pub fn history(&self) -> &TrainingMetrics {
        &self.history
    }

    fn margin(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

impl Predict for GradientBoostedModel {
    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut proba = Array2::<f64>::zeros((x.nrows(), 2));
        for (row, mut out) in x.rows().into_iter().zip(proba.rows_mut()) {
            let p = sigmoid(self.margin(row));
            out[0] = 1.0 - p;
            out[1] = p;
        }
        proba
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn log_loss(target: &[f64], margin: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    let total: f64 = target
        .iter()
        .zip(margin)
        .map(|(t, m)| {
            let p = sigmoid(*m).clamp(EPS, 1.0 - EPS);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    total / target.len().max(1) as f64
}

impl Classifier for GradientBoosting {
    type Model = GradientBoostedModel;

    fn fit(&self, x: &Array2<f64>, y: &Array1<usize>) -> Result<GradientBoostedModel, MlError> {
        check_shapes(x, y)?;
        self.validate()?;
        let (classes, positions) = encode_classes(y);
        if classes.len() != 2 {
            return Err(MlError::training(format!(
                "gradient boosting needs exactly two classes, found {classes:?}"
            )));
        }

        let n = x.nrows();
        let target: Vec<f64> = positions.iter().map(|&p| p as f64).collect();
        let sorted = presort(x);
        let base_margin = 0.0;
        let mut margin = vec![base_margin; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut history = TrainingMetrics::default();
        let mut trees = Vec::with_capacity(self.n_estimators);

        for round in 0..self.n_estimators {
            for i in 0..n {
                let p = sigmoid(margin[i]);
                grad[i] = p - target[i];
                hess[i] = (p * (1.0 - p)).max(1e-16);
            }
            let in_sample: Vec<bool> = if self.subsample < 1.0 {
                (0..n).map(|_| rng.gen_bool(self.subsample)).collect()
            } else {
                vec![true; n]
            };

            let tree = self.grow_tree(x, &sorted, &grad, &hess, &in_sample);
            for (i, row) in x.rows().into_iter().enumerate() {
                margin[i] += tree.predict_row(row);
            }
            trees.push(tree);

            let loss = log_loss(&target, &margin);
            history.record_epoch(loss);
            tracing::trace!(round, loss, "Boosting round");
        }

        tracing::debug!(
            trees = trees.len(),
            learning_rate = self.learning_rate,
            max_depth = self.max_depth,
            final_loss = history.loss_history.last().copied().unwrap_or(f64::NAN),
            "Fitted gradient-boosted trees"
        );
        Ok(GradientBoostedModel {
            classes,
            base_margin,
            trees,
            history,
        })
    }
}

/// Row indices ordered by value, one list per feature.
fn presort(x: &Array2<f64>) -> Vec<Vec<usize>> {
    x.columns()
        .into_iter()
        .map(|column| {
            let mut order: Vec<usize> = (0..column.len()).collect();
            order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
            order
        })
        .collect()
}

#[derive(Clone, Copy)]
struct NodeStats {
    grad: f64,
    hess: f64,
}

#[derive(Clone, Copy)]
struct BestSplit {
    gain: f64,
    feature: usize,
    threshold: f64,
}

#[derive(Clone, Copy, Default)]
struct ScanState {
    grad: f64,
    hess: f64,
    last: Option<f64>,
}

impl GradientBoosting {
    fn validate(&self) -> Result<(), MlError> {
        if self.n_estimators == 0 {
            return Err(MlError::config("n_estimators must be at least 1"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(MlError::config("learning_rate must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(MlError::config("subsample must be in (0, 1]"));
        }
        if self.reg_lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(MlError::config("reg_lambda and min_child_weight must be non-negative"));
        }
        Ok(())
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.reg_lambda)
    }

    fn grow_tree(
        &self,
        x: &Array2<f64>,
        sorted: &[Vec<usize>],
        grad: &[f64],
        hess: &[f64],
        in_sample: &[bool],
    ) -> RegressionTree {
        let n = x.nrows();
        let mut node_of: Vec<Option<usize>> = (0..n).map(|i| in_sample[i].then_some(0)).collect();
        let mut stats = vec![NodeStats {
            grad: (0..n).filter(|&i| in_sample[i]).map(|i| grad[i]).sum(),
            hess: (0..n).filter(|&i| in_sample[i]).map(|i| hess[i]).sum(),
        }];
        let mut nodes = vec![RegNode::Leaf { value: 0.0 }];
        let mut open = vec![0usize];

        for _depth in 0..self.max_depth {
            if open.is_empty() {
                break;
            }
            let mut slot_of = vec![None; nodes.len()];
            for (slot, &node) in open.iter().enumerate() {
                slot_of[node] = Some(slot);
            }
            let mut best: Vec<Option<BestSplit>> = vec![None; open.len()];

            for (feature, order) in sorted.iter().enumerate() {
                let mut scan = vec![ScanState::default(); open.len()];
                for &row in order {
                    let Some(slot) = node_of[row].and_then(|node| slot_of[node]) else {
                        continue;
                    };
                    let value = x[[row, feature]];
                    let state = &mut scan[slot];
                    if let Some(prev) = state.last {
                        if value != prev {
                            let parent = stats[open[slot]];
                            let (gl, hl) = (state.grad, state.hess);
                            let (gr, hr) = (parent.grad - gl, parent.hess - hl);
                            if hl >= self.min_child_weight && hr >= self.min_child_weight {
                                let gain = self.score(gl, hl) + self.score(gr, hr)
                                    - self.score(parent.grad, parent.hess);
                                if gain > best[slot].map_or(1e-12, |b| b.gain) {
                                    best[slot] = Some(BestSplit {
                                        gain,
                                        feature,
                                        threshold: (prev + value) / 2.0,
                                    });
                                }
                            }
                        }
                    }
                    state.grad += grad[row];
                    state.hess += hess[row];
                    state.last = Some(value);
                }
            }

            let mut next_open = Vec::new();
            let mut children: Vec<Option<(usize, usize)>> = vec![None; open.len()];
            for (slot, split) in best.iter().enumerate() {
                let Some(split) = split else { continue };
                let left = nodes.len();
                let right = left + 1;
                nodes.push(RegNode::Leaf { value: 0.0 });
                nodes.push(RegNode::Leaf { value: 0.0 });
                stats.push(NodeStats { grad: 0.0, hess: 0.0 });
                stats.push(NodeStats { grad: 0.0, hess: 0.0 });
                nodes[open[slot]] = RegNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
                children[slot] = Some((left, right));
                next_open.push(left);
                next_open.push(right);
            }

            for row in 0..n {
                let Some(node) = node_of[row] else { continue };
                let routed = slot_of
                    .get(node)
                    .copied()
                    .flatten()
                    .and_then(|slot| children[slot].zip(best[slot]));
                node_of[row] = routed.map(|((left, right), split)| {
                    let child = if x[[row, split.feature]] <= split.threshold {
                        left
                    } else {
                        right
                    };
                    stats[child].grad += grad[row];
                    stats[child].hess += hess[row];
                    child
                });
            }
            open = next_open;
        }

        for (node, stat) in nodes.iter_mut().zip(&stats) {
            if let RegNode::Leaf { value } = node {
                *value = -stat.grad / (stat.hess + self.reg_lambda) * self.learning_rate;
            }
        }
        RegressionTree { nodes }
    }
}
