//! CART classification tree with Gini impurity.

use crate::error::MlError;
use ndarray::{Array2, ArrayView1};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Decision tree configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth of the tree (`None` grows until leaves are pure).
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node.
    pub min_samples_split: usize,
    /// Minimum samples in each child of a split.
    pub min_samples_leaf: usize,
    /// Features drawn per split (`None` = all).
    pub max_features: Option<usize>,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        probs: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted classification tree over class positions `0..n_classes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_classes: usize,
    feature_importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

struct Builder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    n_classes: usize,
    params: TreeParams,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `samples` (repeats allowed, as in a bootstrap).
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        samples: &[usize],
        params: TreeParams,
    ) -> Result<Self, MlError> {
        if x.nrows() != y.len() {
            return Err(MlError::invalid_input(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if samples.is_empty() || n_classes == 0 {
            return Err(MlError::insufficient_samples("cannot grow a tree on no samples"));
        }
        if let Some(bad) = y.iter().find(|c| **c >= n_classes) {
            return Err(MlError::invalid_input(format!(
                "class position {bad} out of range for {n_classes} classes"
            )));
        }

        let mut builder = Builder {
            x,
            y,
            n_classes,
            params,
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
        };
        let mut samples = samples.to_vec();
        builder.grow(&mut samples, 0);

        let total: f64 = builder.importances.iter().sum();
        if total > 0.0 {
            builder.importances.iter_mut().for_each(|v| *v /= total);
        }

        Ok(Self {
            nodes: builder.nodes,
            n_classes,
            feature_importances: builder.importances,
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Normalized impurity decrease per feature.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Class probabilities of the leaf a sample falls into.
    pub fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { probs } => return probs,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

impl Builder<'_> {
    fn class_counts(&self, samples: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in samples {
            counts[self.y[i]] += 1.0;
        }
        counts
    }

    fn push_leaf(&mut self, counts: &[f64], n: f64) -> usize {
        let probs = counts.iter().map(|c| c / n).collect();
        self.nodes.push(Node::Leaf { probs });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len() as f64;
        let counts = self.class_counts(samples);
        let impurity = gini(&counts, n);

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || samples.len() < self.params.min_samples_split
            || samples.len() < 2 * self.params.min_samples_leaf
            || impurity <= f64::EPSILON
        {
            return self.push_leaf(&counts, n);
        }

        let Some(best) = self.best_split(samples, &counts, impurity) else {
            return self.push_leaf(&counts, n);
        };
        self.importances[best.feature] += best.decrease;

        let x = self.x;
        samples.sort_by(|&a, &b| {
            let left_a = x[[a, best.feature]] <= best.threshold;
            let left_b = x[[b, best.feature]] <= best.threshold;
            left_b.cmp(&left_a)
        });
        let n_left = samples
            .iter()
            .take_while(|&&i| x[[i, best.feature]] <= best.threshold)
            .count();

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { probs: Vec::new() });
        let (left_samples, right_samples) = samples.split_at_mut(n_left);
        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, samples: &[usize], counts: &[f64], impurity: f64) -> Option<SplitCandidate> {
        let n_features = self.x.ncols();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);
        features.truncate(self.params.max_features.unwrap_or(n_features).clamp(1, n_features));

        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<(f64, usize)> = Vec::with_capacity(n);

        for feature in features {
            order.clear();
            order.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            order.sort_by(|a, b| a.0.total_cmp(&b.0));
            if order[0].0 == order[n - 1].0 {
                continue;
            }

            let mut left = vec![0.0; self.n_classes];
            for pos in 0..n - 1 {
                left[order[pos].1] += 1.0;
                let n_left = pos + 1;
                if order[pos].0 == order[pos + 1].0 || n_left < min_leaf || n - n_left < min_leaf {
                    continue;
                }
                let right: Vec<f64> = counts.iter().zip(&left).map(|(t, l)| t - l).collect();
                let nl = n_left as f64;
                let nr = (n - n_left) as f64;
                let weighted = (nl * gini(&left, nl) + nr * gini(&right, nr)) / n as f64;
                let decrease = n as f64 * (impurity - weighted);
                if decrease > best.as_ref().map_or(f64::EPSILON, |b| b.decrease) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (order[pos].0 + order[pos + 1].0) / 2.0,
                        decrease,
                    });
                }
            }
        }
        best
    }
}
