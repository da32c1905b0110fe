//! Class rebalancing by synthetic minority oversampling.

use crate::data::{ClassDistribution, FeatureMatrix};
use crate::error::MlError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Produces a rebalanced copy of a labelled matrix.
pub trait Resample {
    fn fit_resample(
        &self,
        x: &FeatureMatrix,
        y: &Array1<usize>,
    ) -> Result<(FeatureMatrix, Array1<usize>), MlError>;
}

/// Synthetic minority oversampling (SMOTE).
///
/// Every class smaller than the majority is grown to the majority count by
/// interpolating between a random member and one of its `k_neighbors`
/// nearest same-class neighbours. Originals keep their positions; synthetic
/// rows are appended class by class in label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Smote {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self {
            k_neighbors: 2,
            seed: 42,
        }
    }
}

impl Resample for Smote {
    fn fit_resample(
        &self,
        x: &FeatureMatrix,
        y: &Array1<usize>,
    ) -> Result<(FeatureMatrix, Array1<usize>), MlError> {
        if x.n_rows() != y.len() {
            return Err(MlError::invalid_input(format!(
                "{} rows but {} labels",
                x.n_rows(),
                y.len()
            )));
        }
        if self.k_neighbors == 0 {
            return Err(MlError::config("k_neighbors must be at least 1"));
        }

        let distribution = ClassDistribution::from_labels(y);
        if distribution.0.len() < 2 {
            return Err(MlError::insufficient_samples(format!(
                "oversampling needs at least two classes, found {:?}",
                distribution.classes()
            )));
        }
        let majority = distribution.0.values().copied().max().unwrap_or(0);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut synthetic_rows: Vec<f64> = Vec::new();
        let mut synthetic_labels: Vec<usize> = Vec::new();

        for (&class, &count) in &distribution.0 {
            let n_new = majority - count;
            if n_new == 0 {
                continue;
            }
            let members: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, label)| **label == class)
                .map(|(i, _)| i)
                .collect();
            let k = self.k_neighbors.min(members.len() - 1);
            if k < self.k_neighbors {
                tracing::warn!(
                    class,
                    members = members.len(),
                    requested = self.k_neighbors,
                    used = k,
                    "Class too small for requested neighbour count"
                );
            }
            let neighbours = nearest_neighbours(x.values(), &members, k);

            for _ in 0..n_new {
                let pick = rng.gen_range(0..members.len());
                let base = x.values().row(members[pick]);
                if k == 0 {
                    synthetic_rows.extend(base.iter());
                } else {
                    let other = x.values().row(neighbours[pick][rng.gen_range(0..k)]);
                    let gap: f64 = rng.gen_range(0.0..1.0);
                    synthetic_rows.extend(interpolate(base, other, gap));
                }
                synthetic_labels.push(class);
            }
            tracing::debug!(class, generated = n_new, k, "Generated synthetic samples");
        }

        let synthetic = Array2::from_shape_vec((synthetic_labels.len(), x.n_cols()), synthetic_rows)
            .map_err(|e| MlError::training(e.to_string()))?;
        let x_out = x.append_rows(&synthetic)?;
        let y_out: Array1<usize> = y.iter().copied().chain(synthetic_labels).collect();
        Ok((x_out, y_out))
    }
}

fn interpolate<'a>(
    base: ArrayView1<'a, f64>,
    other: ArrayView1<'a, f64>,
    gap: f64,
) -> impl Iterator<Item = f64> + 'a {
    base.into_iter()
        .zip(other)
        .map(move |(a, b)| a + gap * (b - a))
}

/// For each member, the row indices of its `k` nearest other members.
fn nearest_neighbours(x: &Array2<f64>, members: &[usize], k: usize) -> Vec<Vec<usize>> {
    members
        .iter()
        .map(|&i| {
            let row = x.row(i);
            let mut distances: Vec<(f64, usize)> = members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| {
                    let d: f64 = row
                        .iter()
                        .zip(x.row(j))
                        .map(|(a, b)| (a - b).powi(2))
                        .sum();
                    (d, j)
                })
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix(values: Array2<f64>) -> FeatureMatrix {
        let columns = (0..values.ncols()).map(|i| format!("f{i}")).collect();
        FeatureMatrix::new(columns, values).unwrap()
    }

    #[test]
    fn test_balances_classes() {
        let x = matrix(array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [5.0, 5.0],
            [6.0, 5.0],
            [5.0, 6.0]
        ]);
        let y = array![0, 0, 0, 0, 1, 1, 0];
        let (x_out, y_out) = Smote::default().fit_resample(&x, &y).unwrap();
        let dist = ClassDistribution::from_labels(&y_out);
        assert!(dist.is_balanced());
        assert_eq!(dist.count(0), 5);
        assert_eq!(x_out.n_rows(), 10);
        // originals first
        assert_eq!(x_out.values().row(0), x.values().row(0));
    }

    #[test]
    fn test_synthetic_points_lie_between_minority_samples() {
        let x = matrix(array![[0.0], [1.0], [2.0], [3.0], [10.0], [12.0]]);
        let y = array![0, 0, 0, 0, 1, 1];
        let (x_out, y_out) = Smote::default().fit_resample(&x, &y).unwrap();
        for (value, label) in x_out.values().column(0).iter().zip(&y_out).skip(6) {
            assert_eq!(*label, 1);
            assert!((10.0..=12.0).contains(value));
        }
    }

    #[test]
    fn test_single_member_class_is_duplicated() {
        let x = matrix(array![[0.0], [1.0], [2.0], [9.0]]);
        let y = array![0, 0, 0, 1];
        let (x_out, y_out) = Smote::default().fit_resample(&x, &y).unwrap();
        assert!(ClassDistribution::from_labels(&y_out).is_balanced());
        assert!(x_out.values().column(0).iter().skip(4).all(|v| *v == 9.0));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let x = matrix(array![[0.0], [1.0], [2.0], [3.0], [10.0], [11.0], [13.0]]);
        let y = array![0, 0, 0, 0, 1, 1, 1];
        let a = Smote::default().fit_resample(&x, &y).unwrap();
        let b = Smote::default().fit_resample(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_is_error() {
        let x = matrix(array![[0.0], [1.0]]);
        assert!(Smote::default().fit_resample(&x, &array![1, 1]).is_err());
    }
}
