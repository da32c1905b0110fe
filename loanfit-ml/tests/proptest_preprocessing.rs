//! Property-based tests for preprocessing stages using proptest.

use proptest::prelude::*;

use loanfit_ml::data::{ClassDistribution, FeatureMatrix};
use loanfit_ml::data::schema::{PERSON_AGE, PERSON_EMP_EXP};
use loanfit_ml::preprocessing::{
    AnomalyFixer, Fit, MedianImputer, OrdinalMap, Resample, RobustScaler, Smote, Transform,
    train_test_split,
};
use loanfit_ml::training::StratifiedKFold;
use ndarray::{Array1, Array2};

fn age_exp_matrix(rows: &[(f64, f64)]) -> FeatureMatrix {
    let values = Array2::from_shape_fn((rows.len(), 2), |(i, j)| if j == 0 { rows[i].0 } else { rows[i].1 });
    FeatureMatrix::new(vec![PERSON_AGE.into(), PERSON_EMP_EXP.into()], values).unwrap()
}

// --- Split properties ---

proptest! {
    #[test]
    fn split_partitions_rows(n in 2usize..300, test_size in 0.01f64..0.99, seed in any::<u64>()) {
        let n_test = (test_size * n as f64).ceil() as usize;
        match train_test_split(n, test_size, seed) {
            Ok(split) => {
                prop_assert_eq!(split.test.len(), n_test);
                prop_assert_eq!(split.train.len() + split.test.len(), n);
                let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
                all.sort_unstable();
                prop_assert_eq!(all, (0..n).collect::<Vec<_>>());
            }
            Err(_) => prop_assert!(n_test >= n),
        }
    }

    #[test]
    fn split_is_deterministic(n in 2usize..200, seed in any::<u64>()) {
        let a = train_test_split(n, 0.2, seed);
        let b = train_test_split(n, 0.2, seed);
        prop_assert_eq!(a.ok(), b.ok());
    }
}

// --- Anomaly fixing ---

proptest! {
    #[test]
    fn anomaly_fixing_respects_bounds(
        train in prop::collection::vec((0.0f64..200.0, 0.0f64..150.0), 1..40),
        test in prop::collection::vec((0.0f64..200.0, 0.0f64..150.0), 1..20),
    ) {
        // Guarantee one in-range value per column.
        let mut train = train;
        train.push((30.0, 5.0));
        let train = age_exp_matrix(&train);
        let test = age_exp_matrix(&test);

        let fixer = AnomalyFixer::default().fit(&train).unwrap();
        for fixed in [fixer.transform(&train).unwrap(), fixer.transform(&test).unwrap()] {
            prop_assert!(fixed.column(PERSON_AGE).unwrap().iter().all(|v| *v <= 100.0));
            prop_assert!(fixed.column(PERSON_EMP_EXP).unwrap().iter().all(|v| *v <= 75.0));
        }
    }

    #[test]
    fn fitted_statistics_depend_only_on_train(
        train in prop::collection::vec((0.0f64..100.0, 0.0f64..75.0), 2..30),
        test_a in prop::collection::vec((0.0f64..500.0, 0.0f64..500.0), 1..10),
        test_b in prop::collection::vec((0.0f64..500.0, 0.0f64..500.0), 1..10),
    ) {
        let train = age_exp_matrix(&train);
        let imputer = MedianImputer.fit(&train).unwrap();
        let scaler = RobustScaler::default().fit(&train).unwrap();

        // Transforming different test sets never changes the fitted state.
        let _ = imputer.transform(&age_exp_matrix(&test_a)).unwrap();
        let _ = scaler.transform(&age_exp_matrix(&test_b)).unwrap();
        let imputer_again = MedianImputer.fit(&train).unwrap();
        let scaler_again = RobustScaler::default().fit(&train).unwrap();
        prop_assert_eq!(imputer.medians(), imputer_again.medians());
        prop_assert_eq!(scaler.center(), scaler_again.center());
        prop_assert_eq!(scaler.scale(), scaler_again.scale());
    }
}

// --- Resampling ---

proptest! {
    #[test]
    fn smote_balances_classes(
        rows in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 4..60),
        labels in prop::collection::vec(0usize..3, 4..60),
        k in 1usize..5,
        seed in any::<u64>(),
    ) {
        let n = rows.len().min(labels.len());
        let mut labels: Vec<usize> = labels[..n].to_vec();
        // Two classes at least.
        labels[0] = 0;
        labels[1] = 1;
        let x = age_exp_matrix(&rows[..n]);
        let y = Array1::from(labels);

        let (x_out, y_out) = Smote { k_neighbors: k, seed }.fit_resample(&x, &y).unwrap();
        let after = ClassDistribution::from_labels(&y_out);
        prop_assert!(after.is_balanced());
        prop_assert_eq!(x_out.n_rows(), y_out.len());
        let before = ClassDistribution::from_labels(&y);
        prop_assert_eq!(after.classes(), before.classes());
        prop_assert_eq!(x_out.select_rows(&(0..n).collect::<Vec<_>>()), x);
    }
}

// --- Encoding ---

proptest! {
    #[test]
    fn ordinal_decode_inverts_encode(which in 0usize..3, pick in any::<prop::sample::Index>()) {
        let map = vec![OrdinalMap::gender(), OrdinalMap::education(), OrdinalMap::previous_defaults()]
            .swap_remove(which);
        let category = map.categories[pick.index(map.categories.len())].clone();
        let code = map.encode(&category).unwrap();
        prop_assert_eq!(map.decode(code), Some(category.as_str()));
    }
}

// --- Cross-validation ---

proptest! {
    #[test]
    fn stratified_folds_partition_indices(
        labels in prop::collection::vec(0usize..2, 8..80),
        folds in 2usize..5,
    ) {
        let mut labels = labels;
        for i in 0..folds {
            labels[i] = 0;
            labels[folds + i] = 1;
        }
        let y = Array1::from(labels);
        let splits = StratifiedKFold::new(folds).split(&y).unwrap();
        prop_assert_eq!(splits.len(), folds);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..y.len()).collect::<Vec<_>>());

        let positives = y.iter().filter(|l| **l == 1).count();
        for split in &splits {
            prop_assert_eq!(split.train_indices.len() + split.test_indices.len(), y.len());
            let fold_pos = split.test_indices.iter().filter(|&&i| y[i] == 1).count();
            prop_assert!(fold_pos.abs_diff(positives / folds) <= 1);
        }
    }
}
