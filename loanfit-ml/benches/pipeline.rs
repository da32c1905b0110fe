use criterion::{Criterion, black_box, criterion_group, criterion_main};
use loanfit_ml::data::FeatureMatrix;
use loanfit_ml::models::{Classifier, GradientBoosting, RandomForest};
use loanfit_ml::preprocessing::{Fit, MedianImputer, Resample, RobustScaler, Smote, Transform};
use loanfit_ml::training::BoostingGrid;
use loanfit_ml::{LoanModelTrainer, MlConfig, RawTable};
use ndarray::{Array1, Array2};

const HEADER: &str = "person_age,person_gender,person_education,person_income,person_emp_exp,person_home_ownership,loan_amnt,loan_intent,previous_loan_defaults_on_file,loan_status";

fn synthetic_table(n: usize) -> RawTable {
    let genders = ["female", "male", "Male", "fe male"];
    let education = ["High School", "Associate", "Bachelor", "Master", "Doctorate"];
    let homes = ["RENT", "OWN", "MORTGAGE", "OTHER"];
    let intents = ["PERSONAL", "EDUCATION", "MEDICAL", "VENTURE", "HOMEIMPROVEMENT"];
    let rows = (0..n)
        .map(|i| {
            let label = usize::from(i % 5 == 0 || i % 7 == 0);
            vec![
                (20 + i % 45).to_string(),
                genders[i % genders.len()].to_string(),
                education[i % education.len()].to_string(),
                (20_000 + (i * 7_919) % 90_000).to_string(),
                (i % 20).to_string(),
                homes[i % homes.len()].to_string(),
                (1_000 + (i * 613) % 30_000).to_string(),
                intents[i % intents.len()].to_string(),
                if label == 1 { "No" } else { ["No", "Yes"][i % 2] }.to_string(),
                label.to_string(),
            ]
        })
        .collect();
    RawTable::new(HEADER.split(',').map(str::to_string).collect(), rows)
}

fn numeric(n: usize, d: usize) -> (Array2<f64>, Array1<usize>) {
    let x = Array2::from_shape_fn((n, d), |(i, j)| ((i * 31 + j * 17) % 97) as f64 / 97.0);
    let y = (0..n).map(|i| usize::from(x[[i, 0]] + x[[i, 1]] > 1.0)).collect();
    (x, y)
}

fn bench_preprocessing(c: &mut Criterion) {
    let table = synthetic_table(2_000);
    let trainer = LoanModelTrainer::new(MlConfig::default());

    c.bench_function("preprocess_2000_rows", |b| {
        b.iter(|| trainer.preprocess(black_box(&table)).unwrap())
    });

    let (x, y) = numeric(2_000, 12);
    let columns = (0..12).map(|j| format!("f{j}")).collect();
    let matrix = FeatureMatrix::new(columns, x).unwrap();

    c.bench_function("impute_and_scale_2000x12", |b| {
        b.iter(|| {
            let (_, imputed) = MedianImputer.fit_transform(black_box(&matrix)).unwrap();
            let scaler = RobustScaler::default().fit(&imputed).unwrap();
            scaler.transform(&imputed).unwrap()
        })
    });

    c.bench_function("smote_2000x12", |b| {
        b.iter(|| Smote::default().fit_resample(black_box(&matrix), &y).unwrap())
    });
}

fn bench_models(c: &mut Criterion) {
    let (x, y) = numeric(1_000, 12);

    c.bench_function("random_forest_fit_1000x12", |b| {
        let forest = RandomForest {
            n_estimators: 50,
            ..Default::default()
        };
        b.iter(|| forest.fit(black_box(&x), &y).unwrap())
    });

    c.bench_function("boosting_fit_1000x12", |b| {
        let boosting = GradientBoosting {
            n_estimators: 100,
            max_depth: 5,
            learning_rate: 0.1,
            ..Default::default()
        };
        b.iter(|| boosting.fit(black_box(&x), &y).unwrap())
    });

    let mut config = MlConfig::default();
    config.forest.n_estimators = 20;
    config.boosting.grid = BoostingGrid {
        learning_rate: vec![0.1],
        max_depth: vec![3],
        n_estimators: vec![20],
    };
    let table = synthetic_table(500);
    let trainer = LoanModelTrainer::new(config);
    c.bench_function("train_all_models_500_rows", |b| {
        b.iter(|| trainer.train_all_models(black_box(&table)).unwrap())
    });
}

criterion_group!(benches, bench_preprocessing, bench_models);
criterion_main!(benches);
