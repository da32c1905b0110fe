//! Subcommand handlers.

use crate::{Commands, ConfigAction, OutputFormat};
use anyhow::Context;
use loanfit_ml::config::workspace_config_path;
use loanfit_ml::data::schema::infer_schema;
use loanfit_ml::pipeline::{GridSearchEvaluation, ModelEvaluation, TrainingSummary};
use loanfit_ml::{CsvSource, DataSource, LoanModelTrainer, MlConfig, RawTable};
use std::io::Write;
use std::path::Path;

/// Number of feature importances shown in text output.
const TOP_FEATURES: usize = 10;

pub(crate) fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Train {
            data,
            resample_test,
            skip_forest,
            skip_boosting,
            format,
        } => {
            let mut config = load(workspace, config_path)?;
            if resample_test {
                config.resample.apply_to_test = true;
            }
            let table = read_table(&data, &config)?;
            let trainer = LoanModelTrainer::new(config).with_models(!skip_forest, !skip_boosting);
            let summary = trainer
                .train_all_models(&table)
                .context("Training failed")?;
            match format {
                OutputFormat::Text => write_summary(out, &summary)?,
                OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?,
            }
            Ok(())
        }
        Commands::Inspect { data, format } => {
            let config = load(workspace, config_path)?;
            let table = read_table(&data, &config)?;
            let schema = infer_schema(&table);
            let report = LoanModelTrainer::new(config).inspect(&table);
            match format {
                OutputFormat::Text => {
                    writeln!(out, "Columns:")?;
                    for column in &schema.columns {
                        let nullable = if column.nullable { " (nullable)" } else { "" };
                        writeln!(out, "  {:<32} {:?}{nullable}", column.name, column.dtype)?;
                    }
                    writeln!(out, "{report}")?;
                }
                OutputFormat::Json => {
                    let doc = serde_json::json!({ "schema": schema, "quality": report });
                    writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
                }
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, config_path, out),
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<MlConfig> {
    loanfit_ml::load_config(Some(workspace), config_path)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

fn read_table(path: &Path, config: &MlConfig) -> anyhow::Result<RawTable> {
    let source = CsvSource::new(path).with_delimiter(config.data.delimiter);
    let table = source
        .load(None)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let info = source.source_info();
    tracing::info!(
        source = %info.source_type,
        location = %info.location,
        rows = table.row_count(),
        columns = table.column_count(),
        "Loaded dataset"
    );
    Ok(table)
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            if config_path.exists() {
                writeln!(
                    out,
                    "Configuration file already exists at: {}",
                    config_path.display()
                )?;
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&MlConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            writeln!(
                out,
                "Created default configuration at: {}",
                config_path.display()
            )?;
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_path)?;
            writeln!(out, "{}", toml::to_string_pretty(&config)?)?;
            Ok(())
        }
    }
}

fn write_summary(out: &mut impl Write, summary: &TrainingSummary) -> anyhow::Result<()> {
    writeln!(out, "Data quality")?;
    writeln!(out, "{}", summary.quality)?;
    writeln!(out)?;
    writeln!(
        out,
        "Train rows: {}  Test rows: {}  Features: {}",
        summary.train_rows,
        summary.test_rows,
        summary.features.len()
    )?;

    if !summary.anomalies.is_empty() {
        writeln!(out, "Anomalies replaced (train / test):")?;
        for a in &summary.anomalies {
            writeln!(out, "  {:<24} {} / {}", a.column, a.train, a.test)?;
        }
    }

    writeln!(out, "Class distribution before resampling:")?;
    write!(out, "{}", summary.class_distribution_before)?;
    writeln!(out, "Class distribution after resampling:")?;
    write!(out, "{}", summary.class_distribution_after)?;
    if let Some(test) = &summary.resampled_test_distribution {
        writeln!(out, "Resampled test distribution (not used for evaluation):")?;
        write!(out, "{test}")?;
    }

    if let Some(forest) = &summary.random_forest {
        write_forest(out, forest)?;
    }
    if let Some(boosting) = &summary.boosting {
        write_boosting(out, boosting)?;
    }
    Ok(())
}

fn write_forest(out: &mut impl Write, eval: &ModelEvaluation) -> anyhow::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== {} ===", eval.model_name)?;
    write!(out, "{}", eval.report)?;
    writeln!(out, "Confusion matrix:")?;
    writeln!(out, "{}", eval.report.confusion_matrix)?;
    writeln!(out, "Top features:")?;
    for (name, importance) in eval.feature_importances.iter().take(TOP_FEATURES) {
        writeln!(out, "  {name:<32} {importance:.4}")?;
    }
    Ok(())
}

fn write_boosting(out: &mut impl Write, eval: &GridSearchEvaluation) -> anyhow::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== {} ===", eval.model_name)?;
    writeln!(
        out,
        "Best parameters: learning_rate={} max_depth={} n_estimators={} (cv f1_macro {:.4}, {} candidates)",
        eval.best_params.learning_rate,
        eval.best_params.max_depth,
        eval.best_params.n_estimators,
        eval.best_cv_score,
        eval.trials.len()
    )?;
    write!(out, "{}", eval.report)?;
    writeln!(out, "Confusion matrix:")?;
    writeln!(out, "{}", eval.report.confusion_matrix)?;
    Ok(())
}
