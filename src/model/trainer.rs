use crate::config::toml_config::RiskConfig;
use crate::domain::model::ModelingRow;
use crate::domain::timestamp::format_timestamp;
use crate::features::split::time_split;
use crate::features::{build_feature_table, FeatureRow, FEATURE_NAMES};
use crate::model::artifact::{ModelArtifact, RiskThresholds};
use crate::model::gbdt::{Booster, Dataset};
use crate::model::metrics::{evaluate, EvaluationReport};
use crate::utils::error::{Result, RiskError};
use crate::utils::validation::Validate;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub gain_share: f64,
}

/// Written next to the artifact as the metrics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub input_rows: usize,
    pub skipped_without_timestamp: usize,
    pub train_rows: usize,
    pub valid_rows: usize,
    pub test_rows: usize,
    pub train_end: String,
    pub valid_end: String,
    pub trees: usize,
    pub best_iteration: Option<usize>,
    pub validation: EvaluationReport,
    pub test: EvaluationReport,
    pub feature_importance: Vec<FeatureImportance>,
}

fn to_dataset(rows: &[FeatureRow]) -> Result<Dataset> {
    Dataset::new(
        rows.iter().map(|r| r.features.clone()).collect(),
        rows.iter().map(|r| r.target).collect(),
    )
}

fn evaluate_rows(booster: &Booster, rows: &[FeatureRow], data: &Dataset) -> EvaluationReport {
    let scores = booster.predict_dataset(data);
    let review_scores: Vec<u8> = rows.iter().map(|r| r.review_score).collect();
    evaluate(&scores, &data.labels, &review_scores)
}

/// Features → time split → boosting → evaluation → risk thresholds.
pub fn train_model(rows: &[ModelingRow], config: &RiskConfig) -> Result<ModelArtifact> {
    config.validate()?;
    if rows.is_empty() {
        return Err(RiskError::validation("modeling table is empty"));
    }

    tracing::info!("🧮 Building features for {} orders", rows.len());
    let table = build_feature_table(rows, config.features.smoothing);
    if table.skipped_without_timestamp > 0 {
        tracing::warn!(
            "⚠️ Skipped {} orders without purchase timestamp",
            table.skipped_without_timestamp
        );
    }

    let split = time_split(table.rows, &config.split)?;
    let train = to_dataset(&split.train)?;
    let valid = to_dataset(&split.valid)?;
    let test = to_dataset(&split.test)?;

    let feature_names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    let booster = Booster::fit(&train, Some(&valid), &feature_names, &config.model)?;

    let validation = evaluate_rows(&booster, &split.valid, &valid);
    validation.log_summary("validation");
    let test_report = evaluate_rows(&booster, &split.test, &test);
    test_report.log_summary("test");

    let thresholds = match config.fixed_thresholds() {
        Some((high, medium)) => RiskThresholds { high, medium },
        None => RiskThresholds::from_scores(
            &booster.predict_dataset(&valid),
            config.risk.high_quantile,
            config.risk.medium_quantile,
        )?,
    };
    tracing::info!(
        "🚦 Risk thresholds: high >= {:.4}, medium >= {:.4}",
        thresholds.high,
        thresholds.medium
    );

    let feature_importance: Vec<FeatureImportance> = booster
        .feature_importance()
        .into_iter()
        .map(|(feature, gain_share)| FeatureImportance { feature, gain_share })
        .collect();
    for item in feature_importance.iter().take(5) {
        tracing::debug!("  {} {:.4}", item.feature, item.gain_share);
    }

    let created_at = Utc::now();
    let report = TrainingReport {
        input_rows: rows.len(),
        skipped_without_timestamp: table.skipped_without_timestamp,
        train_rows: train.len(),
        valid_rows: valid.len(),
        test_rows: test.len(),
        train_end: format_timestamp(&split.train_end),
        valid_end: format_timestamp(&split.valid_end),
        trees: booster.trees.len(),
        best_iteration: booster.best_iteration,
        validation,
        test: test_report,
        feature_importance,
    };

    Ok(ModelArtifact {
        version: format!(
            "{}-{}",
            env!("CARGO_PKG_VERSION"),
            created_at.format("%Y%m%d%H%M%S")
        ),
        created_at,
        feature_names,
        booster,
        history: table.snapshot,
        thresholds,
        report,
    })
}
