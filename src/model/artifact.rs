use crate::features::{feature_vector, history::HistorySnapshot, OrderAttributes, FEATURE_NAMES};
use crate::model::gbdt::Booster;
use crate::model::shap::explain;
use crate::model::trainer::TrainingReport;
use crate::utils::error::{Result, RiskError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Probability cutoffs for the risk levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub high: f64,
    pub medium: f64,
}

impl RiskThresholds {
    pub fn level(&self, probability: f64) -> RiskLevel {
        if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Cutoffs at the given quantiles of a score distribution.
    pub fn from_scores(scores: &[f64], high_quantile: f64, medium_quantile: f64) -> Result<Self> {
        if scores.is_empty() {
            return Err(RiskError::model("no scores to derive risk thresholds from"));
        }
        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);
        let high = quantile(&sorted, high_quantile);
        let medium = quantile(&sorted, medium_quantile).min(high);
        Ok(Self { high, medium })
    }
}

/// Linear-interpolated quantile of sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let frac = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    pub top_features: Vec<FeatureImpact>,
}

/// Everything the server needs: the booster, the history it was trained with and the
/// risk cutoffs. Persisted as pretty JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub booster: Booster,
    pub history: HistorySnapshot,
    pub thresholds: RiskThresholds,
    pub report: TrainingReport,
}

impl ModelArtifact {
    pub async fn save(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        tracing::info!("💾 Model artifact {} written to {}", self.version, path);
        Ok(())
    }

    pub async fn load(path: &str) -> Result<Self> {
        if !Path::new(path).is_file() {
            return Err(RiskError::missing_file(path));
        }
        let bytes = tokio::fs::read(path).await?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        artifact.check_features()?;
        tracing::info!(
            "📦 Loaded model {} ({} trees) from {}",
            artifact.version,
            artifact.booster.trees.len(),
            path
        );
        Ok(artifact)
    }

    fn check_features(&self) -> Result<()> {
        let expected = FEATURE_NAMES.iter().map(|s| s.to_string());
        if !self.feature_names.iter().cloned().eq(expected)
            || self.booster.num_features() != FEATURE_NAMES.len()
        {
            return Err(RiskError::model(format!(
                "artifact {} was trained on different features: {:?}",
                self.version, self.feature_names
            )));
        }
        Ok(())
    }

    /// Scores one order and explains it with its `top_k` largest SHAP contributions.
    pub fn predict(&self, attrs: &OrderAttributes, top_k: usize) -> Prediction {
        let history = self
            .history
            .features_for(attrs.seller_id.as_deref(), attrs.product_category.as_deref());
        let features = feature_vector(attrs, &history);
        let risk_probability = self.booster.predict_proba(&features);
        let explanation = explain(&self.booster, &features);

        let mut impacts: Vec<FeatureImpact> = self
            .feature_names
            .iter()
            .zip(explanation.contributions)
            .map(|(feature, impact)| FeatureImpact {
                feature: feature.clone(),
                impact,
            })
            .collect();
        impacts.sort_by(|a, b| {
            b.impact
                .abs()
                .total_cmp(&a.impact.abs())
                .then_with(|| a.feature.cmp(&b.feature))
        });
        impacts.truncate(top_k);

        Prediction {
            risk_probability,
            risk_level: self.thresholds.level(risk_probability),
            top_features: impacts,
        }
    }
}
