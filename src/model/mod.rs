pub mod artifact;
pub mod gbdt;
pub mod metrics;
pub mod shap;
pub mod trainer;

pub use artifact::{FeatureImpact, ModelArtifact, Prediction, RiskLevel, RiskThresholds};
pub use gbdt::{Booster, BoosterParams, Dataset};
pub use metrics::EvaluationReport;
pub use trainer::{train_model, TrainingReport};
