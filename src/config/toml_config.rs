use crate::features::split::SplitConfig;
use crate::model::gbdt::BoosterParams;
use crate::utils::error::{Result, RiskError};
use crate::utils::validation::{
    validate_file_extension, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 預設配置檔名稱，存在時自動載入
pub const DEFAULT_CONFIG_FILE: &str = "risk-config.toml";

/// Training and serving settings (`risk-config.toml`). Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub model: BoosterParams,
    pub risk: RiskLevelConfig,
    pub output: OutputConfig,
    pub serve: ServeConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub modeling_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            modeling_path: "data/modeling.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Pseudo-observations pulling seller/category rates toward the global rate
    pub smoothing: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { smoothing: 20.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevelConfig {
    pub high_quantile: f64,
    pub medium_quantile: f64,
    /// Fixed cutoffs; when both are set the quantiles are ignored
    pub high_threshold: Option<f64>,
    pub medium_threshold: Option<f64>,
}

impl Default for RiskLevelConfig {
    fn default() -> Self {
        Self {
            high_quantile: 0.90,
            medium_quantile: 0.70,
            high_threshold: None,
            medium_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_path: String,
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_path: "artifacts/model.json".to_string(),
            report_path: "artifacts/metrics.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub top_features: usize,
    pub json_logs: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            top_features: 5,
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl RiskConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RiskError::missing_file(path));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 指定路徑必須存在；未指定時使用預設檔，不存在則用預設值
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("⚙️ Loading config from {}", path);
                Self::from_file(path)
            }
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                tracing::info!("⚙️ Loading config from {}", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => {
                tracing::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// 替換環境變數 (例如 ${MODEL_PATH})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RiskError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Explicit thresholds, when both are configured.
    pub fn fixed_thresholds(&self) -> Option<(f64, f64)> {
        match (self.risk.high_threshold, self.risk.medium_threshold) {
            (Some(high), Some(medium)) => Some((high, medium)),
            _ => None,
        }
    }
}

impl Validate for RiskConfig {
    fn validate(&self) -> Result<()> {
        validate_path("data.modeling_path", &self.data.modeling_path)?;
        validate_file_extension("data.modeling_path", &self.data.modeling_path, &["csv", "json"])?;
        validate_range("features.smoothing", self.features.smoothing, 0.0, f64::MAX)?;
        self.split.validate()?;
        self.model.validate()?;

        // 風險等級
        validate_range("risk.high_quantile", self.risk.high_quantile, 0.0, 1.0)?;
        validate_range("risk.medium_quantile", self.risk.medium_quantile, 0.0, 1.0)?;
        if self.risk.medium_quantile > self.risk.high_quantile {
            return Err(RiskError::InvalidConfigValueError {
                field: "risk.medium_quantile".to_string(),
                value: self.risk.medium_quantile.to_string(),
                reason: "must not exceed risk.high_quantile".to_string(),
            });
        }
        match (self.risk.high_threshold, self.risk.medium_threshold) {
            (Some(high), Some(medium)) => {
                validate_range("risk.high_threshold", high, 0.0, 1.0)?;
                validate_range("risk.medium_threshold", medium, 0.0, high)?;
            }
            (None, None) => {}
            _ => {
                return Err(RiskError::ConfigValidationError {
                    field: "risk".to_string(),
                    message: "high_threshold and medium_threshold must be given together"
                        .to_string(),
                })
            }
        }

        // 輸出
        validate_path("output.model_path", &self.output.model_path)?;
        validate_file_extension("output.model_path", &self.output.model_path, &["json"])?;
        validate_path("output.report_path", &self.output.report_path)?;

        // 服務
        validate_non_empty_string("serve.host", &self.serve.host)?;
        validate_positive_number("serve.port", usize::from(self.serve.port), 1)?;
        validate_positive_number("serve.top_features", self.serve.top_features, 1)?;
        Ok(())
    }
}
