use crate::domain::timestamp::{format_timestamp, parse_timestamp};
use crate::features::FeatureRow;
use crate::utils::error::{Result, RiskError};
use crate::utils::validation::{validate_range, Validate};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Chronological train / validation / test cutoffs.
///
/// Explicit `train_end` / `valid_end` timestamps win over the fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub valid_fraction: f64,
    pub train_end: Option<String>,
    pub valid_end: Option<String>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.70,
            valid_fraction: 0.15,
            train_end: None,
            valid_end: None,
        }
    }
}

impl Validate for SplitConfig {
    fn validate(&self) -> Result<()> {
        validate_range("split.train_fraction", self.train_fraction, 0.0, 1.0)?;
        validate_range("split.valid_fraction", self.valid_fraction, 0.0, 1.0)?;
        if self.train_fraction + self.valid_fraction >= 1.0 {
            return Err(RiskError::InvalidConfigValueError {
                field: "split.valid_fraction".to_string(),
                value: self.valid_fraction.to_string(),
                reason: "train_fraction + valid_fraction must leave rows for the test set"
                    .to_string(),
            });
        }

        let train_end = parse_cutoff("split.train_end", self.train_end.as_deref())?;
        let valid_end = parse_cutoff("split.valid_end", self.valid_end.as_deref())?;
        match (train_end, valid_end) {
            (Some(t), Some(v)) if t >= v => Err(RiskError::InvalidConfigValueError {
                field: "split.valid_end".to_string(),
                value: format_timestamp(&v),
                reason: "valid_end must be after train_end".to_string(),
            }),
            (Some(_), None) | (None, Some(_)) => Err(RiskError::ConfigValidationError {
                field: "split".to_string(),
                message: "train_end and valid_end must be given together".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn parse_cutoff(field: &str, value: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match value {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| RiskError::InvalidConfigValueError {
                field: field.to_string(),
                value: raw.to_string(),
                reason: "expected a timestamp like 2018-01-01 00:00:00".to_string(),
            }),
    }
}

#[derive(Debug, Clone)]
pub struct TimeSplit {
    pub train: Vec<FeatureRow>,
    pub valid: Vec<FeatureRow>,
    pub test: Vec<FeatureRow>,
    /// First timestamp of the validation period.
    pub train_end: NaiveDateTime,
    /// First timestamp of the test period.
    pub valid_end: NaiveDateTime,
}

/// Partitions rows by purchase time: `train < train_end <= valid < valid_end <= test`.
/// Fraction cutoffs are taken at row positions, so rows sharing a timestamp stay together.
pub fn time_split(mut rows: Vec<FeatureRow>, config: &SplitConfig) -> Result<TimeSplit> {
    config.validate()?;
    if rows.is_empty() {
        return Err(RiskError::validation("no rows with a purchase timestamp to split"));
    }
    rows.sort_by_key(|r| r.purchase_timestamp);

    let (train_end, valid_end) = match (
        parse_cutoff("split.train_end", config.train_end.as_deref())?,
        parse_cutoff("split.valid_end", config.valid_end.as_deref())?,
    ) {
        (Some(t), Some(v)) => (t, v),
        _ => {
            let n = rows.len();
            let train_idx = ((n as f64 * config.train_fraction) as usize).min(n - 1);
            let valid_idx = ((n as f64 * (config.train_fraction + config.valid_fraction)) as usize)
                .min(n - 1);
            (
                rows[train_idx].purchase_timestamp,
                rows[valid_idx].purchase_timestamp,
            )
        }
    };

    let mut train = Vec::new();
    let mut valid = Vec::new();
    let mut test = Vec::new();
    for row in rows {
        if row.purchase_timestamp < train_end {
            train.push(row);
        } else if row.purchase_timestamp < valid_end {
            valid.push(row);
        } else {
            test.push(row);
        }
    }

    for (name, part) in [("train", &train), ("validation", &valid), ("test", &test)] {
        if part.is_empty() {
            return Err(RiskError::validation(format!(
                "{} split is empty (train_end={}, valid_end={})",
                name,
                format_timestamp(&train_end),
                format_timestamp(&valid_end)
            )));
        }
    }

    tracing::info!(
        "✂️ Time split: train {} rows (< {}), validation {} rows (< {}), test {} rows",
        train.len(),
        format_timestamp(&train_end),
        valid.len(),
        format_timestamp(&valid_end),
        test.len()
    );

    Ok(TimeSplit {
        train,
        valid,
        test,
        train_end,
        valid_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rows(n: usize) -> Vec<FeatureRow> {
        let start = parse_timestamp("2018-01-01 00:00:00").unwrap();
        // reversed on purpose, the split must sort
        (0..n)
            .rev()
            .map(|i| FeatureRow {
                order_id: format!("o{}", i),
                purchase_timestamp: start + Duration::days(i as i64),
                features: vec![i as f64],
                target: 0,
                review_score: 5,
            })
            .collect()
    }

    #[test]
    fn test_fraction_split_is_chronological() {
        let split = time_split(rows(100), &SplitConfig::default()).unwrap();
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.valid.len(), 15);
        assert_eq!(split.test.len(), 15);

        let last_train = split.train.iter().map(|r| r.purchase_timestamp).max().unwrap();
        let first_valid = split.valid.iter().map(|r| r.purchase_timestamp).min().unwrap();
        let last_valid = split.valid.iter().map(|r| r.purchase_timestamp).max().unwrap();
        let first_test = split.test.iter().map(|r| r.purchase_timestamp).min().unwrap();
        assert!(last_train < first_valid);
        assert!(last_valid < first_test);
    }

    #[test]
    fn test_explicit_cutoffs() {
        let config = SplitConfig {
            train_end: Some("2018-01-11 00:00:00".to_string()),
            valid_end: Some("2018-01-16".to_string()),
            ..SplitConfig::default()
        };
        let split = time_split(rows(20), &config).unwrap();
        assert_eq!(split.train.len(), 10);
        assert_eq!(split.valid.len(), 5);
        assert_eq!(split.test.len(), 5);
    }

    #[test]
    fn test_empty_partition_is_an_error() {
        let config = SplitConfig {
            train_end: Some("2017-01-01 00:00:00".to_string()),
            valid_end: Some("2017-06-01 00:00:00".to_string()),
            ..SplitConfig::default()
        };
        let err = time_split(rows(20), &config).unwrap_err();
        assert!(matches!(err, RiskError::ValidationError { .. }));
    }

    #[test]
    fn test_invalid_config() {
        let config = SplitConfig {
            train_fraction: 0.9,
            valid_fraction: 0.2,
            ..SplitConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SplitConfig {
            train_end: Some("2018-01-01 00:00:00".to_string()),
            ..SplitConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
