use crate::core::join::build_modeling_table;
use crate::core::loader::load_raw_tables;
use crate::domain::model::{ModelingRow, RawTables, TransformResult};
use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
use crate::utils::error::{Result, RiskError};
use std::path::Path;

/// Olist CSVs -> joined modeling table -> CSV/JSON file.
pub struct ModelingPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> ModelingPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ModelingPipeline<S, C> {
    async fn extract(&self) -> Result<RawTables> {
        tracing::info!("📂 Loading Olist tables from {}", self.storage.describe());
        let tables = load_raw_tables(&self.storage).await?;

        if self.config.validate_enabled() {
            tracing::info!("Raw table row counts:");
            for (name, count) in tables.row_counts() {
                tracing::info!("  {}: {}", name, count);
            }
        }

        Ok(tables)
    }

    async fn transform(&self, tables: RawTables) -> Result<TransformResult> {
        let result = build_modeling_table(&tables);

        if self.config.validate_enabled() {
            log_validation_report(&result);
        }

        if result.rows.is_empty() {
            tracing::warn!("⚠️ No reviewed orders found; the modeling table is empty");
        }

        Ok(result)
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let output_path = self.config.modeling_path().to_string();
        let bytes = encode_modeling_data(Path::new(&output_path), &result.rows)?;

        if let Some(parent) = Path::new(&output_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tracing::debug!("Writing {} bytes to {}", bytes.len(), output_path);
        tokio::fs::write(&output_path, bytes).await?;

        Ok(output_path)
    }
}

fn log_validation_report(result: &TransformResult) {
    let rows = &result.rows;
    let positives = rows.iter().filter(|r| r.target == 1).count();

    tracing::info!("Orders with review (target defined): {}", result.orders_with_target);
    tracing::info!(
        "Final modeling table: {} rows, {} columns",
        rows.len(),
        ModelingRow::COLUMN_COUNT
    );
    tracing::info!(
        "Target distribution: {{0: {}, 1: {}}}",
        rows.len() - positives,
        positives
    );

    let missing = ModelingRow::missing_counts(rows);
    if missing.is_empty() {
        tracing::info!("Missing key columns: none");
    } else {
        tracing::info!("Missing key columns:");
        for (column, count) in missing {
            tracing::info!("  {}: {}", column, count);
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Serializes the modeling table; `.json` paths get a JSON array, everything else CSV.
pub fn encode_modeling_data(path: &Path, rows: &[ModelingRow]) -> Result<Vec<u8>> {
    if is_json(path) {
        return Ok(serde_json::to_vec_pretty(rows)?);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| RiskError::processing(format!("Failed to flush CSV output: {}", e)))
}

/// Loads a previously saved modeling table (CSV or JSON).
pub fn load_modeling_data(path: impl AsRef<Path>) -> Result<Vec<ModelingRow>> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(RiskError::missing_file(path));
    }

    let data = std::fs::read(path)?;
    if is_json(path) {
        Ok(serde_json::from_slice(&data)?)
    } else {
        crate::core::loader::parse_csv(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timestamp::parse_timestamp;
    use tempfile::TempDir;

    fn sample_row() -> ModelingRow {
        ModelingRow {
            order_id: "o1".to_string(),
            customer_id: "c1".to_string(),
            order_status: "delivered".to_string(),
            review_score: 1,
            review_creation_date: parse_timestamp("2017-10-20 00:00:00"),
            target: 1,
            order_purchase_timestamp: parse_timestamp("2017-10-02 10:56:33"),
            order_approved_at: None,
            order_delivered_carrier_date: None,
            order_delivered_customer_date: parse_timestamp("2017-10-10 21:25:13"),
            order_estimated_delivery_date: parse_timestamp("2017-10-18 00:00:00"),
            order_value: 29.99,
            freight_value: 8.72,
            num_items: 1,
            product_id: "p1".to_string(),
            seller_id: "s1".to_string(),
            payment_type: "credit_card".to_string(),
            payment_installments: 1,
            payment_value: Some(38.71),
            customer_zip_code_prefix: Some(3149),
            customer_city: Some("sao paulo".to_string()),
            customer_state: Some("SP".to_string()),
            seller_zip_code_prefix: Some(9350),
            seller_city: Some("maua".to_string()),
            seller_state: Some("SP".to_string()),
            product_category_name: Some("utilidades_domesticas".to_string()),
            product_category_english: "housewares".to_string(),
            product_weight_g: Some(500.0),
            product_length_cm: Some(19.0),
            product_height_cm: Some(8.0),
            product_width_cm: Some(13.0),
            customer_lat: Some(-23.57),
            customer_lng: Some(-46.58),
            seller_lat: None,
            seller_lng: None,
        }
    }

    #[test]
    fn test_csv_output_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modeling.csv");
        let rows = vec![sample_row()];

        std::fs::write(&path, encode_modeling_data(&path, &rows).unwrap()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("order_id,customer_id,order_status,review_score"));
        assert!(text.contains("2017-10-02 10:56:33"));

        let loaded = load_modeling_data(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_json_output_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modeling.json");
        let rows = vec![sample_row()];

        std::fs::write(&path, encode_modeling_data(&path, &rows).unwrap()).unwrap();
        let loaded = load_modeling_data(&path).unwrap();
        assert_eq!(loaded[0].seller_state.as_deref(), Some("SP"));
        assert_eq!(loaded[0].seller_lat, None);
    }

    #[test]
    fn test_load_missing_modeling_data() {
        let err = load_modeling_data("does/not/exist.csv").unwrap_err();
        assert!(matches!(err, RiskError::MissingFileError { .. }));
    }
}
