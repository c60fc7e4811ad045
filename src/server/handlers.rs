use super::AppState;
use crate::domain::timestamp::parse_timestamp;
use crate::features::OrderAttributes;
use crate::model::artifact::{FeatureImpact, RiskLevel};
use crate::utils::error::{Result, RiskError};
use axum::{extract::State, response::IntoResponse, Json};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Order, seller and product attributes. Every field is optional; unknown ones are
/// treated as missing by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictRequest {
    pub order_value: Option<f64>,
    pub freight_value: Option<f64>,
    pub num_items: Option<f64>,
    pub payment_type: Option<String>,
    pub payment_installments: Option<f64>,
    pub payment_value: Option<f64>,
    #[serde(alias = "purchase_timestamp")]
    pub order_purchase_timestamp: Option<String>,
    #[serde(alias = "estimated_delivery_date")]
    pub order_estimated_delivery_date: Option<String>,
    pub product_weight_g: Option<f64>,
    pub product_length_cm: Option<f64>,
    pub product_height_cm: Option<f64>,
    pub product_width_cm: Option<f64>,
    pub customer_state: Option<String>,
    pub seller_state: Option<String>,
    pub customer_lat: Option<f64>,
    pub customer_lng: Option<f64>,
    pub seller_lat: Option<f64>,
    pub seller_lng: Option<f64>,
    pub seller_id: Option<String>,
    /// English category name, the key of the category history
    #[serde(alias = "product_category_english")]
    pub product_category: Option<String>,
}

fn timestamp(field: &str, value: Option<&str>) -> Result<Option<NaiveDateTime>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| RiskError::validation(format!("{} is not a timestamp: '{}'", field, raw))),
    }
}

fn non_negative(field: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(v) if v < 0.0 => Err(RiskError::validation(format!(
            "{} must not be negative, got {}",
            field, v
        ))),
        other => Ok(other),
    }
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<PredictRequest> for OrderAttributes {
    type Error = RiskError;

    fn try_from(req: PredictRequest) -> Result<Self> {
        Ok(Self {
            order_value: non_negative("order_value", req.order_value)?,
            freight_value: non_negative("freight_value", req.freight_value)?,
            num_items: non_negative("num_items", req.num_items)?,
            payment_type: text(req.payment_type),
            payment_installments: non_negative("payment_installments", req.payment_installments)?,
            payment_value: non_negative("payment_value", req.payment_value)?,
            purchase_timestamp: timestamp(
                "order_purchase_timestamp",
                req.order_purchase_timestamp.as_deref(),
            )?,
            estimated_delivery_date: timestamp(
                "order_estimated_delivery_date",
                req.order_estimated_delivery_date.as_deref(),
            )?,
            product_weight_g: non_negative("product_weight_g", req.product_weight_g)?,
            product_length_cm: non_negative("product_length_cm", req.product_length_cm)?,
            product_height_cm: non_negative("product_height_cm", req.product_height_cm)?,
            product_width_cm: non_negative("product_width_cm", req.product_width_cm)?,
            customer_state: text(req.customer_state),
            seller_state: text(req.seller_state),
            customer_lat: req.customer_lat,
            customer_lng: req.customer_lng,
            seller_lat: req.seller_lat,
            seller_lng: req.seller_lng,
            seller_id: text(req.seller_id),
            product_category: text(req.product_category),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub risk_probability: f64,
    pub risk_level: RiskLevel,
    pub top_features: Vec<FeatureImpact>,
}

#[derive(Debug, Serialize)]
struct HealthResponse<'a> {
    status: &'static str,
    model_version: &'a str,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        model_version: &state.artifact.version,
    })
    .into_response()
}

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>> {
    let attrs = OrderAttributes::try_from(request)?;
    let prediction = state.artifact.predict(&attrs, state.top_k);
    tracing::debug!(
        "Scored order: p={:.4} level={:?}",
        prediction.risk_probability,
        prediction.risk_level
    );

    Ok(Json(PredictResponse {
        risk_probability: prediction.risk_probability,
        risk_level: prediction.risk_level,
        top_features: prediction.top_features,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_to_attributes() {
        let request: PredictRequest = serde_json::from_value(serde_json::json!({
            "order_value": 120.5,
            "payment_type": " boleto ",
            "purchase_timestamp": "2018-03-05 14:30:00",
            "product_category_english": "housewares",
            "seller_id": ""
        }))
        .unwrap();

        let attrs = OrderAttributes::try_from(request).unwrap();
        assert_eq!(attrs.order_value, Some(120.5));
        assert_eq!(attrs.payment_type.as_deref(), Some("boleto"));
        assert_eq!(attrs.purchase_timestamp, parse_timestamp("2018-03-05 14:30:00"));
        assert_eq!(attrs.product_category.as_deref(), Some("housewares"));
        assert_eq!(attrs.seller_id, None);
        assert_eq!(attrs.freight_value, None);
    }

    #[test]
    fn test_portuguese_category_is_not_a_history_key() {
        let request: PredictRequest = serde_json::from_value(serde_json::json!({
            "product_category_name": "utilidades_domesticas"
        }))
        .unwrap();
        let attrs = OrderAttributes::try_from(request).unwrap();
        assert_eq!(attrs.product_category, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let request = PredictRequest {
            order_value: Some(-1.0),
            ..PredictRequest::default()
        };
        assert!(matches!(
            OrderAttributes::try_from(request),
            Err(RiskError::ValidationError { .. })
        ));

        let request = PredictRequest {
            order_purchase_timestamp: Some("yesterday".to_string()),
            ..PredictRequest::default()
        };
        assert!(OrderAttributes::try_from(request).is_err());
    }
}
