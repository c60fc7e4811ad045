//! Feature engineering shared by training and serving.
//!
//! Both the modeling table and the HTTP request are reduced to [`OrderAttributes`];
//! [`feature_vector`] turns those plus the seller/category history into the model input.
//! Missing inputs are encoded as `NaN`.

pub mod history;
pub mod split;

use crate::domain::model::ModelingRow;
use chrono::{Datelike, NaiveDateTime, Timelike};
use history::{HistoryFeatures, HistorySnapshot, HistoryTracker};

pub const FEATURE_NAMES: [&str; 22] = [
    "order_value",
    "freight_value",
    "freight_ratio",
    "num_items",
    "payment_installments",
    "payment_value",
    "pay_credit_card",
    "pay_boleto",
    "pay_voucher",
    "pay_debit_card",
    "estimated_delivery_days",
    "purchase_hour",
    "purchase_weekday",
    "purchase_month",
    "product_weight_g",
    "product_volume_cm3",
    "distance_km",
    "same_state",
    "seller_prior_orders",
    "seller_low_review_rate",
    "seller_late_rate",
    "category_low_review_rate",
];

pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Order, seller and product attributes known at purchase time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderAttributes {
    pub order_value: Option<f64>,
    pub freight_value: Option<f64>,
    pub num_items: Option<f64>,
    pub payment_type: Option<String>,
    pub payment_installments: Option<f64>,
    pub payment_value: Option<f64>,
    pub purchase_timestamp: Option<NaiveDateTime>,
    pub estimated_delivery_date: Option<NaiveDateTime>,
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
    pub product_category: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl From<&ModelingRow> for OrderAttributes {
    fn from(row: &ModelingRow) -> Self {
        Self {
            order_value: Some(row.order_value),
            freight_value: Some(row.freight_value),
            num_items: Some(row.num_items as f64),
            payment_type: non_empty(&row.payment_type),
            payment_installments: Some(row.payment_installments as f64),
            payment_value: row.payment_value,
            purchase_timestamp: row.order_purchase_timestamp,
            estimated_delivery_date: row.order_estimated_delivery_date,
            product_weight_g: row.product_weight_g,
            product_length_cm: row.product_length_cm,
            product_height_cm: row.product_height_cm,
            product_width_cm: row.product_width_cm,
            customer_state: row.customer_state.as_deref().and_then(non_empty),
            seller_state: row.seller_state.as_deref().and_then(non_empty),
            customer_lat: row.customer_lat,
            customer_lng: row.customer_lng,
            seller_lat: row.seller_lat,
            seller_lng: row.seller_lng,
            seller_id: non_empty(&row.seller_id),
            product_category: category_key(row),
        }
    }
}

/// History key of a row's category: English name when known, else the Portuguese one.
pub fn category_key(row: &ModelingRow) -> Option<String> {
    non_empty(&row.product_category_english)
        .or_else(|| row.product_category_name.as_deref().and_then(non_empty))
}

fn opt(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NAN)
}

fn indicator(flag: Option<bool>) -> f64 {
    match flag {
        Some(true) => 1.0,
        Some(false) => 0.0,
        None => f64::NAN,
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Builds the model input in [`FEATURE_NAMES`] order.
pub fn feature_vector(attrs: &OrderAttributes, history: &HistoryFeatures) -> Vec<f64> {
    let freight_ratio = match (attrs.order_value, attrs.freight_value) {
        (Some(value), Some(freight)) if value > 0.0 => freight / value,
        _ => f64::NAN,
    };

    let payment = attrs.payment_type.as_deref();
    let pay = |kind: &str| indicator(payment.map(|p| p.eq_ignore_ascii_case(kind)));

    let estimated_delivery_days = match (attrs.purchase_timestamp, attrs.estimated_delivery_date) {
        (Some(purchase), Some(estimate)) => (estimate - purchase).num_seconds() as f64 / 86_400.0,
        _ => f64::NAN,
    };

    let purchase = attrs.purchase_timestamp;
    let volume = match (
        attrs.product_length_cm,
        attrs.product_height_cm,
        attrs.product_width_cm,
    ) {
        (Some(l), Some(h), Some(w)) => l * h * w,
        _ => f64::NAN,
    };

    let distance_km = match (
        attrs.customer_lat,
        attrs.customer_lng,
        attrs.seller_lat,
        attrs.seller_lng,
    ) {
        (Some(clat), Some(clng), Some(slat), Some(slng)) => haversine_km(clat, clng, slat, slng),
        _ => f64::NAN,
    };

    let same_state = match (&attrs.customer_state, &attrs.seller_state) {
        (Some(c), Some(s)) => Some(c.eq_ignore_ascii_case(s)),
        _ => None,
    };

    vec![
        opt(attrs.order_value),
        opt(attrs.freight_value),
        freight_ratio,
        opt(attrs.num_items),
        opt(attrs.payment_installments),
        opt(attrs.payment_value),
        pay("credit_card"),
        pay("boleto"),
        pay("voucher"),
        pay("debit_card"),
        estimated_delivery_days,
        purchase.map(|p| p.hour() as f64).unwrap_or(f64::NAN),
        purchase
            .map(|p| p.weekday().num_days_from_monday() as f64)
            .unwrap_or(f64::NAN),
        purchase.map(|p| p.month() as f64).unwrap_or(f64::NAN),
        opt(attrs.product_weight_g),
        volume,
        distance_km,
        indicator(same_state),
        history.seller_prior_orders,
        history.seller_low_review_rate,
        history.seller_late_rate,
        history.category_low_review_rate,
    ]
}

/// One modeling row turned into model input.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub order_id: String,
    pub purchase_timestamp: NaiveDateTime,
    pub features: Vec<f64>,
    pub target: u8,
    pub review_score: u8,
}

/// Engineered rows plus the history state after the last order.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub snapshot: HistorySnapshot,
    pub skipped_without_timestamp: usize,
}

/// Computes features for every row with a purchase timestamp, visiting rows in
/// chronological order so history features only see outcomes known at purchase time.
pub fn build_feature_table(rows: &[ModelingRow], smoothing: f64) -> FeatureTable {
    let mut ordered: Vec<(NaiveDateTime, &ModelingRow)> = rows
        .iter()
        .filter_map(|r| r.order_purchase_timestamp.map(|ts| (ts, r)))
        .collect();
    let skipped_without_timestamp = rows.len() - ordered.len();
    ordered.sort_by_key(|(ts, _)| *ts);

    let mut tracker = HistoryTracker::new(smoothing);
    let mut feature_rows = Vec::with_capacity(ordered.len());

    for (ts, row) in ordered {
        tracker.advance_to(ts);
        let attrs = OrderAttributes::from(row);
        let history = tracker.features(attrs.seller_id.as_deref(), attrs.product_category.as_deref());
        feature_rows.push(FeatureRow {
            order_id: row.order_id.clone(),
            purchase_timestamp: ts,
            features: feature_vector(&attrs, &history),
            target: row.target,
            review_score: row.review_score,
        });
        tracker.observe(row);
    }

    FeatureTable {
        rows: feature_rows,
        snapshot: tracker.finish(),
        skipped_without_timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timestamp::parse_timestamp;

    fn attrs() -> OrderAttributes {
        OrderAttributes {
            order_value: Some(100.0),
            freight_value: Some(20.0),
            num_items: Some(2.0),
            payment_type: Some("boleto".to_string()),
            payment_installments: Some(1.0),
            payment_value: Some(120.0),
            purchase_timestamp: parse_timestamp("2018-03-05 14:30:00"),
            estimated_delivery_date: parse_timestamp("2018-03-15 14:30:00"),
            product_weight_g: Some(800.0),
            product_length_cm: Some(10.0),
            product_height_cm: Some(5.0),
            product_width_cm: Some(4.0),
            customer_state: Some("SP".to_string()),
            seller_state: Some("RJ".to_string()),
            customer_lat: Some(-23.55),
            customer_lng: Some(-46.63),
            seller_lat: Some(-22.91),
            seller_lng: Some(-43.17),
            seller_id: Some("s1".to_string()),
            product_category: Some("housewares".to_string()),
        }
    }

    fn feature(values: &[f64], name: &str) -> f64 {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name).unwrap();
        values[idx]
    }

    #[test]
    fn test_feature_vector_values() {
        let values = feature_vector(&attrs(), &HistoryFeatures::unknown());
        assert_eq!(values.len(), FEATURE_COUNT);
        assert_eq!(feature(&values, "freight_ratio"), 0.2);
        assert_eq!(feature(&values, "pay_boleto"), 1.0);
        assert_eq!(feature(&values, "pay_credit_card"), 0.0);
        assert_eq!(feature(&values, "estimated_delivery_days"), 10.0);
        assert_eq!(feature(&values, "purchase_hour"), 14.0);
        // 2018-03-05 was a Monday
        assert_eq!(feature(&values, "purchase_weekday"), 0.0);
        assert_eq!(feature(&values, "purchase_month"), 3.0);
        assert_eq!(feature(&values, "product_volume_cm3"), 200.0);
        assert_eq!(feature(&values, "same_state"), 0.0);
        let distance = feature(&values, "distance_km");
        assert!(distance > 340.0 && distance < 380.0, "distance {}", distance);
        assert!(feature(&values, "seller_low_review_rate").is_nan());
    }

    #[test]
    fn test_missing_inputs_become_nan() {
        let values = feature_vector(&OrderAttributes::default(), &HistoryFeatures::unknown());
        assert!(values.iter().take(18).all(|v| v.is_nan()));
        assert_eq!(feature(&values, "seller_prior_orders"), 0.0);
    }

    #[test]
    fn test_zero_order_value_has_no_freight_ratio() {
        let mut a = attrs();
        a.order_value = Some(0.0);
        let values = feature_vector(&a, &HistoryFeatures::unknown());
        assert!(feature(&values, "freight_ratio").is_nan());
    }
}
