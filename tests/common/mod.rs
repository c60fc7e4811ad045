//! Synthetic modeling rows shared by the integration tests.
#![allow(dead_code)]

use chrono::{Duration, NaiveDateTime};
use review_risk::domain::timestamp::parse_timestamp;
use review_risk::model::BoosterParams;
use review_risk::{ModelingRow, RiskConfig};

/// Deterministic pseudo-random sequence in [0, 1).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn modeling_row(i: usize, purchase: NaiveDateTime, rng: &mut Lcg) -> ModelingRow {
    let late = rng.next() < 0.2;
    let bad_seller = i % 7 == 0;
    let freight_heavy = rng.next() < 0.3;
    let risk = 0.05
        + 0.15 * f64::from(u8::from(late))
        + 0.5 * f64::from(u8::from(bad_seller))
        + 0.3 * f64::from(u8::from(freight_heavy));
    let low = rng.next() < risk;
    let review_score = if low {
        if rng.next() < 0.6 {
            1
        } else {
            2
        }
    } else {
        3 + (i % 3) as u8
    };

    let estimated = purchase + Duration::days(15);
    let delivered = if late {
        estimated + Duration::days(5)
    } else {
        purchase + Duration::days(8)
    };
    let order_value = 50.0 + (i % 40) as f64 * 5.0;

    ModelingRow {
        order_id: format!("order-{}", i),
        customer_id: format!("customer-{}", i),
        order_status: "delivered".to_string(),
        review_score,
        review_creation_date: Some(delivered + Duration::days(1)),
        target: u8::from(review_score <= 2),
        order_purchase_timestamp: Some(purchase),
        order_approved_at: Some(purchase + Duration::hours(1)),
        order_delivered_carrier_date: Some(purchase + Duration::days(2)),
        order_delivered_customer_date: Some(delivered),
        order_estimated_delivery_date: Some(estimated),
        order_value,
        freight_value: if freight_heavy { order_value * 0.6 } else { order_value * 0.1 },
        num_items: 1 + (i % 3) as u32,
        product_id: format!("product-{}", i % 50),
        seller_id: if bad_seller {
            "seller-bad".to_string()
        } else {
            format!("seller-{}", i % 20)
        },
        payment_type: if i % 4 == 0 { "boleto" } else { "credit_card" }.to_string(),
        payment_installments: 1 + (i % 6) as u32,
        payment_value: Some(order_value * 1.1),
        customer_zip_code_prefix: Some(1000 + (i % 90) as u32),
        customer_city: Some("sao paulo".to_string()),
        customer_state: Some(if i % 2 == 0 { "SP" } else { "RJ" }.to_string()),
        seller_zip_code_prefix: Some(9350),
        seller_city: Some("maua".to_string()),
        seller_state: Some("SP".to_string()),
        product_category_name: Some("utilidades_domesticas".to_string()),
        product_category_english: if i % 5 == 0 { "toys" } else { "housewares" }.to_string(),
        product_weight_g: Some(300.0 + (i % 10) as f64 * 100.0),
        product_length_cm: Some(20.0),
        product_height_cm: Some(10.0),
        product_width_cm: Some(15.0),
        customer_lat: Some(-23.5 - (i % 10) as f64 * 0.1),
        customer_lng: Some(-46.6),
        seller_lat: Some(-23.68),
        seller_lng: Some(-46.44),
    }
}

pub fn synthetic_rows(n: usize) -> Vec<ModelingRow> {
    let start = parse_timestamp("2017-01-01 08:00:00").unwrap();
    let mut rng = Lcg(42);
    (0..n)
        .map(|i| modeling_row(i, start + Duration::hours(7 * i as i64), &mut rng))
        .collect()
}

pub fn small_config() -> RiskConfig {
    let mut config = RiskConfig::default();
    config.model = BoosterParams {
        num_trees: 40,
        max_depth: 4,
        learning_rate: 0.1,
        min_samples_leaf: 20,
        early_stopping_rounds: 10,
        ..BoosterParams::default()
    };
    config
}
