use crate::domain::timestamp::opt_datetime;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// 原始資料列：只讀取用得到的欄位，其它欄位忽略

#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub order_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub order_purchase_timestamp: Option<String>,
    #[serde(default)]
    pub order_approved_at: Option<String>,
    #[serde(default)]
    pub order_delivered_carrier_date: Option<String>,
    #[serde(default)]
    pub order_delivered_customer_date: Option<String>,
    #[serde(default)]
    pub order_estimated_delivery_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRow {
    pub order_id: String,
    #[serde(default)]
    pub review_score: Option<u8>,
    #[serde(default)]
    pub review_creation_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRow {
    pub order_id: String,
    #[serde(default)]
    pub order_item_id: Option<u32>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub freight_value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRow {
    pub order_id: String,
    #[serde(default)]
    pub payment_sequential: Option<u32>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub payment_installments: Option<u32>,
    #[serde(default)]
    pub payment_value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRow {
    pub customer_id: String,
    #[serde(default)]
    pub customer_zip_code_prefix: Option<u32>,
    #[serde(default)]
    pub customer_city: Option<String>,
    #[serde(default)]
    pub customer_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellerRow {
    pub seller_id: String,
    #[serde(default)]
    pub seller_zip_code_prefix: Option<u32>,
    #[serde(default)]
    pub seller_city: Option<String>,
    #[serde(default)]
    pub seller_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRow {
    pub product_id: String,
    #[serde(default)]
    pub product_category_name: Option<String>,
    #[serde(default)]
    pub product_weight_g: Option<f64>,
    #[serde(default)]
    pub product_length_cm: Option<f64>,
    #[serde(default)]
    pub product_height_cm: Option<f64>,
    #[serde(default)]
    pub product_width_cm: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationRow {
    #[serde(default)]
    pub geolocation_zip_code_prefix: Option<u32>,
    #[serde(default)]
    pub geolocation_lat: Option<f64>,
    #[serde(default)]
    pub geolocation_lng: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryTranslationRow {
    pub product_category_name: String,
    #[serde(default)]
    pub product_category_name_english: Option<String>,
}

/// All source tables of one Olist export.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub orders: Vec<OrderRow>,
    pub customers: Vec<CustomerRow>,
    pub order_items: Vec<OrderItemRow>,
    pub order_payments: Vec<PaymentRow>,
    pub reviews: Vec<ReviewRow>,
    pub products: Vec<ProductRow>,
    pub sellers: Vec<SellerRow>,
    pub geolocation: Vec<GeolocationRow>,
    pub category_translation: Vec<CategoryTranslationRow>,
}

impl RawTables {
    pub fn row_counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("orders", self.orders.len()),
            ("customers", self.customers.len()),
            ("order_items", self.order_items.len()),
            ("order_payments", self.order_payments.len()),
            ("reviews", self.reviews.len()),
            ("products", self.products.len()),
            ("sellers", self.sellers.len()),
            ("geolocation", self.geolocation.len()),
            ("category_translation", self.category_translation.len()),
        ]
    }
}

/// One reviewed order with its target and joined attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelingRow {
    pub order_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub order_status: String,
    pub review_score: u8,
    #[serde(default, with = "opt_datetime")]
    pub review_creation_date: Option<NaiveDateTime>,
    pub target: u8,
    #[serde(default, with = "opt_datetime")]
    pub order_purchase_timestamp: Option<NaiveDateTime>,
    #[serde(default, with = "opt_datetime")]
    pub order_approved_at: Option<NaiveDateTime>,
    #[serde(default, with = "opt_datetime")]
    pub order_delivered_carrier_date: Option<NaiveDateTime>,
    #[serde(default, with = "opt_datetime")]
    pub order_delivered_customer_date: Option<NaiveDateTime>,
    #[serde(default, with = "opt_datetime")]
    pub order_estimated_delivery_date: Option<NaiveDateTime>,
    pub order_value: f64,
    pub freight_value: f64,
    pub num_items: u32,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub seller_id: String,
    pub payment_type: String,
    pub payment_installments: u32,
    #[serde(default)]
    pub payment_value: Option<f64>,
    #[serde(default)]
    pub customer_zip_code_prefix: Option<u32>,
    #[serde(default)]
    pub customer_city: Option<String>,
    #[serde(default)]
    pub customer_state: Option<String>,
    #[serde(default)]
    pub seller_zip_code_prefix: Option<u32>,
    #[serde(default)]
    pub seller_city: Option<String>,
    #[serde(default)]
    pub seller_state: Option<String>,
    #[serde(default)]
    pub product_category_name: Option<String>,
    #[serde(default)]
    pub product_category_english: String,
    #[serde(default)]
    pub product_weight_g: Option<f64>,
    #[serde(default)]
    pub product_length_cm: Option<f64>,
    #[serde(default)]
    pub product_height_cm: Option<f64>,
    #[serde(default)]
    pub product_width_cm: Option<f64>,
    #[serde(default)]
    pub customer_lat: Option<f64>,
    #[serde(default)]
    pub customer_lng: Option<f64>,
    #[serde(default)]
    pub seller_lat: Option<f64>,
    #[serde(default)]
    pub seller_lng: Option<f64>,
}

impl ModelingRow {
    pub const COLUMN_COUNT: usize = 35;

    /// Missing-value counts for the columns that can be missing, in column order.
    pub fn missing_counts(rows: &[ModelingRow]) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> = vec![
            ("review_creation_date", 0),
            ("order_purchase_timestamp", 0),
            ("order_approved_at", 0),
            ("order_delivered_carrier_date", 0),
            ("order_delivered_customer_date", 0),
            ("order_estimated_delivery_date", 0),
            ("payment_value", 0),
            ("customer_zip_code_prefix", 0),
            ("customer_city", 0),
            ("customer_state", 0),
            ("seller_zip_code_prefix", 0),
            ("seller_city", 0),
            ("seller_state", 0),
            ("product_category_name", 0),
            ("product_weight_g", 0),
            ("product_length_cm", 0),
            ("product_height_cm", 0),
            ("product_width_cm", 0),
            ("customer_lat", 0),
            ("customer_lng", 0),
            ("seller_lat", 0),
            ("seller_lng", 0),
        ];

        for row in rows {
            let flags = [
                row.review_creation_date.is_none(),
                row.order_purchase_timestamp.is_none(),
                row.order_approved_at.is_none(),
                row.order_delivered_carrier_date.is_none(),
                row.order_delivered_customer_date.is_none(),
                row.order_estimated_delivery_date.is_none(),
                row.payment_value.is_none(),
                row.customer_zip_code_prefix.is_none(),
                row.customer_city.is_none(),
                row.customer_state.is_none(),
                row.seller_zip_code_prefix.is_none(),
                row.seller_city.is_none(),
                row.seller_state.is_none(),
                row.product_category_name.is_none(),
                row.product_weight_g.is_none(),
                row.product_length_cm.is_none(),
                row.product_height_cm.is_none(),
                row.product_width_cm.is_none(),
                row.customer_lat.is_none(),
                row.customer_lng.is_none(),
                row.seller_lat.is_none(),
                row.seller_lng.is_none(),
            ];
            for (slot, missing) in counts.iter_mut().zip(flags) {
                if missing {
                    slot.1 += 1;
                }
            }
        }

        counts.retain(|(_, n)| *n > 0);
        counts
    }
}

/// Output of the join step.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub rows: Vec<ModelingRow>,
    pub orders_with_target: usize,
}
