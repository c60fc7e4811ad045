//! Relational joins that turn the raw Olist tables into one row per reviewed order.

use crate::domain::model::{
    CustomerRow, ModelingRow, OrderRow, ProductRow, RawTables, ReviewRow, SellerRow,
    TransformResult,
};
use crate::domain::timestamp::{parse_opt, parse_timestamp};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Review scores at or below this value count as a low review.
pub const LOW_REVIEW_MAX_SCORE: u8 = 2;

pub fn is_low_review(score: u8) -> bool {
    score <= LOW_REVIEW_MAX_SCORE
}

/// An order joined with its (latest) review.
#[derive(Debug, Clone)]
pub struct OrderWithTarget<'a> {
    pub order: &'a OrderRow,
    pub review_score: u8,
    pub review_creation_date: Option<NaiveDateTime>,
    pub target: u8,
}

/// Keeps the latest review per order and inner-joins it with the orders.
/// Reviews without a creation date sort after dated ones; equal keys keep the later row.
/// Orders whose review has no score are dropped.
pub fn build_orders_with_target(tables: &RawTables) -> Vec<OrderWithTarget<'_>> {
    let mut latest: HashMap<&str, (&ReviewRow, Option<NaiveDateTime>)> = HashMap::new();

    for review in &tables.reviews {
        let created = parse_opt(review.review_creation_date.as_deref());
        match latest.get(review.order_id.as_str()) {
            Some((_, current)) if sort_key(created) < sort_key(*current) => {}
            _ => {
                latest.insert(review.order_id.as_str(), (review, created));
            }
        }
    }

    tables
        .orders
        .iter()
        .filter_map(|order| {
            let (review, created) = latest.get(order.order_id.as_str())?;
            let score = review.review_score?;
            Some(OrderWithTarget {
                order,
                review_score: score,
                review_creation_date: *created,
                target: u8::from(is_low_review(score)),
            })
        })
        .collect()
}

fn sort_key(ts: Option<NaiveDateTime>) -> (bool, Option<NaiveDateTime>) {
    (ts.is_none(), ts)
}

#[derive(Debug, Default)]
struct ItemAggregate<'a> {
    order_value: f64,
    freight_value: f64,
    num_items: u32,
    product_id: Option<&'a str>,
    seller_id: Option<&'a str>,
}

#[derive(Debug, Clone)]
struct PrimaryPayment<'a> {
    sequential: Option<u32>,
    payment_type: Option<&'a str>,
    installments: Option<u32>,
    value: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct GeoMean {
    lat_sum: f64,
    lng_sum: f64,
    count: u32,
}

impl GeoMean {
    fn lat_lng(&self) -> (Option<f64>, Option<f64>) {
        if self.count == 0 {
            (None, None)
        } else {
            let n = self.count as f64;
            (Some(self.lat_sum / n), Some(self.lng_sum / n))
        }
    }
}

fn aggregate_items(tables: &RawTables) -> HashMap<&str, ItemAggregate<'_>> {
    let mut items: HashMap<&str, ItemAggregate<'_>> = HashMap::new();
    for item in &tables.order_items {
        let agg = items.entry(item.order_id.as_str()).or_default();
        agg.order_value += item.price.unwrap_or(0.0);
        agg.freight_value += item.freight_value.unwrap_or(0.0);
        if item.order_item_id.is_some() {
            agg.num_items += 1;
        }
        // 每張訂單取第一個非空的商品與賣家
        if agg.product_id.is_none() {
            agg.product_id = item.product_id.as_deref();
        }
        if agg.seller_id.is_none() {
            agg.seller_id = item.seller_id.as_deref();
        }
    }
    items
}

fn primary_payments(tables: &RawTables) -> HashMap<&str, PrimaryPayment<'_>> {
    let mut payments: HashMap<&str, PrimaryPayment<'_>> = HashMap::new();
    for payment in &tables.order_payments {
        let candidate = PrimaryPayment {
            sequential: payment.payment_sequential,
            payment_type: payment.payment_type.as_deref(),
            installments: payment.payment_installments,
            value: payment.payment_value,
        };
        let key = |p: &PrimaryPayment<'_>| (p.sequential.is_none(), p.sequential);
        match payments.get(payment.order_id.as_str()) {
            Some(current) if key(current) <= key(&candidate) => {}
            _ => {
                payments.insert(payment.order_id.as_str(), candidate);
            }
        }
    }
    payments
}

fn geo_means(tables: &RawTables) -> HashMap<u32, GeoMean> {
    let mut geo: HashMap<u32, GeoMean> = HashMap::new();
    for row in &tables.geolocation {
        if let (Some(zip), Some(lat), Some(lng)) = (
            row.geolocation_zip_code_prefix,
            row.geolocation_lat,
            row.geolocation_lng,
        ) {
            let entry = geo.entry(zip).or_default();
            entry.lat_sum += lat;
            entry.lng_sum += lng;
            entry.count += 1;
        }
    }
    geo
}

fn index_first<'a, T, F>(rows: &'a [T], key: F) -> HashMap<&'a str, &'a T>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        index.entry(key(row)).or_insert(row);
    }
    index
}

/// Joins all tables into the modeling table. Row order follows the orders file.
pub fn build_modeling_table(tables: &RawTables) -> TransformResult {
    let orders = build_orders_with_target(tables);
    let orders_with_target = orders.len();

    let items = aggregate_items(tables);
    let payments = primary_payments(tables);
    let customers: HashMap<&str, &CustomerRow> =
        index_first(&tables.customers, |c| c.customer_id.as_str());
    let sellers: HashMap<&str, &SellerRow> = index_first(&tables.sellers, |s| s.seller_id.as_str());
    let products: HashMap<&str, &ProductRow> =
        index_first(&tables.products, |p| p.product_id.as_str());
    let translations: HashMap<&str, Option<&str>> = tables
        .category_translation
        .iter()
        .map(|t| {
            (
                t.product_category_name.as_str(),
                t.product_category_name_english.as_deref(),
            )
        })
        .collect();
    let geo = geo_means(tables);
    let lookup_geo = |zip: Option<u32>| {
        zip.and_then(|z| geo.get(&z))
            .map(GeoMean::lat_lng)
            .unwrap_or((None, None))
    };

    let rows = orders
        .into_iter()
        .map(|entry| {
            let order = entry.order;
            let agg = items.get(order.order_id.as_str());
            let payment = payments.get(order.order_id.as_str());
            let customer = customers.get(order.customer_id.as_str()).copied();

            let product_id = agg.and_then(|a| a.product_id).unwrap_or("").to_string();
            let seller_id = agg.and_then(|a| a.seller_id).unwrap_or("").to_string();
            let seller = sellers.get(seller_id.as_str()).copied();
            let product = products.get(product_id.as_str()).copied();

            let product_category_name = product.and_then(|p| p.product_category_name.clone());
            let product_category_english = product_category_name
                .as_deref()
                .map(|name| {
                    translations
                        .get(name)
                        .copied()
                        .flatten()
                        .unwrap_or(name)
                        .to_string()
                })
                .unwrap_or_default();

            let customer_zip = customer.and_then(|c| c.customer_zip_code_prefix);
            let seller_zip = seller.and_then(|s| s.seller_zip_code_prefix);
            let (customer_lat, customer_lng) = lookup_geo(customer_zip);
            let (seller_lat, seller_lng) = lookup_geo(seller_zip);

            ModelingRow {
                order_id: order.order_id.clone(),
                customer_id: order.customer_id.clone(),
                order_status: order.order_status.clone().unwrap_or_default(),
                review_score: entry.review_score,
                review_creation_date: entry.review_creation_date,
                target: entry.target,
                order_purchase_timestamp: parse_opt(order.order_purchase_timestamp.as_deref()),
                order_approved_at: parse_opt(order.order_approved_at.as_deref()),
                order_delivered_carrier_date: parse_opt(
                    order.order_delivered_carrier_date.as_deref(),
                ),
                order_delivered_customer_date: parse_opt(
                    order.order_delivered_customer_date.as_deref(),
                ),
                order_estimated_delivery_date: order
                    .order_estimated_delivery_date
                    .as_deref()
                    .and_then(parse_timestamp),
                order_value: agg.map(|a| a.order_value).unwrap_or(0.0),
                freight_value: agg.map(|a| a.freight_value).unwrap_or(0.0),
                num_items: agg.map(|a| a.num_items).unwrap_or(0),
                product_id,
                seller_id,
                payment_type: payment
                    .and_then(|p| p.payment_type)
                    .unwrap_or("unknown")
                    .to_string(),
                payment_installments: payment.and_then(|p| p.installments).unwrap_or(0),
                payment_value: payment.and_then(|p| p.value),
                customer_zip_code_prefix: customer_zip,
                customer_city: customer.and_then(|c| c.customer_city.clone()),
                customer_state: customer.and_then(|c| c.customer_state.clone()),
                seller_zip_code_prefix: seller_zip,
                seller_city: seller.and_then(|s| s.seller_city.clone()),
                seller_state: seller.and_then(|s| s.seller_state.clone()),
                product_category_name,
                product_category_english,
                product_weight_g: product.and_then(|p| p.product_weight_g),
                product_length_cm: product.and_then(|p| p.product_length_cm),
                product_height_cm: product.and_then(|p| p.product_height_cm),
                product_width_cm: product.and_then(|p| p.product_width_cm),
                customer_lat,
                customer_lng,
                seller_lat,
                seller_lng,
            }
        })
        .collect();

    TransformResult {
        rows,
        orders_with_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        CategoryTranslationRow, GeolocationRow, OrderItemRow, PaymentRow,
    };

    fn order(id: &str, customer: &str) -> OrderRow {
        OrderRow {
            order_id: id.to_string(),
            customer_id: customer.to_string(),
            order_status: Some("delivered".to_string()),
            order_purchase_timestamp: Some("2017-10-02 10:56:33".to_string()),
            order_approved_at: None,
            order_delivered_carrier_date: None,
            order_delivered_customer_date: Some("garbage".to_string()),
            order_estimated_delivery_date: Some("2017-10-18 00:00:00".to_string()),
        }
    }

    fn review(order_id: &str, score: Option<u8>, created: Option<&str>) -> ReviewRow {
        ReviewRow {
            order_id: order_id.to_string(),
            review_score: score,
            review_creation_date: created.map(str::to_string),
        }
    }

    fn item(order_id: &str, n: u32, product: &str, seller: &str, price: f64) -> OrderItemRow {
        OrderItemRow {
            order_id: order_id.to_string(),
            order_item_id: Some(n),
            product_id: Some(product.to_string()),
            seller_id: Some(seller.to_string()),
            price: Some(price),
            freight_value: Some(5.0),
        }
    }

    fn tables() -> RawTables {
        RawTables {
            orders: vec![order("o1", "c1"), order("o2", "c2"), order("o3", "c3")],
            reviews: vec![
                review("o1", Some(5), Some("2017-10-20 00:00:00")),
                review("o1", Some(1), Some("2017-10-25 00:00:00")),
                review("o2", Some(4), Some("2017-10-21 00:00:00")),
                review("o2", Some(3), Some("2017-10-19 00:00:00")),
            ],
            order_items: vec![
                item("o1", 1, "p1", "s1", 10.0),
                item("o1", 2, "p2", "s2", 15.5),
            ],
            order_payments: vec![
                PaymentRow {
                    order_id: "o1".to_string(),
                    payment_sequential: Some(2),
                    payment_type: Some("voucher".to_string()),
                    payment_installments: Some(1),
                    payment_value: Some(5.0),
                },
                PaymentRow {
                    order_id: "o1".to_string(),
                    payment_sequential: Some(1),
                    payment_type: Some("credit_card".to_string()),
                    payment_installments: Some(3),
                    payment_value: Some(30.5),
                },
            ],
            customers: vec![CustomerRow {
                customer_id: "c1".to_string(),
                customer_zip_code_prefix: Some(1037),
                customer_city: Some("sao paulo".to_string()),
                customer_state: Some("SP".to_string()),
            }],
            sellers: vec![SellerRow {
                seller_id: "s1".to_string(),
                seller_zip_code_prefix: Some(13023),
                seller_city: Some("campinas".to_string()),
                seller_state: Some("SP".to_string()),
            }],
            products: vec![ProductRow {
                product_id: "p1".to_string(),
                product_category_name: Some("beleza_saude".to_string()),
                product_weight_g: Some(500.0),
                product_length_cm: Some(20.0),
                product_height_cm: Some(10.0),
                product_width_cm: Some(15.0),
            }],
            geolocation: vec![
                GeolocationRow {
                    geolocation_zip_code_prefix: Some(1037),
                    geolocation_lat: Some(-23.0),
                    geolocation_lng: Some(-46.0),
                },
                GeolocationRow {
                    geolocation_zip_code_prefix: Some(1037),
                    geolocation_lat: Some(-24.0),
                    geolocation_lng: Some(-47.0),
                },
            ],
            category_translation: vec![CategoryTranslationRow {
                product_category_name: "beleza_saude".to_string(),
                product_category_name_english: Some("health_beauty".to_string()),
            }],
        }
    }

    #[test]
    fn test_latest_review_defines_target() {
        let tables = tables();
        let orders = build_orders_with_target(&tables);

        // o3 has no review and is dropped
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order.order_id, "o1");
        assert_eq!(orders[0].review_score, 1);
        assert_eq!(orders[0].target, 1);
        assert_eq!(orders[1].review_score, 4);
        assert_eq!(orders[1].target, 0);
    }

    #[test]
    fn test_undated_review_wins_and_missing_score_drops_order() {
        let mut tables = tables();
        tables.reviews = vec![
            review("o1", Some(5), Some("2017-10-20 00:00:00")),
            review("o1", Some(2), None),
            review("o2", None, Some("2017-10-21 00:00:00")),
        ];
        let orders = build_orders_with_target(&tables);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].review_score, 2);
        assert_eq!(orders[0].target, 1);
    }

    #[test]
    fn test_review_tie_keeps_later_row() {
        let mut tables = tables();
        tables.reviews = vec![
            review("o1", Some(1), Some("2017-10-20 00:00:00")),
            review("o1", Some(5), Some("2017-10-20 00:00:00")),
            review("o2", Some(5), None),
            review("o2", Some(2), None),
        ];
        let orders = build_orders_with_target(&tables);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].review_score, 5);
        assert_eq!(orders[0].target, 0);
        assert_eq!(orders[1].review_score, 2);
        assert_eq!(orders[1].target, 1);
    }

    #[test]
    fn test_payment_tie_keeps_first_row() {
        let payment = |sequential: Option<u32>, kind: &str, value: f64| PaymentRow {
            order_id: "o1".to_string(),
            payment_sequential: sequential,
            payment_type: Some(kind.to_string()),
            payment_installments: Some(1),
            payment_value: Some(value),
        };
        let mut tables = tables();
        tables.order_payments = vec![
            payment(None, "debit_card", 1.0),
            payment(Some(1), "boleto", 10.0),
            payment(Some(1), "voucher", 20.0),
        ];

        let result = build_modeling_table(&tables);
        let o1 = &result.rows[0];
        assert_eq!(o1.order_id, "o1");
        assert_eq!(o1.payment_type, "boleto");
        assert_eq!(o1.payment_value, Some(10.0));
    }

    #[test]
    fn test_modeling_row_joins_all_tables() {
        let result = build_modeling_table(&tables());
        assert_eq!(result.orders_with_target, 2);
        let row = &result.rows[0];

        assert_eq!(row.order_value, 25.5);
        assert_eq!(row.freight_value, 10.0);
        assert_eq!(row.num_items, 2);
        assert_eq!(row.product_id, "p1");
        assert_eq!(row.seller_id, "s1");
        assert_eq!(row.payment_type, "credit_card");
        assert_eq!(row.payment_installments, 3);
        assert_eq!(row.customer_state.as_deref(), Some("SP"));
        assert_eq!(row.seller_city.as_deref(), Some("campinas"));
        assert_eq!(row.product_category_english, "health_beauty");
        assert_eq!(row.customer_lat, Some(-23.5));
        assert_eq!(row.customer_lng, Some(-46.5));
        assert_eq!(row.seller_lat, None);
        assert!(row.order_purchase_timestamp.is_some());
        assert!(row.order_delivered_customer_date.is_none());
    }

    #[test]
    fn test_orders_without_items_or_payments_get_defaults() {
        let result = build_modeling_table(&tables());
        let row = &result.rows[1];

        assert_eq!(row.order_value, 0.0);
        assert_eq!(row.num_items, 0);
        assert_eq!(row.product_id, "");
        assert_eq!(row.seller_id, "");
        assert_eq!(row.payment_type, "unknown");
        assert_eq!(row.payment_installments, 0);
        assert_eq!(row.product_category_english, "");
        assert!(row.customer_city.is_none());
    }

    #[test]
    fn test_untranslated_category_falls_back_to_portuguese() {
        let mut tables = tables();
        tables.category_translation.clear();
        let result = build_modeling_table(&tables);
        assert_eq!(result.rows[0].product_category_english, "beleza_saude");
    }
}
