use crate::domain::model::RawTables;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, RiskError};
use serde::de::DeserializeOwned;

pub const ORDERS_FILE: &str = "olist_orders_dataset.csv";
pub const CUSTOMERS_FILE: &str = "olist_customers_dataset.csv";
pub const ORDER_ITEMS_FILE: &str = "olist_order_items_dataset.csv";
pub const ORDER_PAYMENTS_FILE: &str = "olist_order_payments_dataset.csv";
pub const REVIEWS_FILE: &str = "olist_order_reviews_dataset.csv";
pub const PRODUCTS_FILE: &str = "olist_products_dataset.csv";
pub const SELLERS_FILE: &str = "olist_sellers_dataset.csv";
pub const GEOLOCATION_FILE: &str = "olist_geolocation_dataset.csv";
pub const CATEGORY_TRANSLATION_FILE: &str = "product_category_name_translation.csv";

/// Table key and file name of every CSV in the Kaggle export.
pub const DEFAULT_FILES: [(&str, &str); 9] = [
    ("orders", ORDERS_FILE),
    ("customers", CUSTOMERS_FILE),
    ("order_items", ORDER_ITEMS_FILE),
    ("order_payments", ORDER_PAYMENTS_FILE),
    ("reviews", REVIEWS_FILE),
    ("products", PRODUCTS_FILE),
    ("sellers", SELLERS_FILE),
    ("geolocation", GEOLOCATION_FILE),
    ("category_translation", CATEGORY_TRANSLATION_FILE),
];

/// Loads all Olist tables. Every file must be present before any is parsed.
pub async fn load_raw_tables<S: Storage>(storage: &S) -> Result<RawTables> {
    for (_, file) in DEFAULT_FILES {
        if !storage.exists(file).await {
            return Err(RiskError::missing_file(format!(
                "{} (in {})",
                file,
                storage.describe()
            )));
        }
    }

    tracing::debug!("Reading Olist tables from {}", storage.describe());

    Ok(RawTables {
        orders: read_table(storage, ORDERS_FILE).await?,
        customers: read_table(storage, CUSTOMERS_FILE).await?,
        order_items: read_table(storage, ORDER_ITEMS_FILE).await?,
        order_payments: read_table(storage, ORDER_PAYMENTS_FILE).await?,
        reviews: read_table(storage, REVIEWS_FILE).await?,
        products: read_table(storage, PRODUCTS_FILE).await?,
        sellers: read_table(storage, SELLERS_FILE).await?,
        geolocation: read_table(storage, GEOLOCATION_FILE).await?,
        category_translation: read_table(storage, CATEGORY_TRANSLATION_FILE).await?,
    })
}

async fn read_table<S: Storage, T: DeserializeOwned>(storage: &S, file: &str) -> Result<Vec<T>> {
    let data = storage.read_file(file).await?;
    let rows = parse_csv(&data)?;
    tracing::debug!("Loaded {} rows from {}", rows.len(), file);
    Ok(rows)
}

/// Parses CSV bytes with a header row into typed records.
pub fn parse_csv<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>> {
    // Kaggle 的翻譯表帶有 UTF-8 BOM
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}
