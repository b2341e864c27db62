#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use sea_orm::ActiveModelTrait;
use sea_orm::ActiveValue::Set;
use sea_orm::ActiveValue::Unchanged;
use serde_json::json;
use stockroom::db::entity::inventory_record;
use stockroom::prelude::*;
use tempfile::TempDir;

pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

pub struct Shop {
    pub stockroom: Arc<Stockroom<Sqlite>>,
    pub driver:    Arc<Sqlite>,
    // Keeps the database directory alive for the duration of the test.
    _dir:          TempDir,
}

impl Shop {
    pub async fn open() -> TestResult<Self> {
        Self::with_config(LedgerConfig::builder().build()?).await
    }

    pub async fn with_config(config: LedgerConfig) -> TestResult<Self> {
        let dir = tempfile::tempdir()?;
        let driver = Arc::new(Sqlite::connect(dir.path(), "stockroom_test.db").await?);
        let stockroom = Stockroom::builder().db(driver.clone()).config(config).build()?;
        stockroom.prepare().await?;
        Ok(Self {
            stockroom,
            driver,
            _dir: dir,
        })
    }

    /// Register a product with a single base inventory record.
    pub async fn product(&self, id: i32, title: &str, stock: i64, threshold: Option<i64>) -> TestResult<StockKey> {
        let mut new_stock = NewStock::new("", stock);
        if let Some(threshold) = threshold {
            new_stock = new_stock.low_stock_threshold(threshold);
        }
        self.stockroom
            .inventory()?
            .register(catalog_entry(id, title), vec![new_stock], Some("test"))
            .await?;
        Ok(StockKey::product(id))
    }

    pub async fn record(&self, key: &StockKey) -> TestResult<InventoryRecord> {
        Ok(self.stockroom.inventory()?.stock_level(key).await?)
    }

    /// (stock, reserved, available)
    pub async fn counters(&self, key: &StockKey) -> TestResult<(i64, i64, i64)> {
        let rec = self.record(key).await?;
        assert!(rec.is_consistent(), "inconsistent record {rec:?}");
        Ok((rec.stock_quantity, rec.reserved_quantity, rec.available_quantity))
    }

    pub async fn order(&self, lines: &[(&StockKey, i64)]) -> stockroom::error::Result<OrderView> {
        self.stockroom
            .lifecycle()?
            .create_order(submission(lines), Some("checkout"))
            .await
    }

    pub async fn set_status(&self, order: &OrderView, status: OrderStatus) -> stockroom::error::Result<OrderView> {
        self.stockroom
            .lifecycle()?
            .update_order_status(order.order.id, StatusUpdate::to(status), Some("admin"))
            .await
    }

    /// Overwrite the reserved counter behind the ledger's back, the way a manual database edit would.
    pub async fn corrupt_reserved(&self, key: &StockKey, reserved: i64) -> TestResult {
        let rec = self.record(key).await?;
        inventory_record::ActiveModel {
            product_id: Unchanged(rec.product_id),
            variant: Unchanged(rec.variant.clone()),
            reserved_quantity: Set(reserved),
            available_quantity: Set(rec.stock_quantity - reserved),
            ..Default::default()
        }
        .update(&self.driver.connection())
        .await?;
        Ok(())
    }

    pub async fn close(self) -> TestResult {
        self.driver.close().await?;
        Ok(())
    }
}

pub fn catalog_entry(id: i32, title: &str) -> Product {
    Product {
        id,
        title: title.to_string(),
        price: 25.0,
        category: "apparel".to_string(),
        images: json!([format!("https://img.example/{id}.jpg")]),
    }
}

pub fn submission(lines: &[(&StockKey, i64)]) -> OrderSubmission {
    let items: Vec<LineItemRequest> = lines
        .iter()
        .map(|(key, quantity)| LineItemRequest {
            product_id: key.product_id,
            title:      format!("Product {}", key.product_id),
            price:      25.0,
            quantity:   *quantity,
            size:       (!key.variant.is_empty()).then(|| key.variant.clone()),
            color:      None,
        })
        .collect();
    let subtotal = items.iter().map(|i| i.price * i.quantity as f64).sum::<f64>();

    OrderSubmission {
        shipping_info: ShippingInfo {
            name:        "Grace Hopper".to_string(),
            email:       Some("grace@example.com".to_string()),
            phone:       "+1 555 0100".to_string(),
            address:     "1 Navy Yard".to_string(),
            city:        "Arlington".to_string(),
            postal_code: Some("22202".to_string()),
        },
        items,
        payment_method: PaymentMethod::CashOnDelivery,
        delivery_type: DeliveryType::Standard,
        subtotal,
        discount_total: 0.0,
        shipping_charge: 5.0,
        total: subtotal + 5.0,
        estimated_delivery: Some("3-5 days".to_string()),
    }
}
