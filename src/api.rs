//! Request and response shapes of the order surface.
use garde::Validate;
use serde::ser::SerializeMap;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

use crate::db::prelude::*;
use crate::error::LedgerError;
use crate::error::Result;
use crate::types::DeliveryType;
use crate::types::OrderStatus;
use crate::types::PaymentMethod;
use crate::types::StockKey;

#[allow(clippy::ptr_arg)]
fn non_blank(value: &String, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[garde(custom(non_blank))]
    pub name:        String,
    #[garde(skip)]
    pub email:       Option<String>,
    #[garde(custom(non_blank))]
    pub phone:       String,
    #[garde(custom(non_blank))]
    pub address:     String,
    #[garde(custom(non_blank))]
    pub city:        String,
    #[garde(skip)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    #[garde(range(min = 1))]
    pub product_id: i32,
    #[garde(custom(non_blank))]
    pub title:      String,
    #[garde(range(min = 0.0))]
    pub price:      f64,
    #[garde(range(min = 1))]
    pub quantity:   i64,
    #[garde(skip)]
    pub size:       Option<String>,
    #[garde(skip)]
    pub color:      Option<String>,
}

impl LineItemRequest {
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.size.as_deref().unwrap_or_default())
    }
}

/// A checkout. Money fields are taken as submitted.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    #[garde(dive)]
    pub shipping_info:      ShippingInfo,
    #[garde(length(min = 1), dive)]
    pub items:              Vec<LineItemRequest>,
    #[garde(skip)]
    pub payment_method:     PaymentMethod,
    #[garde(skip)]
    pub delivery_type:      DeliveryType,
    #[garde(range(min = 0.0))]
    pub subtotal:           f64,
    #[serde(default)]
    #[garde(range(min = 0.0))]
    pub discount_total:     f64,
    #[serde(default)]
    #[garde(range(min = 0.0))]
    pub shipping_charge:    f64,
    #[garde(range(min = 0.0))]
    pub total:              f64,
    #[serde(default)]
    #[garde(skip)]
    pub estimated_delivery: Option<String>,
}

/// Status change request. Notes and tracking number are stored whenever present, even if the status doesn't change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status:          OrderStatus,
    #[serde(default)]
    pub notes:           Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            notes: None,
            tracking_number: None,
        }
    }

    pub fn notes<S: ToString>(mut self, notes: S) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn tracking_number<S: ToString>(mut self, tracking_number: S) -> Self {
        self.tracking_number = Some(tracking_number.to_string());
        self
    }
}

/// An order with its lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// The `{ success, data | error }` envelope every operation answers with.
#[derive(Debug)]
pub enum Reply<T> {
    Success(T),
    Failure { status: u16, error: String },
}

impl<T> Reply<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }

    /// HTTP-like status for the outer surface.
    pub fn status(&self) -> u16 {
        match self {
            Reply::Success(_) => 200,
            Reply::Failure { status, .. } => *status,
        }
    }
}

impl<T> From<Result<T>> for Reply<T> {
    fn from(res: Result<T>) -> Self {
        match res {
            Ok(data) => Reply::Success(data),
            Err(err) => err.into(),
        }
    }
}

impl<T> From<LedgerError> for Reply<T> {
    fn from(err: LedgerError) -> Self {
        Reply::Failure {
            status: err.status_code(),
            error:  err.to_string(),
        }
    }
}

impl<T: Serialize> Serialize for Reply<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Reply::Success(data) => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
            }
            Reply::Failure { error, .. } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn submission() -> OrderSubmission {
        serde_json::from_value(json!({
            "shippingInfo": {
                "name": "Ada Lovelace",
                "phone": "+44 20 7946 0000",
                "address": "12 St James's Square",
                "city": "London"
            },
            "items": [
                { "productId": 3, "title": "Linen Shirt", "price": 49.5, "quantity": 2, "size": "M" },
                { "productId": 8, "title": "Mug", "price": 9.0, "quantity": 1 }
            ],
            "paymentMethod": "cash_on_delivery",
            "deliveryType": "standard",
            "subtotal": 108.0,
            "shippingCharge": 5.0,
            "total": 113.0
        }))
        .expect("valid submission json")
    }

    #[test]
    fn test_submission_contract() {
        let sub = submission();
        assert!(sub.validate().is_ok());
        assert_eq!(sub.items[0].stock_key(), StockKey::new(3, "M"));
        assert_eq!(sub.items[1].stock_key(), StockKey::product(8));
        assert_eq!(sub.discount_total, 0.0);
        assert_eq!(sub.payment_method, PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn test_submission_validation() {
        let mut sub = submission();
        sub.items.clear();
        let err: LedgerError = sub.validate().unwrap_err().into();
        assert_eq!(err.status_code(), 400);

        let mut sub = submission();
        sub.items[1].quantity = 0;
        assert!(sub.validate().is_err());

        let mut sub = submission();
        sub.shipping_info.city = "   ".into();
        assert!(sub.validate().is_err());

        let mut sub = submission();
        sub.total = -1.0;
        assert!(sub.validate().is_err());
    }

    #[test]
    fn test_status_update_json() {
        let update: StatusUpdate =
            serde_json::from_value(json!({ "status": "shipped", "trackingNumber": "TRK-1" })).unwrap();
        assert_eq!(update.status, OrderStatus::Shipped);
        assert_eq!(update.tracking_number.as_deref(), Some("TRK-1"));
        assert_eq!(update.notes, None);
    }

    #[test]
    fn test_reply_envelope() {
        let ok: Reply<u32> = Ok(7).into();
        assert_eq!(ok.status(), 200);
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "success": true, "data": 7 }));

        let failed: Reply<u32> = Err(LedgerError::OrderNotFound("ORD-9".into())).into();
        assert!(!failed.is_success());
        assert_eq!(failed.status(), 404);
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({ "success": false, "error": "Order 'ORD-9' not found" })
        );
    }
}
