use sea_orm::DbErr;
use thiserror::Error;

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

#[macro_export]
macro_rules! ledgerr {
    ($($arg:tt)*) => {
        $crate::error::LedgerError::Other(format!($($arg)*))
    };
}

pub use crate::ledgerr;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient stock for '{title}': requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i32,
        variant:    String,
        title:      String,
        requested:  i64,
        available:  i64,
    },

    #[error("Order '{0}' not found")]
    OrderNotFound(String),

    #[error("Product {product_id}{} not found", variant_suffix(.variant))]
    ProductNotFound { product_id: i32, variant: String },

    #[error("Transaction aborted: {0}")]
    TransactionAbort(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Db(DbErr),

    #[error(transparent)]
    FieldX(#[from] fieldx::error::FieldXError),

    #[error("{0}")]
    Other(String),
}

fn variant_suffix(variant: &str) -> String {
    if variant.is_empty() {
        String::new()
    }
    else {
        format!(" (size {variant})")
    }
}

// Fragments of driver messages which mean the unit of work lost a race and may succeed if repeated.
const TRANSIENT_MARKERS: &[&str] = &[
    "database is locked",
    "database table is locked",
    "SQLITE_BUSY",
    "could not serialize access",
    "deadlock detected",
    "40001",
    "40P01",
];

impl From<DbErr> for LedgerError {
    fn from(err: DbErr) -> Self {
        let msg = err.to_string();
        if TRANSIENT_MARKERS.iter().any(|m| msg.contains(m)) {
            LedgerError::TransactionAbort(msg)
        }
        else {
            LedgerError::Db(err)
        }
    }
}

impl From<garde::Report> for LedgerError {
    fn from(report: garde::Report) -> Self {
        LedgerError::Validation(report.to_string().trim().to_string())
    }
}

impl LedgerError {
    /// How many units short the request was. Zero for anything but [`LedgerError::InsufficientStock`].
    pub fn shortfall(&self) -> i64 {
        match self {
            LedgerError::InsufficientStock {
                requested, available, ..
            } => (*requested - (*available).max(0)).max(0),
            _ => 0,
        }
    }

    /// Only datastore conflicts are worth repeating; business errors would fail the same way again.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::TransactionAbort(_))
    }

    /// HTTP-like status code for the outer request surface.
    pub fn status_code(&self) -> u16 {
        match self {
            LedgerError::Validation(_) => 400,
            LedgerError::OrderNotFound(_) | LedgerError::ProductNotFound { .. } => 404,
            LedgerError::InsufficientStock { .. } => 409,
            LedgerError::TransactionAbort(_) => 503,
            LedgerError::Db(_) | LedgerError::FieldX(_) | LedgerError::Other(_) => 500,
        }
    }

    pub(crate) fn product_not_found(product_id: i32, variant: &str) -> Self {
        LedgerError::ProductNotFound {
            product_id,
            variant: variant.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short() -> LedgerError {
        LedgerError::InsufficientStock {
            product_id: 7,
            variant:    "M".into(),
            title:      "Linen Shirt".into(),
            requested:  5,
            available:  2,
        }
    }

    #[test]
    fn test_insufficient_stock_message() {
        let err = short();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for 'Linen Shirt': requested 5, available 2"
        );
        assert_eq!(err.shortfall(), 3);
        assert_eq!(err.status_code(), 409);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_shortfall_with_overdrawn_availability() {
        let err = LedgerError::InsufficientStock {
            product_id: 1,
            variant:    String::new(),
            title:      "Mug".into(),
            requested:  2,
            available:  -4,
        };
        assert_eq!(err.shortfall(), 2);
    }

    #[test]
    fn test_not_found_messages() {
        assert_eq!(LedgerError::product_not_found(3, "").to_string(), "Product 3 not found");
        assert_eq!(
            LedgerError::product_not_found(3, "XL").to_string(),
            "Product 3 (size XL) not found"
        );
        assert_eq!(LedgerError::OrderNotFound("ORD-1".into()).status_code(), 404);
    }

    #[test]
    fn test_db_errors_are_classified() {
        let busy: LedgerError = DbErr::Custom("error returned from database: (code: 5) database is locked".into()).into();
        assert!(busy.is_retryable());
        assert_eq!(busy.status_code(), 503);

        let other: LedgerError = DbErr::RecordNotInserted.into();
        assert!(!other.is_retryable());
        assert_eq!(other.status_code(), 500);
    }

    #[test]
    fn test_ledgerr_macro() {
        let err = ledgerr!("cannot {} twice", "ship");
        assert_eq!(err.to_string(), "cannot ship twice");
    }
}
