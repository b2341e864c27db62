//! Ledger tunables.
use std::time::Duration;

use fieldx::fxstruct;
use garde::Validate;

use crate::error::Result;

#[derive(Debug, Clone, Validate)]
#[fxstruct(no_new, get(copy), builder(into))]
pub struct LedgerConfig {
    /// Inventory records with this many available units or fewer are reported as `low_stock`. Used for records that
    /// are registered without an explicit threshold.
    #[fieldx(default(10))]
    #[garde(range(min = 0))]
    low_stock_threshold: i64,

    /// How many times a unit of work is attempted when the datastore reports a conflict.
    #[fieldx(default(3))]
    #[garde(range(min = 1, max = 20))]
    transaction_attempts: u32,

    /// Pause before a repeated attempt. Multiplied by the attempt number.
    #[fieldx(default(Duration::from_millis(20)))]
    #[garde(skip)]
    retry_backoff: Duration,

    /// Who gets recorded in the inventory history when the caller doesn't say.
    #[fieldx(get(clone), default(String::from("system")))]
    #[garde(length(min = 1))]
    default_actor: String,
}

impl LedgerConfig {
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    pub fn actor_or_default(&self, performed_by: Option<&str>) -> String {
        performed_by
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| self.default_actor.clone(), str::to_string)
    }
}
