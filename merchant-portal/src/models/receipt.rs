use super::order::Order;
use serde::{Deserialize, Serialize};

/// Header printed at the top of a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptBusiness {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Receipt fetched by its public token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub business: ReceiptBusiness,
    pub order: Order,
    #[serde(default)]
    pub cashier: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub paid_amount: Option<i64>,
    #[serde(default)]
    pub change: Option<i64>,
    #[serde(default)]
    pub footer: Option<String>,
}

impl Receipt {
    pub fn computed_total(&self) -> i64 {
        self.order.computed_total()
    }

    /// Change owed: reported value, else derived from the amount paid.
    pub fn change_due(&self) -> Option<i64> {
        self.change.or_else(|| {
            self.paid_amount
                .map(|paid| paid.saturating_sub(self.order.total).max(0))
        })
    }
}
