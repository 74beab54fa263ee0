use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Kitchen progression shown on the order tracker.
    pub const PROGRESSION: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
    ];

    /// Position in [`PROGRESSION`](Self::PROGRESSION); cancelled orders have none.
    pub fn progress_index(&self) -> Option<usize> {
        Self::PROGRESSION.iter().position(|s| s == self)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Waiting for confirmation",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Preparing => "Being prepared",
            OrderStatus::Ready => "Ready to serve",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    /// Unit price in rupiah.
    pub price: i64,
    pub subtotal: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub subtotal: i64,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub discount: i64,
    pub total: i64,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub table_number: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    fn items_subtotal(&self) -> i64 {
        self.items
            .iter()
            .fold(0i64, |sum, item| sum.saturating_add(item.subtotal))
    }

    /// subtotal − discount + tax, saturating on nonsense amounts.
    pub fn computed_total(&self) -> i64 {
        self.subtotal
            .saturating_sub(self.discount)
            .saturating_add(self.tax)
    }

    /// Display-only check; the backend owns the numbers.
    pub fn totals_consistent(&self) -> bool {
        self.items_subtotal() == self.subtotal && self.computed_total() == self.total
    }
}

/// Order tracker view returned to the status page.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusView {
    pub order: Order,
    pub label: &'static str,
    pub progress_index: Option<usize>,
    pub progress_steps: usize,
    pub is_final: bool,
}

impl From<Order> for OrderStatusView {
    fn from(order: Order) -> Self {
        Self {
            label: order.status.label(),
            progress_index: order.status.progress_index(),
            progress_steps: OrderStatus::PROGRESSION.len(),
            is_final: order.status.is_final(),
            order,
        }
    }
}
