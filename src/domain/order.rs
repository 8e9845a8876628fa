use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: BigDecimal,
}

/// A stored order. This is also the persisted shape: every field is written,
/// and unset timestamps are written as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub customer_id: u64,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Shipped,
    Completed,
}

/// One page request for `find_all`. `offset` is the opaque cursor returned by
/// the previous page, `0` to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindAllPage {
    pub size: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindResult {
    pub orders: Vec<Order>,
    /// `0` once the sweep is complete.
    pub cursor: u64,
}
