//! # Order Types
//!
//! The order aggregate: lines, discounts and taxes owned by one order, plus
//! the order status lifecycle.

use crate::error::ShopResult;
use crate::item::{Currency, Item, ItemId};
use crate::pricing::{self, PricingBreakdown};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order identifier
pub type OrderId = u64;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Open cart, still being filled
    #[default]
    Pending,
    /// Payment confirmed
    Paid,
    /// Handed to delivery
    Shipped,
    /// Abandoned or refunded
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether an order in this status may move to `next`
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Paid)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Paid, OrderStatus::Shipped)
                | (OrderStatus::Paid, OrderStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One item in an order, with its quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: Item,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(item: Item, quantity: u32) -> Self {
        Self { item, quantity }
    }

    /// Line cost: unit price times quantity
    pub fn cost(&self) -> Decimal {
        self.item.price * Decimal::from(self.quantity)
    }
}

/// Percentage discount attached to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: u64,
    pub order_id: OrderId,
    /// Percent of the pre-discount subtotal
    pub rate: Decimal,
}

impl std::fmt::Display for Discount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}% discount for Order {}", self.rate, self.order_id)
    }
}

/// Percentage tax attached to an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tax {
    pub id: u64,
    pub order_id: OrderId,
    /// Percent of the discounted subtotal
    pub rate: Decimal,
}

/// An order with everything it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,

    pub status: OrderStatus,

    /// Last persisted total; refreshed by every recomputation
    pub total_price: Decimal,

    /// Lines in insertion order
    pub lines: Vec<OrderLine>,

    #[serde(default)]
    pub discounts: Vec<Discount>,

    #[serde(default)]
    pub taxes: Vec<Tax>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new empty pending order
    pub fn new(id: OrderId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: OrderStatus::Pending,
            total_price: Decimal::ZERO,
            lines: Vec::new(),
            discounts: Vec::new(),
            taxes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Currency of the order, taken from the first line's item
    pub fn currency(&self) -> Option<Currency> {
        self.lines.first().map(|line| line.item.currency)
    }

    /// Check if order has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Find the line for an item
    pub fn line(&self, item_id: ItemId) -> Option<&OrderLine> {
        self.lines.iter().find(|line| line.item.id == item_id)
    }

    /// Sum of line costs, without any discount or tax pass
    pub fn total_price_before_discounts(&self) -> Decimal {
        pricing::items_total(&self.lines)
    }

    /// Full price breakdown of the current lines, discounts and taxes
    pub fn pricing(&self) -> ShopResult<PricingBreakdown> {
        PricingBreakdown::compute(&self.lines, &self.discounts, &self.taxes)
    }

    /// Recompute and store `total_price`, rounded to the order currency.
    ///
    /// On error `total_price` is left as it was.
    pub fn refresh_total(&mut self) -> ShopResult<PricingBreakdown> {
        let breakdown = self.pricing()?;
        let currency = self.currency().unwrap_or_default();
        self.total_price = currency.round(breakdown.total);
        Ok(breakdown)
    }

    /// Total in the payment API's minor units, from the stored `total_price`
    pub fn total_in_minor_units(&self) -> ShopResult<i64> {
        self.currency()
            .unwrap_or_default()
            .to_minor_units(self.total_price)
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
