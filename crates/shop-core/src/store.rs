//! # Store
//!
//! Persistence seam for items and orders.
//!
//! `InMemoryStore` keeps one table per record kind (items, orders, order
//! lines, discounts, taxes) behind a single lock. Every method runs under
//! that lock from start to finish, so a cart mutation and the total
//! recomputation that follows it are applied as one unit.
//!
//! Cart mutations price the changed order before writing any row. A change
//! that cannot be priced is rejected and leaves the tables untouched.

use crate::error::{ShopError, ShopResult};
use crate::item::{Item, ItemId, NewItem};
use crate::order::{Discount, Order, OrderId, OrderLine, OrderStatus, Tax};
use crate::pricing::PricingBreakdown;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage operations the cart and checkout services rely on.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a catalog item
    async fn create_item(&self, item: NewItem) -> ShopResult<Item>;

    /// Fetch an item, `ItemNotFound` if absent
    async fn item(&self, item_id: ItemId) -> ShopResult<Item>;

    /// All catalog items, by id
    async fn items(&self) -> ShopResult<Vec<Item>>;

    /// Delete an item and every order line that references it
    async fn delete_item(&self, item_id: ItemId) -> ShopResult<()>;

    /// Insert an empty pending order
    async fn create_order(&self) -> ShopResult<Order>;

    /// Fetch an order with its lines, discounts and taxes
    async fn order(&self, order_id: OrderId) -> ShopResult<Order>;

    /// Delete an order together with its lines, discounts and taxes
    async fn delete_order(&self, order_id: OrderId) -> ShopResult<()>;

    /// Add `quantity` units of an item to a pending order.
    ///
    /// Increments the existing line for the item if there is one, then
    /// recomputes the order total.
    async fn add_line(&self, order_id: OrderId, item_id: ItemId, quantity: u32)
        -> ShopResult<Order>;

    /// Remove every line from a pending order and reset its total to zero
    async fn clear_lines(&self, order_id: OrderId) -> ShopResult<Order>;

    /// Attach a percentage discount and recompute the total.
    ///
    /// Only pending orders accept discounts and taxes.
    async fn add_discount(&self, order_id: OrderId, rate: Decimal) -> ShopResult<Order>;

    /// Attach a percentage tax and recompute the total
    async fn add_tax(&self, order_id: OrderId, rate: Decimal) -> ShopResult<Order>;

    /// Recompute and persist the order total
    async fn recompute_total(&self, order_id: OrderId) -> ShopResult<(Order, PricingBreakdown)>;

    /// Move an order to a new status, if the transition is allowed
    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> ShopResult<Order>;
}

/// Type alias for a shared store (dynamic dispatch)
pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, Clone)]
struct OrderRow {
    status: OrderStatus,
    total_price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct LineRow {
    order_id: OrderId,
    item_id: ItemId,
    quantity: u32,
}

#[derive(Debug, Default)]
struct Tables {
    last_item_id: ItemId,
    last_order_id: OrderId,
    last_adjustment_id: u64,
    items: BTreeMap<ItemId, Item>,
    orders: BTreeMap<OrderId, OrderRow>,
    /// Insertion order is significant: the first line decides the currency
    lines: Vec<LineRow>,
    discounts: Vec<Discount>,
    taxes: Vec<Tax>,
}

impl Tables {
    fn item(&self, item_id: ItemId) -> ShopResult<&Item> {
        self.items.get(&item_id).ok_or(ShopError::ItemNotFound { item_id })
    }

    fn order_row(&mut self, order_id: OrderId) -> ShopResult<&mut OrderRow> {
        self.orders
            .get_mut(&order_id)
            .ok_or(ShopError::OrderNotFound { order_id })
    }

    fn next_adjustment_id(&mut self) -> u64 {
        self.last_adjustment_id += 1;
        self.last_adjustment_id
    }

    /// Join an order row with its lines, discounts and taxes
    fn load(&self, order_id: OrderId) -> ShopResult<Order> {
        let row = self
            .orders
            .get(&order_id)
            .ok_or(ShopError::OrderNotFound { order_id })?;

        let lines = self
            .lines
            .iter()
            .filter(|line| line.order_id == order_id)
            .map(|line| Ok(OrderLine::new(self.item(line.item_id)?.clone(), line.quantity)))
            .collect::<ShopResult<Vec<_>>>()?;

        Ok(Order {
            id: order_id,
            status: row.status,
            total_price: row.total_price,
            lines,
            discounts: self
                .discounts
                .iter()
                .filter(|d| d.order_id == order_id)
                .cloned()
                .collect(),
            taxes: self
                .taxes
                .iter()
                .filter(|t| t.order_id == order_id)
                .cloned()
                .collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    /// Load an order that cart mutations may still touch
    fn pending_order(&self, order_id: OrderId) -> ShopResult<Order> {
        let order = self.load(order_id)?;
        if order.status != OrderStatus::Pending {
            return Err(ShopError::OrderNotPending {
                order_id,
                status: order.status,
            });
        }
        Ok(order)
    }

    /// Reprice an order from its current rows and write the total back
    fn recompute(&mut self, order_id: OrderId) -> ShopResult<(Order, PricingBreakdown)> {
        let mut order = self.load(order_id)?;
        let breakdown = order.refresh_total()?;
        order.touch();

        let row = self.order_row(order_id)?;
        row.total_price = order.total_price;
        row.updated_at = order.updated_at;

        debug!(
            order_id,
            items_total = %breakdown.items_total,
            total = %order.total_price,
            "Recomputed order total"
        );
        Ok((order, breakdown))
    }
}

/// Store backed by in-process tables
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into a shared handle
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_item(&self, item: NewItem) -> ShopResult<Item> {
        let mut tables = self.tables.write().await;
        tables.last_item_id += 1;
        let item = item.into_item(tables.last_item_id);
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn item(&self, item_id: ItemId) -> ShopResult<Item> {
        self.tables.read().await.item(item_id).cloned()
    }

    async fn items(&self) -> ShopResult<Vec<Item>> {
        Ok(self.tables.read().await.items.values().cloned().collect())
    }

    async fn delete_item(&self, item_id: ItemId) -> ShopResult<()> {
        let mut tables = self.tables.write().await;
        tables.item(item_id)?;
        tables.items.remove(&item_id);

        let affected: Vec<OrderId> = tables
            .lines
            .iter()
            .filter(|line| line.item_id == item_id)
            .map(|line| line.order_id)
            .collect();

        tables.lines.retain(|line| line.item_id != item_id);
        for order_id in affected {
            tables.recompute(order_id)?;
        }
        Ok(())
    }

    async fn create_order(&self) -> ShopResult<Order> {
        let mut tables = self.tables.write().await;
        tables.last_order_id += 1;
        let order = Order::new(tables.last_order_id);
        tables.orders.insert(
            order.id,
            OrderRow {
                status: order.status,
                total_price: order.total_price,
                created_at: order.created_at,
                updated_at: order.updated_at,
            },
        );
        Ok(order)
    }

    async fn order(&self, order_id: OrderId) -> ShopResult<Order> {
        self.tables.read().await.load(order_id)
    }

    async fn delete_order(&self, order_id: OrderId) -> ShopResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .orders
            .remove(&order_id)
            .ok_or(ShopError::OrderNotFound { order_id })?;
        tables.lines.retain(|line| line.order_id != order_id);
        tables.discounts.retain(|d| d.order_id != order_id);
        tables.taxes.retain(|t| t.order_id != order_id);
        Ok(())
    }

    async fn add_line(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        quantity: u32,
    ) -> ShopResult<Order> {
        if quantity == 0 {
            return Err(ShopError::InvalidRequest(
                "Quantity must be a positive integer".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let mut preview = tables.pending_order(order_id)?;
        let item = tables.item(item_id)?.clone();

        if let Some(cart_currency) = preview.currency() {
            if cart_currency != item.currency {
                return Err(ShopError::CurrencyMismatch {
                    cart: cart_currency.code(),
                    item: item.currency.code(),
                });
            }
        }

        let quantity = match preview.lines.iter_mut().find(|line| line.item.id == item_id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity).ok_or_else(|| {
                    ShopError::InvalidRequest("Quantity is too large".to_string())
                })?;
                line.quantity
            }
            None => {
                preview.lines.push(OrderLine::new(item, quantity));
                quantity
            }
        };
        preview.pricing()?;

        match tables
            .lines
            .iter_mut()
            .find(|line| line.order_id == order_id && line.item_id == item_id)
        {
            Some(line) => line.quantity = quantity,
            None => tables.lines.push(LineRow {
                order_id,
                item_id,
                quantity,
            }),
        }

        let (order, _) = tables.recompute(order_id)?;
        Ok(order)
    }

    async fn clear_lines(&self, order_id: OrderId) -> ShopResult<Order> {
        let mut tables = self.tables.write().await;
        tables.pending_order(order_id)?;
        tables.lines.retain(|line| line.order_id != order_id);

        let row = tables.order_row(order_id)?;
        row.total_price = Decimal::ZERO;
        row.updated_at = Utc::now();

        tables.load(order_id)
    }

    async fn add_discount(&self, order_id: OrderId, rate: Decimal) -> ShopResult<Order> {
        let mut tables = self.tables.write().await;
        let mut preview = tables.pending_order(order_id)?;
        let discount = Discount {
            id: tables.next_adjustment_id(),
            order_id,
            rate,
        };
        preview.discounts.push(discount.clone());
        preview.pricing()?;

        tables.discounts.push(discount);
        let (order, _) = tables.recompute(order_id)?;
        Ok(order)
    }

    async fn add_tax(&self, order_id: OrderId, rate: Decimal) -> ShopResult<Order> {
        let mut tables = self.tables.write().await;
        let mut preview = tables.pending_order(order_id)?;
        let tax = Tax {
            id: tables.next_adjustment_id(),
            order_id,
            rate,
        };
        preview.taxes.push(tax.clone());
        preview.pricing()?;

        tables.taxes.push(tax);
        let (order, _) = tables.recompute(order_id)?;
        Ok(order)
    }

    async fn recompute_total(&self, order_id: OrderId) -> ShopResult<(Order, PricingBreakdown)> {
        self.tables.write().await.recompute(order_id)
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> ShopResult<Order> {
        let mut tables = self.tables.write().await;
        let row = tables.order_row(order_id)?;
        if !row.status.can_transition_to(status) {
            return Err(ShopError::InvalidTransition {
                from: row.status,
                to: status,
            });
        }
        row.status = status;
        row.updated_at = Utc::now();
        tables.load(order_id)
    }
}
