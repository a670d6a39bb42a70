//! # Cart
//!
//! Session-scoped cart operations. The caller owns the session and passes in
//! the cart id it holds (if any); every operation hands back the order the
//! session should remember afterwards.

use crate::error::{ShopError, ShopResult};
use crate::item::{Currency, ItemId};
use crate::order::{Order, OrderId, OrderStatus};
use crate::store::{SharedStore, Store};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

/// Display currency for a cart with no lines
pub const FALLBACK_CURRENCY: Currency = Currency::USD;

/// Parse a requested quantity; anything that is not a positive integer
/// counts as 1.
pub fn parse_quantity(raw: Option<&str>) -> u32 {
    raw.and_then(|q| q.trim().parse::<u32>().ok())
        .filter(|q| *q > 0)
        .unwrap_or(1)
}

/// Result of clearing a cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Lines removed; the order is still there and reusable
    Cleared(Order),
    /// The session held no cart id
    NoCart,
    /// The session's cart id points at no order
    Missing(OrderId),
    /// The session's cart id points at an order that is no longer pending
    NotPending(OrderId),
}

/// Cart contents prepared for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub order: Order,
    /// First line's currency, or the fallback for an empty cart
    pub currency: Currency,
}

/// Cart operations over a store
#[derive(Clone)]
pub struct CartManager {
    store: SharedStore,
}

impl CartManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Return the session's pending cart, creating one if the session has
    /// none or its cart is gone or no longer pending.
    #[instrument(skip(self))]
    pub async fn pending_cart(&self, cart_id: Option<OrderId>) -> ShopResult<Order> {
        if let Some(order_id) = cart_id {
            match self.store.order(order_id).await {
                Ok(order) if order.status == OrderStatus::Pending => return Ok(order),
                Ok(order) => {
                    debug!(order_id, status = %order.status, "Session cart is closed, starting a new one");
                }
                Err(ShopError::OrderNotFound { .. }) => {
                    debug!(order_id, "Session cart no longer exists, starting a new one");
                }
                Err(e) => return Err(e),
            }
        }

        let order = self.store.create_order().await?;
        info!(order_id = order.id, "Created pending cart");
        Ok(order)
    }

    /// Add `quantity` units of an item to the session's cart.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Option<OrderId>,
        item_id: ItemId,
        quantity: u32,
    ) -> ShopResult<Order> {
        let item = self.store.item(item_id).await?;
        let cart = self.pending_cart(cart_id).await?;
        let order = self.store.add_line(cart.id, item.id, quantity.max(1)).await?;

        info!(
            order_id = order.id,
            item_id,
            quantity,
            total = %order.total_price,
            "Added item to cart"
        );
        Ok(order)
    }

    /// Empty the session's cart, keeping the order row.
    ///
    /// A missing cart id, a missing order or a closed order is not an error.
    #[instrument(skip(self))]
    pub async fn clear(&self, cart_id: Option<OrderId>) -> ShopResult<ClearOutcome> {
        let Some(order_id) = cart_id else {
            info!("No cart id in session, nothing to clear");
            return Ok(ClearOutcome::NoCart);
        };

        match self.store.order(order_id).await {
            Ok(order) if order.status == OrderStatus::Pending => {}
            Ok(_) => {
                info!(order_id, "Cart is not pending, nothing to clear");
                return Ok(ClearOutcome::NotPending(order_id));
            }
            Err(ShopError::OrderNotFound { .. }) => {
                info!(order_id, "Cart not found, nothing to clear");
                return Ok(ClearOutcome::Missing(order_id));
            }
            Err(e) => return Err(e),
        }

        let order = self.store.clear_lines(order_id).await?;
        info!(order_id, "Cleared cart");
        Ok(ClearOutcome::Cleared(order))
    }

    /// Load the session's cart for display.
    #[instrument(skip(self))]
    pub async fn view(&self, cart_id: Option<OrderId>) -> ShopResult<CartView> {
        let order = self.pending_cart(cart_id).await?;
        let currency = order.currency().unwrap_or(FALLBACK_CURRENCY);
        Ok(CartView { order, currency })
    }

    /// Attach a percentage discount to an order.
    #[instrument(skip(self))]
    pub async fn apply_discount(&self, order_id: OrderId, rate: Decimal) -> ShopResult<Order> {
        let order = self.store.add_discount(order_id, rate).await?;
        info!(order_id, %rate, total = %order.total_price, "Applied discount");
        Ok(order)
    }

    /// Attach a percentage tax to an order.
    #[instrument(skip(self))]
    pub async fn apply_tax(&self, order_id: OrderId, rate: Decimal) -> ShopResult<Order> {
        let order = self.store.add_tax(order_id, rate).await?;
        info!(order_id, %rate, total = %order.total_price, "Applied tax");
        Ok(order)
    }
}
