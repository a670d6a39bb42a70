//! # Checkout
//!
//! Builds payment-provider requests from priced items and orders, and runs
//! them through a [`PaymentGateway`].
//!
//! Two payment shapes are supported:
//!
//! - **Direct intent**: one amount for a single item or a whole order. The
//!   provider sees no breakdown.
//! - **Itemized session**: one hosted-checkout line per order line, followed
//!   by a negative `Discount` line and a `Tax` line when those are non-zero.
//!   The session charges exactly the order's stored total.

use crate::error::{ShopError, ShopResult};
use crate::gateway::{
    CheckoutMode, CheckoutSession, CheckoutUrls, FutureUsage, IntentRequest, PaymentIntent,
    SessionLineItem, SessionRequest, SharedGateway,
};
use crate::item::{Item, ItemId};
use crate::order::{Order, OrderId};
use crate::pricing::PricingBreakdown;
use crate::store::{SharedStore, Store};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{error, info, instrument};
use uuid::Uuid;

pub const DISCOUNT_LINE_NAME: &str = "Discount";
pub const TAX_LINE_NAME: &str = "Tax";

fn new_idempotency_key() -> String {
    Uuid::new_v4().to_string()
}

/// Intent for one unit of an item.
///
/// With `retain_card` the provider keeps the payment method for later
/// off-session charges.
pub fn item_intent(item: &Item, retain_card: bool) -> ShopResult<IntentRequest> {
    Ok(IntentRequest {
        amount: item.price_in_minor_units()?,
        currency: item.currency,
        metadata: BTreeMap::from([("item_id".to_string(), item.id.to_string())]),
        setup_future_usage: retain_card.then_some(FutureUsage::OffSession),
        idempotency_key: new_idempotency_key(),
    })
}

/// Intent for a whole order, from its stored (already refreshed) total.
///
/// The payment method is always retained for off-session use.
pub fn order_intent(order: &Order) -> ShopResult<IntentRequest> {
    let currency = order
        .currency()
        .ok_or(ShopError::EmptyOrder { order_id: order.id })?;

    Ok(IntentRequest {
        amount: order.total_in_minor_units()?,
        currency,
        metadata: BTreeMap::from([("order_id".to_string(), order.id.to_string())]),
        setup_future_usage: Some(FutureUsage::OffSession),
        idempotency_key: new_idempotency_key(),
    })
}

/// Hosted-checkout line items for an order.
///
/// The lines always add up to `order.total_in_minor_units()`. The discount
/// and tax lines come from `breakdown`, truncated to minor units; the cent
/// lost to rounding the total is carried by the tax line when there is one,
/// otherwise by the discount line.
pub fn session_line_items(
    order: &Order,
    breakdown: &PricingBreakdown,
) -> ShopResult<Vec<SessionLineItem>> {
    let currency = order
        .currency()
        .ok_or(ShopError::EmptyOrder { order_id: order.id })?;

    let mut line_items = order
        .lines
        .iter()
        .map(|line| {
            Ok(SessionLineItem {
                name: line.item.name.clone(),
                unit_amount: currency.to_minor_units(line.item.price)?,
                currency,
                quantity: line.quantity,
            })
        })
        .collect::<ShopResult<Vec<_>>>()?;

    let items_minor = line_items
        .iter()
        .try_fold(0_i64, |sum, line| {
            line.unit_amount
                .checked_mul(i64::from(line.quantity))
                .and_then(|cost| sum.checked_add(cost))
        })
        .ok_or_else(|| ShopError::InvalidAmount {
            message: format!("order {} does not fit in minor units", order.id),
        })?;

    let mut discount_minor = currency.to_minor_units(breakdown.discounts_amount)?;
    let mut tax_minor = currency.to_minor_units(breakdown.taxes_amount)?;
    let charged = items_minor - discount_minor + tax_minor;
    let remainder = order.total_in_minor_units()? - charged;

    if breakdown.taxes_amount > Decimal::ZERO && tax_minor + remainder > 0 {
        tax_minor += remainder;
    } else {
        discount_minor -= remainder;
    }

    if discount_minor != 0 {
        line_items.push(SessionLineItem {
            name: DISCOUNT_LINE_NAME.to_string(),
            unit_amount: -discount_minor,
            currency,
            quantity: 1,
        });
    }

    if tax_minor != 0 {
        line_items.push(SessionLineItem {
            name: TAX_LINE_NAME.to_string(),
            unit_amount: tax_minor,
            currency,
            quantity: 1,
        });
    }

    Ok(line_items)
}

/// Full hosted-checkout request for an order
pub fn session_request(
    order: &Order,
    breakdown: &PricingBreakdown,
    urls: &CheckoutUrls,
) -> ShopResult<SessionRequest> {
    let line_items = session_line_items(order, breakdown)?;
    let currency = order
        .currency()
        .ok_or(ShopError::EmptyOrder { order_id: order.id })?;

    Ok(SessionRequest {
        line_items,
        currency,
        payment_method_types: vec!["card".to_string()],
        mode: CheckoutMode::Payment,
        success_url: urls.success_url(),
        cancel_url: urls.cancel_url(),
        metadata: BTreeMap::from([("order_id".to_string(), order.id.to_string())]),
        idempotency_key: new_idempotency_key(),
    })
}

/// Checkout operations over a store and a payment gateway
#[derive(Clone)]
pub struct CheckoutService {
    store: SharedStore,
    gateway: SharedGateway,
    urls: CheckoutUrls,
}

impl CheckoutService {
    pub fn new(store: SharedStore, gateway: SharedGateway, urls: CheckoutUrls) -> Self {
        Self {
            store,
            gateway,
            urls,
        }
    }

    /// Create a payment intent for one unit of an item.
    #[instrument(skip(self))]
    pub async fn item_intent(&self, item_id: ItemId, retain_card: bool) -> ShopResult<PaymentIntent> {
        let item = self.store.item(item_id).await?;
        let request = item_intent(&item, retain_card)?;

        info!(
            item_id,
            amount = request.amount,
            currency = %request.currency,
            provider = self.gateway.provider_name(),
            "Creating payment intent for item"
        );

        self.gateway
            .create_payment_intent(&request)
            .await
            .inspect_err(|e| error!(item_id, "Failed to create payment intent: {}", e))
    }

    /// Create a payment intent for a whole order.
    ///
    /// The order total is recomputed and persisted first; it stays persisted
    /// even if the provider call fails.
    #[instrument(skip(self))]
    pub async fn order_intent(&self, order_id: OrderId) -> ShopResult<PaymentIntent> {
        let order = self.store.order(order_id).await?;
        if order.is_empty() {
            return Err(ShopError::EmptyOrder { order_id });
        }

        let (order, _) = self.store.recompute_total(order_id).await?;
        let request = order_intent(&order)?;

        info!(
            order_id,
            amount = request.amount,
            currency = %request.currency,
            provider = self.gateway.provider_name(),
            "Creating payment intent for order"
        );

        self.gateway
            .create_payment_intent(&request)
            .await
            .inspect_err(|e| error!(order_id, "Failed to create payment intent: {}", e))
    }

    /// Create an itemized hosted checkout session for an order.
    #[instrument(skip(self))]
    pub async fn order_session(&self, order_id: OrderId) -> ShopResult<CheckoutSession> {
        let (order, breakdown) = self.store.recompute_total(order_id).await?;
        if order.is_empty() {
            return Err(ShopError::EmptyOrder { order_id });
        }

        let request = session_request(&order, &breakdown, &self.urls)?;

        info!(
            order_id,
            lines = request.line_items.len(),
            total = %order.total_price,
            provider = self.gateway.provider_name(),
            "Creating checkout session"
        );

        let session = self
            .gateway
            .create_checkout_session(&request)
            .await
            .inspect_err(|e| error!(order_id, "Failed to create checkout session: {}", e))?;

        info!(order_id, session_id = %session.session_id, "Created checkout session");
        Ok(session)
    }
}
