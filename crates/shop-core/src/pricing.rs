//! # Pricing
//!
//! Order totals from lines, percentage discounts and percentage taxes.
//!
//! Every discount applies to the same pre-discount subtotal and every tax to
//! the same discounted subtotal; neither compounds.

use crate::error::{ShopError, ShopResult};
use crate::order::{Discount, OrderLine, Tax};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Result of pricing an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingBreakdown {
    /// Sum of `price × quantity` over all lines
    pub items_total: Decimal,
    /// Sum of every discount, each taken from `items_total`
    pub discounts_amount: Decimal,
    /// Sum of every tax, each taken from `items_total - discounts_amount`
    pub taxes_amount: Decimal,
    /// `items_total - discounts_amount + taxes_amount`
    pub total: Decimal,
}

impl PricingBreakdown {
    /// Price a set of lines with their discounts and taxes.
    ///
    /// Rates are not bounded, so every step is checked; a result outside the
    /// decimal range is `InvalidAmount`.
    pub fn compute(
        lines: &[OrderLine],
        discounts: &[Discount],
        taxes: &[Tax],
    ) -> ShopResult<Self> {
        let items_total = items_total(lines);

        let discounts_amount = discounts
            .iter()
            .try_fold(Decimal::ZERO, |sum, discount| {
                sum.checked_add(percent_of(items_total, discount.rate)?)
            })
            .ok_or_else(overflow)?;

        let taxable = items_total.checked_sub(discounts_amount).ok_or_else(overflow)?;
        let taxes_amount = taxes
            .iter()
            .try_fold(Decimal::ZERO, |sum, tax| sum.checked_add(percent_of(taxable, tax.rate)?))
            .ok_or_else(overflow)?;

        Ok(Self {
            items_total,
            discounts_amount,
            taxes_amount,
            total: taxable.checked_add(taxes_amount).ok_or_else(overflow)?,
        })
    }

    /// Subtotal after discounts, before taxes
    pub fn discounted_subtotal(&self) -> Decimal {
        self.items_total - self.discounts_amount
    }
}

fn percent_of(base: Decimal, rate: Decimal) -> Option<Decimal> {
    base.checked_mul(rate)?.checked_div(HUNDRED)
}

fn overflow() -> ShopError {
    ShopError::InvalidAmount {
        message: "order total is out of range".to_string(),
    }
}

/// Sum of line costs
pub fn items_total(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::cost).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Currency, Item};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(id: u64, price: &str, quantity: u32) -> OrderLine {
        OrderLine::new(
            Item {
                id,
                name: format!("Item {}", id),
                description: String::new(),
                price: dec(price),
                currency: Currency::USD,
            },
            quantity,
        )
    }

    fn discount(rate: &str) -> Discount {
        Discount {
            id: 0,
            order_id: 1,
            rate: dec(rate),
        }
    }

    fn tax(rate: &str) -> Tax {
        Tax {
            id: 0,
            order_id: 1,
            rate: dec(rate),
        }
    }

    #[test]
    fn test_empty_order_is_zero() {
        let breakdown = PricingBreakdown::compute(&[], &[discount("10")], &[tax("5")]).unwrap();
        assert_eq!(breakdown, PricingBreakdown::default());
    }

    #[test]
    fn test_no_adjustments_total_equals_items_total() {
        let lines = [line(1, "10.99", 2), line(2, "3.50", 3)];
        let breakdown = PricingBreakdown::compute(&lines, &[], &[]).unwrap();

        assert_eq!(breakdown.items_total, dec("32.48"));
        assert_eq!(breakdown.total, breakdown.items_total);
    }

    #[test]
    fn test_single_discount() {
        let lines = [line(1, "40.00", 1)];
        let breakdown = PricingBreakdown::compute(&lines, &[discount("25")], &[]).unwrap();

        assert_eq!(breakdown.discounts_amount, dec("10"));
        assert_eq!(breakdown.total, dec("40.00") * (Decimal::ONE - dec("25") / HUNDRED));
    }

    #[test]
    fn test_single_tax() {
        let lines = [line(1, "40.00", 1)];
        let breakdown = PricingBreakdown::compute(&lines, &[], &[tax("8")]).unwrap();

        assert_eq!(breakdown.taxes_amount, dec("3.2"));
        assert_eq!(breakdown.total, dec("40.00") * (Decimal::ONE + dec("8") / HUNDRED));
    }

    #[test]
    fn test_discounts_are_additive_not_compounding() {
        let lines = [line(1, "100", 1)];
        let breakdown =
            PricingBreakdown::compute(&lines, &[discount("10"), discount("20")], &[]).unwrap();

        // 10% + 20% of 100, not 100 * 0.9 * 0.8
        assert_eq!(breakdown.discounts_amount, dec("30"));
        assert_eq!(breakdown.total, dec("70"));
    }

    #[test]
    fn test_taxes_share_the_discounted_base() {
        let lines = [line(1, "100", 1)];
        let breakdown =
            PricingBreakdown::compute(&lines, &[discount("50")], &[tax("10"), tax("5")]).unwrap();

        assert_eq!(breakdown.discounted_subtotal(), dec("50"));
        assert_eq!(breakdown.taxes_amount, dec("7.5"));
        assert_eq!(breakdown.total, dec("57.5"));
    }

    #[test]
    fn test_zero_rates_contribute_nothing() {
        let lines = [line(1, "12.34", 1)];
        let breakdown = PricingBreakdown::compute(&lines, &[discount("0")], &[tax("0")]).unwrap();
        assert_eq!(breakdown.total, dec("12.34"));
    }

    #[test]
    fn test_discount_then_tax_scenario() {
        let lines = [line(1, "10.99", 2)];

        let discounted = PricingBreakdown::compute(&lines, &[discount("10")], &[]).unwrap();
        assert_eq!(discounted.items_total, dec("21.98"));
        assert_eq!(discounted.total, dec("19.782"));

        let taxed = PricingBreakdown::compute(&lines, &[discount("10")], &[tax("5")]).unwrap();
        assert_eq!(taxed.total, dec("19.782") + dec("19.782") * dec("0.05"));
        assert_eq!(taxed.total, dec("20.7711"));
    }

    #[test]
    fn test_huge_rate_is_an_error() {
        let lines = [line(1, "99999999.99", 1000)];

        let err = PricingBreakdown::compute(&lines, &[discount("1000000000000000000000")], &[]).unwrap_err();
        assert!(matches!(err, ShopError::InvalidAmount { .. }));

        let err = PricingBreakdown::compute(&lines, &[], &[tax("1000000000000000000000")]).unwrap_err();
        assert!(matches!(err, ShopError::InvalidAmount { .. }));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let lines = [line(1, "7.77", 3)];
        let discounts = [discount("15")];
        let taxes = [tax("19")];

        let first = PricingBreakdown::compute(&lines, &discounts, &taxes).unwrap();
        let second = PricingBreakdown::compute(&lines, &discounts, &taxes).unwrap();
        assert_eq!(first, second);
    }
}
