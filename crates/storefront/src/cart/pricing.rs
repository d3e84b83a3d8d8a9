//! Cart pricing.
//!
//! Pure functions: no I/O, no clock, no randomness. The same inputs always
//! produce the same outputs, so breakdowns can be replayed in tests.

use envasado_core::{CartItem, round_money};
use rust_decimal::Decimal;

use crate::config::TaxRules;
use crate::models::Customer;

/// Price of `quantity_delta` units of `item` at its snapshot unit price.
///
/// Negative deltas give negative amounts (units leaving the cart).
#[must_use]
pub fn item_total_price_value(item: &CartItem, quantity_delta: i64) -> Decimal {
    item.unit_price * Decimal::from(quantity_delta)
}

/// Cart total split into net amount and VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartBreakdown {
    /// Total without VAT.
    pub subtotal: Decimal,
    /// VAT included in the total.
    pub tax: Decimal,
    /// Rate applied, e.g. `0.21`.
    pub tax_rate: Decimal,
    /// What the customer pays.
    pub total: Decimal,
}

/// Split a VAT-inclusive cart total for a customer.
///
/// Anonymous customers get the default rate. Customers in an exempt region
/// pay the net price only: VAT is removed from the total rather than shown
/// as zero on top of it.
#[must_use]
pub fn cart_breakdown(
    total_price: Decimal,
    customer: Option<&Customer>,
    rules: &TaxRules,
) -> CartBreakdown {
    let included_rate = rules.default_rate;
    let subtotal = round_money(total_price / (Decimal::ONE + included_rate));

    let region = customer.and_then(Customer::region);
    let tax_rate = rules.rate_for(region);
    if tax_rate.is_zero() {
        return CartBreakdown {
            subtotal,
            tax: Decimal::ZERO,
            tax_rate,
            total: subtotal,
        };
    }

    CartBreakdown {
        subtotal,
        tax: round_money(total_price) - subtotal,
        tax_rate,
        total: round_money(total_price),
    }
}
