//! Price resolution.
//!
//! Prices are resolved exactly once: the unit price when a line enters the
//! cart, the charged price when the cart becomes an order. Both are stored
//! and never recomputed, so later catalog or promo changes do not touch
//! existing orders.

use common::{DiscountPercent, Money};

/// Unit price a product is booked into a cart at: the catalog price less
/// the product's active discount, if any.
pub fn catalog_unit_price(price: Money, active_discount: Option<DiscountPercent>) -> Money {
    match active_discount {
        Some(discount) => discount.apply(price),
        None => price,
    }
}

/// The promo context of one order, used to freeze each line's charged price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PricingSnapshot {
    promo: Option<DiscountPercent>,
}

impl PricingSnapshot {
    /// Creates a snapshot for an order with an optional promo discount.
    pub fn new(promo: Option<DiscountPercent>) -> Self {
        Self { promo }
    }

    /// A snapshot that passes prices through unchanged.
    pub fn without_promo() -> Self {
        Self::default()
    }

    pub fn promo(&self) -> Option<DiscountPercent> {
        self.promo
    }

    /// Charged price of one line: `unit_price * quantity`, then the promo
    /// discount rounded half-up to the cent.
    pub fn charge(&self, unit_price: Money, quantity: u32) -> Money {
        let line = unit_price.multiply(quantity);
        match self.promo {
            Some(discount) => discount.apply(line),
            None => line,
        }
    }

    /// Sum of the charged prices of every line.
    pub fn total<I>(&self, lines: I) -> Money
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        lines
            .into_iter()
            .map(|(unit_price, quantity)| self.charge(unit_price, quantity))
            .sum()
    }
}
