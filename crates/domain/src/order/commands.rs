//! Order placement command and its outcome.

use common::{AddressId, CartId, OrderId, PaymentMode, PromoId, UserId};

use crate::error::{FulfillmentError, Result};

/// Command to convert a buyer's cart into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceOrder {
    /// The buyer placing the order.
    pub buyer_id: UserId,

    /// Shipping address; must belong to the buyer.
    pub address_id: AddressId,

    /// The cart being checked out; must belong to the buyer.
    pub cart_id: CartId,

    /// Optional promo code applied to every line.
    pub promo_id: Option<PromoId>,

    pub payment_mode: PaymentMode,

    /// Gateway transaction id. Required unless paying cash on delivery.
    pub transaction_id: Option<String>,
}

impl PlaceOrder {
    /// Creates a new PlaceOrder command without promo or transaction id.
    pub fn new(
        buyer_id: UserId,
        address_id: AddressId,
        cart_id: CartId,
        payment_mode: PaymentMode,
    ) -> Self {
        Self {
            buyer_id,
            address_id,
            cart_id,
            promo_id: None,
            payment_mode,
            transaction_id: None,
        }
    }

    pub fn with_promo(mut self, promo_id: PromoId) -> Self {
        self.promo_id = Some(promo_id);
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    /// Checks the command on its own, before any store access.
    pub fn validate(&self) -> Result<()> {
        match (&self.transaction_id, self.payment_mode) {
            (Some(id), _) if id.trim().is_empty() => Err(FulfillmentError::invalid_input(
                "transaction id must not be blank",
            )),
            (None, PaymentMode::Prepaid) => Err(FulfillmentError::invalid_input(
                "prepaid orders require a transaction id",
            )),
            _ => Ok(()),
        }
    }
}

/// Result of a well-formed placement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// The order was written.
    Placed { order_id: OrderId },

    /// A business policy declined the request. Nothing was written.
    Rejected { reason: String },
}

impl PlacementOutcome {
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            PlacementOutcome::Placed { order_id } => Some(*order_id),
            PlacementOutcome::Rejected { .. } => None,
        }
    }

    pub fn is_placed(&self) -> bool {
        matches!(self, PlacementOutcome::Placed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(mode: PaymentMode) -> PlaceOrder {
        PlaceOrder::new(UserId::new(), AddressId::new(), CartId::new(), mode)
    }

    #[test]
    fn cod_needs_no_transaction_id() {
        assert!(command(PaymentMode::CashOnDelivery).validate().is_ok());
    }

    #[test]
    fn prepaid_needs_transaction_id() {
        let err = command(PaymentMode::Prepaid).validate().unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidInput(_)));

        assert!(
            command(PaymentMode::Prepaid)
                .with_transaction_id("pi_3Nx")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn blank_transaction_id_is_rejected() {
        for mode in [PaymentMode::Prepaid, PaymentMode::CashOnDelivery] {
            let err = command(mode)
                .with_transaction_id("   ")
                .validate()
                .unwrap_err();
            assert!(matches!(err, FulfillmentError::InvalidInput(_)));
        }
    }

    #[test]
    fn outcome_exposes_order_id_only_when_placed() {
        let order_id = OrderId::new();
        assert_eq!(
            PlacementOutcome::Placed { order_id }.order_id(),
            Some(order_id)
        );
        let rejected = PlacementOutcome::Rejected {
            reason: "no".to_string(),
        };
        assert_eq!(rejected.order_id(), None);
        assert!(!rejected.is_placed());
    }
}
