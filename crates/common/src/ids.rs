use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed surrogate identifier.
///
/// Each entity gets its own type so an order id can never be passed where
/// a cart id is expected.
macro_rules! surrogate_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

surrogate_id!(
    /// A platform user. Buyers and merchants share the same identity space.
    UserId
);
surrogate_id!(
    /// A catalog product.
    ProductId
);
surrogate_id!(
    /// An inventory slot, the orderable (product, size) unit of stock.
    SlotId
);
surrogate_id!(
    /// A buyer's shopping cart.
    CartId
);
surrogate_id!(
    /// One line of a shopping cart.
    CartItemId
);
surrogate_id!(
    /// A buyer's shipping address.
    AddressId
);
surrogate_id!(
    /// A promo code.
    PromoId
);
surrogate_id!(
    /// A payment record.
    PaymentId
);
surrogate_id!(
    /// A placed order.
    OrderId
);
surrogate_id!(
    /// One line of a placed order.
    OrderItemId
);
surrogate_id!(
    /// The tracking record of an order item.
    TrackingId
);
surrogate_id!(
    /// One entry in a tracking record's history.
    TrackingEventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_unique_ids() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = CartId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert_eq!(Uuid::from(id), uuid);
    }

    #[test]
    fn parses_from_display_form() {
        let id = OrderItemId::new();
        let parsed: OrderItemId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn serializes_transparently() {
        let id = PromoId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
