//! Shared vocabulary for the order fulfillment core.
//!
//! Every entity in the fulfillment graph is keyed by a typed surrogate
//! identifier and refers to other entities through explicit foreign-key
//! fields. The identifiers, the money representation and the persisted
//! status enums live here so the store, domain and API crates agree on them.

mod ids;
mod money;
mod status;

pub use ids::{
    AddressId, CartId, CartItemId, OrderId, OrderItemId, PaymentId, ProductId, PromoId, SlotId,
    TrackingEventId, TrackingId, UserId,
};
pub use money::{DiscountPercent, InvalidDiscount, Money};
pub use status::{OrderItemStatus, ParseStatusError, PaymentMode, PaymentStatus};
