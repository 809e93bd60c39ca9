//! Row types for every table the fulfillment core touches.
//!
//! Rows reference each other through id fields only; joins are done by the
//! store, never by holding one record inside another.

use chrono::{DateTime, Utc};
use common::{
    AddressId, CartId, CartItemId, DiscountPercent, Money, OrderId, OrderItemId, OrderItemStatus,
    PaymentId, PaymentMode, PaymentStatus, ProductId, PromoId, SlotId, TrackingEventId,
    TrackingId, UserId,
};
use serde::{Deserialize, Serialize};

/// Catalog product, owned by one merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub merchant_id: UserId,
    pub name: String,
    pub price: Money,
    /// Merchant-set discount currently in effect, if any.
    pub discount: Option<DiscountPercent>,
    /// Object-storage key of the primary product image.
    pub image_key: Option<String>,
}

/// Stock for one (product, size) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub id: SlotId,
    pub product_id: ProductId,
    pub size: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub id: AddressId,
    pub buyer_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoRecord {
    pub id: PromoId,
    pub code: String,
    pub discount: DiscountPercent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    pub id: CartId,
    pub buyer_id: UserId,
    /// Running total of `unit_price * quantity` over the cart's items.
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRecord {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub slot_id: SlotId,
    pub quantity: u32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub amount: Money,
    pub mode: PaymentMode,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub buyer_id: UserId,
    pub payment_id: PaymentId,
    pub address_id: AddressId,
    pub promo_id: Option<PromoId>,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub size: f64,
    pub quantity: u32,
    /// Charged price frozen at placement time.
    pub amount: Money,
    pub status: OrderItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub id: TrackingId,
    pub order_item_id: OrderItemId,
    /// Raw stage number, 0..=3.
    pub stage: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only history entry of a tracking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEventRecord {
    pub id: TrackingEventId,
    pub tracking_id: TrackingId,
    pub stage: i16,
    pub title: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// An order item joined with its product, as shown in order listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub order_item_id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_key: Option<String>,
    pub size: f64,
    pub quantity: u32,
    pub amount: Money,
    pub status: OrderItemStatus,
    pub ordered_at: DateTime<Utc>,
}
