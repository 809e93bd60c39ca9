use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AddressId, CartId, Money, OrderId, OrderItemId, OrderItemStatus, PaymentId, ProductId,
    PromoId, SlotId, TrackingId, UserId,
};
use futures_core::Stream;

use crate::Result;
use crate::records::{
    AddressRecord, CartItemRecord, CartRecord, OrderItemRecord, OrderItemView, OrderRecord,
    PaymentRecord, ProductRecord, PromoRecord, SlotRecord, TrackingEventRecord, TrackingRecord,
};

/// A stream of tracking events, oldest first.
pub type TrackingEventStream = Pin<Box<dyn Stream<Item = Result<TrackingEventRecord>> + Send>>;

/// A line to append to a buyer's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub slot_id: SlotId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Core trait for order store implementations.
///
/// Plain reads run outside any transaction. Multi-row writes that must be
/// all-or-nothing go through [`Store::begin`] and the returned [`StoreTx`].
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction handle produced by [`Store::begin`].
    type Tx: StoreTx;

    /// Opens a transaction. Dropping the handle without calling
    /// [`StoreTx::commit`] rolls every write back.
    async fn begin(&self) -> Result<Self::Tx>;

    // Reference data maintained by the surrounding catalog, address book and
    // promo services. The core only reads these rows.

    /// Inserts or replaces a product.
    async fn put_product(&self, product: ProductRecord) -> Result<()>;

    /// Inserts or replaces an inventory slot.
    async fn put_slot(&self, slot: SlotRecord) -> Result<()>;

    /// Inserts or replaces a shipping address.
    async fn put_address(&self, address: AddressRecord) -> Result<()>;

    /// Inserts or replaces a promo code.
    async fn put_promo(&self, promo: PromoRecord) -> Result<()>;

    async fn product(&self, product_id: ProductId) -> Result<Option<ProductRecord>>;

    async fn slot(&self, slot_id: SlotId) -> Result<Option<SlotRecord>>;

    /// Looks up the slot holding stock for a (product, size) pair.
    async fn find_slot(&self, product_id: ProductId, size: f64) -> Result<Option<SlotRecord>>;

    /// Returns the buyer's open cart, if any.
    async fn cart_for_buyer(&self, buyer_id: UserId) -> Result<Option<CartRecord>>;

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>>;

    /// Appends a line to the buyer's cart, creating the cart on first use,
    /// and recomputes the running total. Returns the updated cart.
    async fn add_cart_line(&self, buyer_id: UserId, line: CartLine) -> Result<CartRecord>;

    /// Counts every order the buyer has ever placed.
    async fn count_orders_for_buyer(&self, buyer_id: UserId) -> Result<u64>;

    async fn order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Returns the items of an order in insertion order.
    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>>;

    async fn order_item(&self, order_item_id: OrderItemId) -> Result<Option<OrderItemRecord>>;

    async fn payment(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>>;

    /// Order items with the given status from the buyer's own orders.
    async fn buyer_order_items(
        &self,
        buyer_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderItemView>>;

    /// Order items with the given status for products the merchant owns.
    async fn merchant_order_items(
        &self,
        merchant_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderItemView>>;

    /// Returns the merchant owning the product of an order item.
    async fn order_item_merchant(&self, order_item_id: OrderItemId) -> Result<Option<UserId>>;

    async fn tracking_record(
        &self,
        order_item_id: OrderItemId,
    ) -> Result<Option<TrackingRecord>>;

    /// Streams the tracking history of an order item, oldest first.
    ///
    /// Fails with `NotFound` when the item has no tracking record. The
    /// returned stream is finite; calling again restarts from the beginning.
    async fn stream_tracking_events(
        &self,
        order_item_id: OrderItemId,
    ) -> Result<TrackingEventStream>;
}

/// An open store transaction.
///
/// Every write is staged until [`StoreTx::commit`]; dropping the handle
/// discards them.
#[async_trait]
pub trait StoreTx: Send {
    /// Reads a cart and locks it against concurrent checkout.
    async fn lock_cart(&mut self, cart_id: CartId) -> Result<Option<CartRecord>>;

    async fn cart_items(&mut self, cart_id: CartId) -> Result<Vec<CartItemRecord>>;

    async fn address(&mut self, address_id: AddressId) -> Result<Option<AddressRecord>>;

    async fn promo(&mut self, promo_id: PromoId) -> Result<Option<PromoRecord>>;

    async fn slot(&mut self, slot_id: SlotId) -> Result<Option<SlotRecord>>;

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()>;

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()>;

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()>;

    async fn insert_tracking_record(&mut self, record: &TrackingRecord) -> Result<()>;

    async fn append_tracking_event(&mut self, event: &TrackingEventRecord) -> Result<()>;

    /// Atomically removes `quantity` units from a slot and returns what is
    /// left. Fails with `InsufficientInventory` instead of going negative;
    /// concurrent decrements of the same slot are serialized.
    async fn decrement_inventory(&mut self, slot_id: SlotId, quantity: u32) -> Result<u32>;

    /// Deletes every item of the cart, then the cart itself.
    async fn delete_cart(&mut self, cart_id: CartId) -> Result<()>;

    /// Reads an order item's tracking record and locks it for update.
    async fn lock_tracking_record(
        &mut self,
        order_item_id: OrderItemId,
    ) -> Result<Option<TrackingRecord>>;

    async fn update_tracking_stage(
        &mut self,
        tracking_id: TrackingId,
        stage: i16,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn update_order_item_status(
        &mut self,
        order_item_id: OrderItemId,
        status: OrderItemStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Makes every staged write visible at once.
    async fn commit(self) -> Result<()>;
}
