use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AddressId, CartId, CartItemId, Money, OrderId, OrderItemId, OrderItemStatus, PaymentId,
    ProductId, PromoId, SlotId, TrackingId, UserId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::records::{
    AddressRecord, CartItemRecord, CartRecord, OrderItemRecord, OrderItemView, OrderRecord,
    PaymentRecord, ProductRecord, PromoRecord, SlotRecord, TrackingEventRecord, TrackingRecord,
};
use crate::store::{CartLine, Store, StoreTx, TrackingEventStream};
use crate::{Result, StoreError};

/// A transactional write that can be made to fail on purpose.
///
/// Used by tests to prove that a failure at any step leaves no trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    InsertPayment,
    InsertOrder,
    InsertOrderItem,
    InsertTrackingRecord,
    AppendTrackingEvent,
    DecrementInventory,
    DeleteCart,
    UpdateTrackingStage,
    UpdateOrderItemStatus,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    products: HashMap<ProductId, ProductRecord>,
    slots: HashMap<SlotId, SlotRecord>,
    addresses: HashMap<AddressId, AddressRecord>,
    promos: HashMap<PromoId, PromoRecord>,
    carts: HashMap<CartId, CartRecord>,
    cart_items: Vec<CartItemRecord>,
    payments: HashMap<PaymentId, PaymentRecord>,
    orders: Vec<OrderRecord>,
    order_items: Vec<OrderItemRecord>,
    tracking: Vec<TrackingRecord>,
    tracking_events: Vec<TrackingEventRecord>,
}

impl Tables {
    fn order_item_views<F>(&self, status: OrderItemStatus, mut keep: F) -> Vec<OrderItemView>
    where
        F: FnMut(&OrderRecord, &ProductRecord) -> bool,
    {
        self.order_items
            .iter()
            .filter(|item| item.status == status)
            .filter_map(|item| {
                let order = self.orders.iter().find(|o| o.id == item.order_id)?;
                let product = self.products.get(&item.product_id)?;
                keep(order, product).then(|| OrderItemView {
                    order_item_id: item.id,
                    order_id: item.order_id,
                    product_id: item.product_id,
                    product_name: product.name.clone(),
                    image_key: product.image_key.clone(),
                    size: item.size,
                    quantity: item.quantity,
                    amount: item.amount,
                    status: item.status,
                    ordered_at: item.created_at,
                })
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    faults: HashSet<FaultPoint>,
}

/// In-memory order store implementation for testing.
///
/// A transaction holds the store-wide lock from `begin` until it is
/// committed or dropped and writes to a private copy of the tables, so
/// transactions are fully serialized and uncommitted writes are invisible.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every future transactional write at `point` fail.
    pub async fn inject_fault(&self, point: FaultPoint) {
        self.state.lock().await.faults.insert(point);
    }

    /// Removes all injected faults.
    pub async fn clear_faults(&self) {
        self.state.lock().await.faults.clear();
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.tables.orders.len()
    }

    /// Returns the number of payment records stored.
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.tables.payments.len()
    }

    /// Returns the number of order items stored.
    pub async fn order_item_count(&self) -> usize {
        self.state.lock().await.tables.order_items.len()
    }

    /// Returns the number of tracking events stored across all records.
    pub async fn tracking_event_count(&self) -> usize {
        self.state.lock().await.tables.tracking_events.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.tables.clone();
        Ok(InMemoryTx { guard, staged })
    }

    async fn put_product(&self, product: ProductRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.products.insert(product.id, product);
        Ok(())
    }

    async fn put_slot(&self, slot: SlotRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.slots.insert(slot.id, slot);
        Ok(())
    }

    async fn put_address(&self, address: AddressRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.addresses.insert(address.id, address);
        Ok(())
    }

    async fn put_promo(&self, promo: PromoRecord) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.promos.insert(promo.id, promo);
        Ok(())
    }

    async fn product(&self, product_id: ProductId) -> Result<Option<ProductRecord>> {
        let state = self.state.lock().await;
        Ok(state.tables.products.get(&product_id).cloned())
    }

    async fn slot(&self, slot_id: SlotId) -> Result<Option<SlotRecord>> {
        let state = self.state.lock().await;
        Ok(state.tables.slots.get(&slot_id).cloned())
    }

    async fn find_slot(&self, product_id: ProductId, size: f64) -> Result<Option<SlotRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .slots
            .values()
            .find(|s| s.product_id == product_id && s.size == size)
            .cloned())
    }

    async fn cart_for_buyer(&self, buyer_id: UserId) -> Result<Option<CartRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .carts
            .values()
            .find(|c| c.buyer_id == buyer_id)
            .cloned())
    }

    async fn cart_items(&self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn add_cart_line(&self, buyer_id: UserId, line: CartLine) -> Result<CartRecord> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;
        let now = Utc::now();

        let existing = tables
            .carts
            .values()
            .find(|c| c.buyer_id == buyer_id)
            .map(|c| c.id);
        let cart_id = match existing {
            Some(id) => id,
            None => {
                let cart = CartRecord {
                    id: CartId::new(),
                    buyer_id,
                    total: Money::zero(),
                    created_at: now,
                    updated_at: now,
                };
                let id = cart.id;
                tables.carts.insert(id, cart);
                id
            }
        };

        tables.cart_items.push(CartItemRecord {
            id: CartItemId::new(),
            cart_id,
            product_id: line.product_id,
            slot_id: line.slot_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            created_at: now,
        });

        let total: Money = tables
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .map(|i| i.unit_price.multiply(i.quantity))
            .sum();

        let cart = tables
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| StoreError::not_found("cart", cart_id))?;
        cart.total = total;
        cart.updated_at = now;
        Ok(cart.clone())
    }

    async fn count_orders_for_buyer(&self, buyer_id: UserId) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .orders
            .iter()
            .filter(|o| o.buyer_id == buyer_id)
            .count() as u64)
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItemRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn order_item(&self, order_item_id: OrderItemId) -> Result<Option<OrderItemRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .order_items
            .iter()
            .find(|i| i.id == order_item_id)
            .cloned())
    }

    async fn payment(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>> {
        let state = self.state.lock().await;
        Ok(state.tables.payments.get(&payment_id).cloned())
    }

    async fn buyer_order_items(
        &self,
        buyer_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderItemView>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .order_item_views(status, |order, _| order.buyer_id == buyer_id))
    }

    async fn merchant_order_items(
        &self,
        merchant_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderItemView>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .order_item_views(status, |_, product| product.merchant_id == merchant_id))
    }

    async fn order_item_merchant(&self, order_item_id: OrderItemId) -> Result<Option<UserId>> {
        let state = self.state.lock().await;
        let tables = &state.tables;
        Ok(tables
            .order_items
            .iter()
            .find(|i| i.id == order_item_id)
            .and_then(|item| tables.products.get(&item.product_id))
            .map(|product| product.merchant_id))
    }

    async fn tracking_record(
        &self,
        order_item_id: OrderItemId,
    ) -> Result<Option<TrackingRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .tracking
            .iter()
            .find(|t| t.order_item_id == order_item_id)
            .cloned())
    }

    async fn stream_tracking_events(
        &self,
        order_item_id: OrderItemId,
    ) -> Result<TrackingEventStream> {
        use futures_util::stream;

        let state = self.state.lock().await;
        let tracking_id = state
            .tables
            .tracking
            .iter()
            .find(|t| t.order_item_id == order_item_id)
            .map(|t| t.id)
            .ok_or_else(|| StoreError::not_found("tracking record", order_item_id))?;

        let mut events: Vec<_> = state
            .tables
            .tracking_events
            .iter()
            .filter(|e| e.tracking_id == tracking_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.stage.cmp(&b.stage).then(a.created_at.cmp(&b.created_at)));

        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}

/// Transaction handle of [`InMemoryStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: Tables,
}

impl std::fmt::Debug for InMemoryTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTx").finish_non_exhaustive()
    }
}

impl InMemoryTx {
    fn check(&self, point: FaultPoint) -> Result<()> {
        if self.guard.faults.contains(&point) {
            tracing::debug!(?point, "injected fault triggered");
            return Err(StoreError::Unavailable(format!(
                "injected fault at {point:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn lock_cart(&mut self, cart_id: CartId) -> Result<Option<CartRecord>> {
        Ok(self.staged.carts.get(&cart_id).cloned())
    }

    async fn cart_items(&mut self, cart_id: CartId) -> Result<Vec<CartItemRecord>> {
        Ok(self
            .staged
            .cart_items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn address(&mut self, address_id: AddressId) -> Result<Option<AddressRecord>> {
        Ok(self.staged.addresses.get(&address_id).cloned())
    }

    async fn promo(&mut self, promo_id: PromoId) -> Result<Option<PromoRecord>> {
        Ok(self.staged.promos.get(&promo_id).cloned())
    }

    async fn slot(&mut self, slot_id: SlotId) -> Result<Option<SlotRecord>> {
        Ok(self.staged.slots.get(&slot_id).cloned())
    }

    async fn insert_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        self.check(FaultPoint::InsertPayment)?;
        self.staged.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        self.check(FaultPoint::InsertOrder)?;
        if !self.staged.payments.contains_key(&order.payment_id) {
            return Err(StoreError::not_found("payment", order.payment_id));
        }
        self.staged.orders.push(order.clone());
        Ok(())
    }

    async fn insert_order_item(&mut self, item: &OrderItemRecord) -> Result<()> {
        self.check(FaultPoint::InsertOrderItem)?;
        if !self.staged.orders.iter().any(|o| o.id == item.order_id) {
            return Err(StoreError::not_found("order", item.order_id));
        }
        self.staged.order_items.push(item.clone());
        Ok(())
    }

    async fn insert_tracking_record(&mut self, record: &TrackingRecord) -> Result<()> {
        self.check(FaultPoint::InsertTrackingRecord)?;
        self.staged.tracking.push(record.clone());
        Ok(())
    }

    async fn append_tracking_event(&mut self, event: &TrackingEventRecord) -> Result<()> {
        self.check(FaultPoint::AppendTrackingEvent)?;
        if !self.staged.tracking.iter().any(|t| t.id == event.tracking_id) {
            return Err(StoreError::not_found("tracking record", event.tracking_id));
        }
        self.staged.tracking_events.push(event.clone());
        Ok(())
    }

    async fn decrement_inventory(&mut self, slot_id: SlotId, quantity: u32) -> Result<u32> {
        self.check(FaultPoint::DecrementInventory)?;
        let slot = self
            .staged
            .slots
            .get_mut(&slot_id)
            .ok_or_else(|| StoreError::not_found("inventory slot", slot_id))?;

        let remaining =
            slot.quantity
                .checked_sub(quantity)
                .ok_or(StoreError::InsufficientInventory {
                    slot_id,
                    requested: quantity,
                    available: slot.quantity,
                })?;
        slot.quantity = remaining;
        Ok(remaining)
    }

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<()> {
        self.check(FaultPoint::DeleteCart)?;
        self.staged.cart_items.retain(|i| i.cart_id != cart_id);
        self.staged
            .carts
            .remove(&cart_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("cart", cart_id))
    }

    async fn lock_tracking_record(
        &mut self,
        order_item_id: OrderItemId,
    ) -> Result<Option<TrackingRecord>> {
        Ok(self
            .staged
            .tracking
            .iter()
            .find(|t| t.order_item_id == order_item_id)
            .cloned())
    }

    async fn update_tracking_stage(
        &mut self,
        tracking_id: TrackingId,
        stage: i16,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check(FaultPoint::UpdateTrackingStage)?;
        let record = self
            .staged
            .tracking
            .iter_mut()
            .find(|t| t.id == tracking_id)
            .ok_or_else(|| StoreError::not_found("tracking record", tracking_id))?;
        record.stage = stage;
        record.updated_at = at;
        Ok(())
    }

    async fn update_order_item_status(
        &mut self,
        order_item_id: OrderItemId,
        status: OrderItemStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check(FaultPoint::UpdateOrderItemStatus)?;
        let item = self
            .staged
            .order_items
            .iter_mut()
            .find(|i| i.id == order_item_id)
            .ok_or_else(|| StoreError::not_found("order item", order_item_id))?;
        item.status = status;
        item.updated_at = at;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTx { mut guard, staged } = self;
        guard.tables = staged;
        Ok(())
    }
}
