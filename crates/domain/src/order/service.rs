//! Order service: atomic cart checkout and order listings.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, OrderItemId, OrderItemStatus, PaymentId, PaymentStatus, ProductId,
    TrackingId, UserId,
};
use order_store::{
    OrderItemRecord, OrderItemView, OrderRecord, PaymentRecord, Store, StoreTx, TrackingRecord,
};
use serde::Serialize;

use crate::collaborators::{DEFAULT_IMAGE_URL_TTL, ImageSigner};
use crate::eligibility::EligibilityGate;
use crate::error::{FulfillmentError, Result};
use crate::pricing::PricingSnapshot;
use crate::tracking::TrackingStage;

use super::{PlaceOrder, PlacementOutcome};

/// An order item as shown to the buyer or the merchant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderListing {
    pub order_item_id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub size: f64,
    pub quantity: u32,
    pub amount: Money,
    pub status: OrderItemStatus,
    pub ordered_at: DateTime<Utc>,
    /// Time-limited link to the product image, if the product has one.
    pub image_url: Option<String>,
}

/// Service for placing and listing orders.
pub struct OrderService<S: Store> {
    store: S,
    eligibility: EligibilityGate<S>,
    signer: Arc<dyn ImageSigner>,
    image_url_ttl: Duration,
}

impl<S: Store + Clone> OrderService<S> {
    /// Creates a new order service with the default COD threshold and image
    /// URL lifetime.
    pub fn new(store: S, signer: Arc<dyn ImageSigner>) -> Self {
        Self {
            eligibility: EligibilityGate::new(store.clone()),
            store,
            signer,
            image_url_ttl: DEFAULT_IMAGE_URL_TTL,
        }
    }

    /// Replaces the eligibility gate, e.g. to change the COD threshold.
    pub fn with_eligibility(mut self, eligibility: EligibilityGate<S>) -> Self {
        self.eligibility = eligibility;
        self
    }

    pub fn with_image_url_ttl(mut self, ttl: Duration) -> Self {
        self.image_url_ttl = ttl;
        self
    }

    pub fn eligibility(&self) -> &EligibilityGate<S> {
        &self.eligibility
    }

    /// Returns true if the buyer may pay cash on delivery.
    pub async fn is_cod_eligible(&self, buyer_id: UserId) -> Result<bool> {
        self.eligibility.is_cod_eligible(buyer_id).await
    }

    /// Converts the buyer's cart into an order.
    ///
    /// Payment, order, items, tracking records with their seed events, the
    /// inventory decrements and the cart deletion are written in one
    /// transaction. Any failure leaves the store untouched. A buyer who may
    /// not pay cash on delivery gets [`PlacementOutcome::Rejected`].
    #[tracing::instrument(
        skip(self, cmd),
        fields(buyer_id = %cmd.buyer_id, cart_id = %cmd.cart_id, payment_mode = %cmd.payment_mode)
    )]
    pub async fn create_order(&self, cmd: PlaceOrder) -> Result<PlacementOutcome> {
        let started = Instant::now();
        cmd.validate()?;

        if cmd.payment_mode.is_cash_on_delivery()
            && !self.eligibility.is_cod_eligible(cmd.buyer_id).await?
        {
            metrics::counter!("orders_rejected_total", "reason" => "cod_ineligible").increment(1);
            tracing::info!("cash on delivery declined by purchase history");
            return Ok(PlacementOutcome::Rejected {
                reason: format!(
                    "Cash on delivery requires more than {} prior orders",
                    self.eligibility.threshold()
                ),
            });
        }

        match self.place(&cmd).await {
            Ok(order_id) => {
                let duration = started.elapsed().as_secs_f64();
                metrics::counter!("orders_created_total").increment(1);
                metrics::histogram!("order_create_duration_seconds").record(duration);
                tracing::info!(%order_id, duration, "order placed");
                Ok(PlacementOutcome::Placed { order_id })
            }
            Err(err) => {
                if matches!(err, FulfillmentError::Conflict(_)) {
                    metrics::counter!("inventory_conflicts_total").increment(1);
                }
                tracing::warn!(error = %err, "order placement aborted");
                Err(err)
            }
        }
    }

    async fn place(&self, cmd: &PlaceOrder) -> Result<OrderId> {
        let mut tx = self.store.begin().await?;

        let address_owned = tx
            .address(cmd.address_id)
            .await?
            .is_some_and(|address| address.buyer_id == cmd.buyer_id);
        if !address_owned {
            return Err(FulfillmentError::not_found("address", cmd.address_id));
        }

        let cart = tx
            .lock_cart(cmd.cart_id)
            .await?
            .filter(|cart| cart.buyer_id == cmd.buyer_id)
            .ok_or_else(|| FulfillmentError::not_found("cart", cmd.cart_id))?;

        let promo = match cmd.promo_id {
            Some(promo_id) => Some(
                tx.promo(promo_id)
                    .await?
                    .ok_or_else(|| FulfillmentError::not_found("promo code", promo_id))?,
            ),
            None => None,
        };

        let lines = tx.cart_items(cart.id).await?;
        if lines.is_empty() {
            return Err(FulfillmentError::invalid_input("cart is empty"));
        }

        let pricing = PricingSnapshot::new(promo.map(|p| p.discount));
        let amount = pricing.total(lines.iter().map(|l| (l.unit_price, l.quantity)));
        let now = Utc::now();

        let payment = PaymentRecord {
            id: PaymentId::new(),
            amount,
            mode: cmd.payment_mode,
            status: PaymentStatus::initial_for(cmd.payment_mode),
            transaction_id: cmd.transaction_id.clone(),
            created_at: now,
        };
        tx.insert_payment(&payment).await?;

        let order = OrderRecord {
            id: OrderId::new(),
            buyer_id: cmd.buyer_id,
            payment_id: payment.id,
            address_id: cmd.address_id,
            promo_id: cmd.promo_id,
            amount,
            created_at: now,
            updated_at: now,
        };
        tx.insert_order(&order).await?;

        for line in &lines {
            let slot = tx
                .slot(line.slot_id)
                .await?
                .ok_or_else(|| FulfillmentError::not_found("inventory slot", line.slot_id))?;

            let item = OrderItemRecord {
                id: OrderItemId::new(),
                order_id: order.id,
                product_id: line.product_id,
                size: slot.size,
                quantity: line.quantity,
                amount: pricing.charge(line.unit_price, line.quantity),
                status: OrderItemStatus::Active,
                created_at: now,
                updated_at: now,
            };
            tx.insert_order_item(&item).await?;

            let seed = TrackingStage::Processed;
            let tracking = TrackingRecord {
                id: TrackingId::new(),
                order_item_id: item.id,
                stage: seed.as_i16(),
                created_at: now,
                updated_at: now,
            };
            tx.insert_tracking_record(&tracking).await?;
            tx.append_tracking_event(&seed.event(tracking.id, now))
                .await?;
        }

        // Row locks on inventory slots are always taken in slot id order.
        let mut decrements: Vec<_> = lines.iter().map(|l| (l.slot_id, l.quantity)).collect();
        decrements.sort_by_key(|(slot_id, _)| *slot_id);
        for (slot_id, quantity) in decrements {
            let remaining = tx.decrement_inventory(slot_id, quantity).await?;
            tracing::debug!(%slot_id, remaining, "inventory decremented");
        }

        tx.delete_cart(cart.id).await?;
        tx.commit().await?;

        Ok(order.id)
    }

    /// Lists the buyer's own order items with the given status.
    #[tracing::instrument(skip(self))]
    pub async fn get_user_orders(
        &self,
        buyer_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderListing>> {
        let views = self.store.buyer_order_items(buyer_id, status).await?;
        Ok(self.listings(views))
    }

    /// Lists order items with the given status for products the merchant
    /// owns.
    #[tracing::instrument(skip(self))]
    pub async fn get_merchant_orders(
        &self,
        merchant_id: UserId,
        status: OrderItemStatus,
    ) -> Result<Vec<OrderListing>> {
        let views = self.store.merchant_order_items(merchant_id, status).await?;
        Ok(self.listings(views))
    }

    fn listings(&self, views: Vec<OrderItemView>) -> Vec<OrderListing> {
        views
            .into_iter()
            .map(|view| OrderListing {
                image_url: view
                    .image_key
                    .as_deref()
                    .map(|key| self.signer.sign(key, self.image_url_ttl)),
                order_item_id: view.order_item_id,
                order_id: view.order_id,
                product_id: view.product_id,
                product_name: view.product_name,
                size: view.size,
                quantity: view.quantity,
                amount: view.amount,
                status: view.status,
                ordered_at: view.ordered_at,
            })
            .collect()
    }
}
