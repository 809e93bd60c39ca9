//! Tracking service: merchant-driven stage advancement and history reads.

use std::pin::Pin;

use chrono::{DateTime, Utc};
use common::{OrderItemId, OrderItemStatus, UserId};
use futures_core::Stream;
use futures_util::StreamExt;
use order_store::{Store, StoreTx};
use serde::Serialize;

use crate::error::{FulfillmentError, Result};

use super::{InvalidStage, TrackingStage};

impl From<InvalidStage> for FulfillmentError {
    fn from(err: InvalidStage) -> Self {
        tracing::error!(error = %err, "stored tracking stage out of range");
        FulfillmentError::Internal
    }
}

/// One entry of an order item's tracking history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingStep {
    pub stage: TrackingStage,
    pub title: String,
    pub summary: String,
    pub time: DateTime<Utc>,
}

/// Tracking history, oldest first.
pub type TrackingHistory = Pin<Box<dyn Stream<Item = Result<TrackingStep>> + Send>>;

/// Service for advancing and reading shipment tracking.
pub struct TrackingService<S: Store> {
    store: S,
}

impl<S: Store> TrackingService<S> {
    /// Creates a new tracking service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Moves an order item's tracking one stage forward on behalf of the
    /// merchant owning its product, and returns the new stage.
    ///
    /// Reaching `Arrived` also completes the order item. The stage update,
    /// the history entry and the completion commit together; concurrent
    /// advances of the same item are serialized on the tracking row.
    ///
    /// Items of other merchants are reported as not found. Advancing past
    /// `Arrived`, or advancing a cancelled item, is a conflict.
    #[tracing::instrument(skip(self))]
    pub async fn advance_tracking(
        &self,
        order_item_id: OrderItemId,
        merchant_id: UserId,
    ) -> Result<TrackingStage> {
        let owner = self.store.order_item_merchant(order_item_id).await?;
        if owner != Some(merchant_id) {
            return Err(FulfillmentError::not_found("order item", order_item_id));
        }

        let item = self
            .store
            .order_item(order_item_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("order item", order_item_id))?;
        if item.status == OrderItemStatus::Cancelled {
            return Err(FulfillmentError::conflict(format!(
                "order item {order_item_id} is cancelled"
            )));
        }

        let mut tx = self.store.begin().await?;
        let record = tx
            .lock_tracking_record(order_item_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("tracking record", order_item_id))?;

        let current = TrackingStage::try_from(record.stage)?;
        let Some(next) = current.next() else {
            return Err(FulfillmentError::conflict(format!(
                "order item {order_item_id} has already arrived"
            )));
        };

        let now = Utc::now();
        tx.update_tracking_stage(record.id, next.as_i16(), now)
            .await?;
        tx.append_tracking_event(&next.event(record.id, now))
            .await?;
        if next.is_terminal() {
            tx.update_order_item_status(order_item_id, OrderItemStatus::Completed, now)
                .await?;
        }
        tx.commit().await?;

        metrics::counter!("tracking_advanced_total", "stage" => next.as_str()).increment(1);
        tracing::info!(from = %current, to = %next, "tracking advanced");

        Ok(next)
    }

    /// Streams an order item's tracking history, oldest first.
    ///
    /// The stream is finite. Calling again starts a fresh read from the
    /// first event.
    #[tracing::instrument(skip(self))]
    pub async fn tracking_history(&self, order_item_id: OrderItemId) -> Result<TrackingHistory> {
        let events = self.store.stream_tracking_events(order_item_id).await?;

        let steps = events.map(|event| -> Result<TrackingStep> {
            let event = event?;
            Ok(TrackingStep {
                stage: TrackingStage::try_from(event.stage)?,
                title: event.title,
                summary: event.summary,
                time: event.created_at,
            })
        });

        Ok(Box::pin(steps))
    }
}
