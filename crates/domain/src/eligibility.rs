//! Cash-on-delivery eligibility.

use common::UserId;
use order_store::Store;

use crate::error::Result;

/// Default number of prior orders a buyer must exceed before COD is offered.
pub const DEFAULT_COD_MIN_PRIOR_ORDERS: u64 = 2;

/// Decides whether a buyer may pay cash on delivery.
///
/// A buyer qualifies once their historical order count is strictly greater
/// than the threshold. Every order counts, whatever the state of its items.
#[derive(Debug, Clone)]
pub struct EligibilityGate<S: Store> {
    store: S,
    min_prior_orders: u64,
}

impl<S: Store> EligibilityGate<S> {
    /// Creates a gate with the default threshold.
    pub fn new(store: S) -> Self {
        Self::with_threshold(store, DEFAULT_COD_MIN_PRIOR_ORDERS)
    }

    /// Creates a gate that requires more than `min_prior_orders` orders.
    pub fn with_threshold(store: S, min_prior_orders: u64) -> Self {
        Self {
            store,
            min_prior_orders,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.min_prior_orders
    }

    /// Returns true if the buyer may choose cash on delivery.
    ///
    /// A failed lookup is an error, never an implicit yes.
    #[tracing::instrument(skip(self))]
    pub async fn is_cod_eligible(&self, buyer_id: UserId) -> Result<bool> {
        let prior_orders = self.store.count_orders_for_buyer(buyer_id).await?;
        let eligible = prior_orders > self.min_prior_orders;
        tracing::debug!(prior_orders, eligible, "evaluated COD eligibility");
        Ok(eligible)
    }
}
