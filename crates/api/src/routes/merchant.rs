//! Merchant order listing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use order_store::Store;

use super::{AppState, OrderItemResponse, StatusQuery};
use crate::error::ApiError;
use crate::identity::{Caller, Role};

/// GET /merchant/orders?status= — order items for the caller's products.
#[tracing::instrument(skip(state, caller))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderItemResponse>>, ApiError> {
    let merchant_id = caller.require(Role::Merchant)?;
    let status = query.status()?;

    let listings = state
        .order_service
        .get_merchant_orders(merchant_id, status)
        .await?;

    Ok(Json(listings.into_iter().map(Into::into).collect()))
}
