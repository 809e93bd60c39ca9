//! Buyer order endpoints: checkout, listing and COD eligibility.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{AddressId, CartId, PaymentMode, PromoId};
use domain::{PlaceOrder, PlacementOutcome};
use order_store::Store;
use serde::{Deserialize, Serialize};

use super::{AppState, OrderItemResponse, StatusQuery, parse_id};
use crate::error::ApiError;
use crate::identity::{Caller, Role};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub address_id: String,
    pub cart_id: String,
    pub promo_id: Option<String>,
    pub payment_mode: PaymentMode,
    pub transaction_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub status: bool,
    pub order_id: String,
}

#[derive(Serialize)]
pub struct OrderRejectedResponse {
    pub status: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct CodEligibilityResponse {
    pub eligible: bool,
}

// -- Handlers --

/// POST /orders — convert the caller's cart into an order.
///
/// A placed order answers 201. A policy rejection is not an error and
/// answers 200 with `status: false`.
#[tracing::instrument(skip(state, caller, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let buyer_id = caller.require(Role::Buyer)?;
    let address_id: AddressId = parse_id(&req.address_id, "address_id")?;
    let cart_id: CartId = parse_id(&req.cart_id, "cart_id")?;

    let mut cmd = PlaceOrder::new(buyer_id, address_id, cart_id, req.payment_mode);
    if let Some(raw) = req.promo_id.as_deref() {
        cmd = cmd.with_promo(parse_id::<PromoId>(raw, "promo_id")?);
    }
    if let Some(transaction_id) = req.transaction_id {
        cmd = cmd.with_transaction_id(transaction_id);
    }

    let response = match state.order_service.create_order(cmd).await? {
        PlacementOutcome::Placed { order_id } => (
            StatusCode::CREATED,
            Json(OrderCreatedResponse {
                status: true,
                order_id: order_id.to_string(),
            }),
        )
            .into_response(),
        PlacementOutcome::Rejected { reason } => (
            StatusCode::OK,
            Json(OrderRejectedResponse {
                status: false,
                message: reason,
            }),
        )
            .into_response(),
    };

    Ok(response)
}

/// GET /orders?status= — the caller's own order items.
#[tracing::instrument(skip(state, caller))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderItemResponse>>, ApiError> {
    let buyer_id = caller.require(Role::Buyer)?;
    let status = query.status()?;

    let listings = state
        .order_service
        .get_user_orders(buyer_id, status)
        .await?;

    Ok(Json(listings.into_iter().map(Into::into).collect()))
}

/// GET /orders/cod-eligibility — whether the caller may pay cash on delivery.
#[tracing::instrument(skip(state, caller))]
pub async fn cod_eligibility<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CodEligibilityResponse>, ApiError> {
    let buyer_id = caller.require(Role::Buyer)?;
    let eligible = state.order_service.is_cod_eligible(buyer_id).await?;
    Ok(Json(CodEligibilityResponse { eligible }))
}
