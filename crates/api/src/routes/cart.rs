//! Cart intake endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::ProductId;
use domain::AddToCart;
use order_store::Store;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::identity::{Caller, Role};

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub size: f64,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: String,
    pub total_cents: i64,
}

/// POST /cart/items — add a product line to the caller's cart.
#[tracing::instrument(skip(state, caller, req))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    let buyer_id = caller.require(Role::Buyer)?;
    let product_id: ProductId = parse_id(&req.product_id, "product_id")?;

    let cart = state
        .cart_service
        .add_to_cart(AddToCart::new(buyer_id, product_id, req.size, req.quantity))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CartResponse {
            cart_id: cart.id.to_string(),
            total_cents: cart.total.cents(),
        }),
    ))
}
