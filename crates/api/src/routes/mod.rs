//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod merchant;
pub mod metrics;
pub mod orders;
pub mod tracking;

use chrono::{DateTime, Utc};
use common::OrderItemStatus;
use domain::{
    CartService, FulfillmentError, OrderListing, OrderService, StoreCatalog, TrackingService,
};
use order_store::Store;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub order_service: OrderService<S>,
    pub tracking_service: TrackingService<S>,
    pub cart_service: CartService<S, StoreCatalog<S>>,
}

/// `?status=` filter of the order listings. Defaults to `Active`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    pub fn status(&self) -> Result<OrderItemStatus, ApiError> {
        match self.status.as_deref() {
            None => Ok(OrderItemStatus::Active),
            Some(raw) => raw
                .parse::<OrderItemStatus>()
                .map_err(|e| FulfillmentError::from(e).into()),
        }
    }
}

pub(crate) fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}

/// Shape shared by the buyer and merchant order listings.
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub order_item_id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub size: f64,
    pub quantity: u32,
    pub amount_cents: i64,
    pub status: String,
    pub ordered_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

impl From<OrderListing> for OrderItemResponse {
    fn from(listing: OrderListing) -> Self {
        Self {
            order_item_id: listing.order_item_id.to_string(),
            order_id: listing.order_id.to_string(),
            product_id: listing.product_id.to_string(),
            product_name: listing.product_name,
            size: listing.size,
            quantity: listing.quantity,
            amount_cents: listing.amount.cents(),
            status: listing.status.to_string(),
            ordered_at: listing.ordered_at,
            image_url: listing.image_url,
        }
    }
}
