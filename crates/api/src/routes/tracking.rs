//! Order item tracking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::OrderItemId;
use domain::{TrackingStage, TrackingStep};
use futures_util::TryStreamExt;
use order_store::Store;
use serde::Serialize;

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::identity::{Caller, Role};

#[derive(Serialize)]
pub struct AdvanceResponse {
    pub order_item_id: String,
    pub stage: i16,
    pub title: &'static str,
}

#[derive(Serialize)]
pub struct TrackingEventResponse {
    pub stage: i16,
    pub title: String,
    pub summary: String,
    pub time: DateTime<Utc>,
}

impl From<TrackingStep> for TrackingEventResponse {
    fn from(step: TrackingStep) -> Self {
        Self {
            stage: step.stage.as_i16(),
            title: step.title,
            summary: step.summary,
            time: step.time,
        }
    }
}

#[derive(Serialize)]
pub struct TrackingHistoryResponse {
    pub order_item_id: String,
    pub events: Vec<TrackingEventResponse>,
}

/// POST /order-items/{id}/advance — move tracking one stage forward.
#[tracing::instrument(skip(state, caller))]
pub async fn advance<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let merchant_id = caller.require(Role::Merchant)?;
    let order_item_id: OrderItemId = parse_id(&id, "order item id")?;

    let stage: TrackingStage = state
        .tracking_service
        .advance_tracking(order_item_id, merchant_id)
        .await?;

    Ok(Json(AdvanceResponse {
        order_item_id: order_item_id.to_string(),
        stage: stage.as_i16(),
        title: stage.title(),
    }))
}

/// GET /order-items/{id}/tracking — tracking history, oldest first.
#[tracing::instrument(skip(state, _caller))]
pub async fn history<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<TrackingHistoryResponse>, ApiError> {
    let order_item_id: OrderItemId = parse_id(&id, "order item id")?;

    let events: Vec<TrackingEventResponse> = state
        .tracking_service
        .tracking_history(order_item_id)
        .await?
        .map_ok(TrackingEventResponse::from)
        .try_collect()
        .await?;

    Ok(Json(TrackingHistoryResponse {
        order_item_id: order_item_id.to_string(),
        events,
    }))
}
