//! Order lookup
//!
//! Served from the cache only; the store is never consulted on the read path.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use shared::Order;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/orders/{order_uid}", get(get_order))
}

/// GET /orders/{order_uid}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> ApiResult<Json<Order>> {
    match state.cache.get(&order_uid) {
        Some(order) => Ok(Json(Order::clone(&order))),
        None => {
            tracing::debug!(order_uid = %order_uid, "Order not in cache");
            Err(ApiError::OrderNotFound(order_uid))
        }
    }
}
