//! HTTP API for order-service

pub mod error;
pub mod health;
pub mod orders;

pub use error::{ApiError, ApiResult};

use std::path::Path;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the combined router.
///
/// Paths not matched by an API route fall through to files under
/// `static_dir`.
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
