//! HTTP route handlers.

pub mod combine;
pub mod orders;
pub mod success;

use std::sync::Arc;

use axum::Router;

use crate::server::AppState;

/// Combine and confirmation routes; these run under the request timeout.
pub fn queue_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(combine::routes())
        .merge(success::routes())
}

/// Order submission route.
///
/// Kept outside the request timeout: once a ticket is written the response
/// must carry it, and the follow-up merge is bounded by the desk instead.
pub fn submission_routes() -> Router<Arc<AppState>> {
    orders::routes()
}
