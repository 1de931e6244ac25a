//! Submission confirmation.
//!
//! ## Routes
//!
//! - `GET /form-success` - Show the ticket of the caller's latest submission

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;

use crate::server::AppState;
use crate::session::{SESSION_COOKIE, cookie_value, expired_session_cookie};

/// Creates confirmation routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/form-success", get(form_success))
}

/// Renders the confirmation once, then forgets it.
///
/// Without a live session the caller is sent back to the order form.
pub async fn form_success(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(view) = cookie_value(&headers, SESSION_COOKIE).and_then(|id| state.sessions.take(id))
    else {
        return Redirect::to("/").into_response();
    };

    (
        StatusCode::OK,
        [(header::SET_COOKIE, expired_session_cookie())],
        format!(
            "Thank you! Your order has been received.\nForm ID: {}\nCoffee: {}\n",
            view.form_id, view.category
        ),
    )
        .into_response()
}
