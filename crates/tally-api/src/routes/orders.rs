//! Order submission.
//!
//! ## Routes
//!
//! - `POST /submit-form` - Record an order and return its ticket

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tally_queue::MergeOutcome;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use crate::session::{SuccessView, session_cookie};

/// Order form payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormRequest {
    /// Selected drink.
    #[serde(default)]
    pub coffee_type: Option<String>,
}

/// Successful submission response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormResponse {
    /// Always `true`.
    pub success: bool,
    /// Allocated ticket.
    pub form_id: String,
    /// Set when the order was recorded but the follow-up merge failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
}

/// Creates submission routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/submit-form", post(submit_form))
}

/// Records an order.
///
/// A missing body, a non-JSON body and a blank `coffeeType` are all
/// "invalid form data".
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitFormRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let category = match payload {
        Ok(Json(SubmitFormRequest {
            coffee_type: Some(category),
        })) if !category.trim().is_empty() => category,
        Ok(_) => {
            tracing::warn!("rejected submission without a category");
            return Err(ApiError::invalid_form());
        }
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected malformed submission");
            return Err(ApiError::invalid_form());
        }
    };

    let submission = state.desk.submit(&category).await?;
    let form_id = submission.record.ticket_id.to_string();
    tracing::info!(form_id = %form_id, category = %submission.record.category, "order submitted");

    let merge_error = match submission.merge {
        MergeOutcome::Merged { .. } => None,
        MergeOutcome::Failed { message } => Some(message),
    };

    let session_id = state.sessions.insert(SuccessView {
        form_id: form_id.clone(),
        category: submission.record.category,
    });

    let mut response = Json(SubmitFormResponse {
        success: true,
        form_id,
        merge_error,
    })
    .into_response();
    if let Some(cookie) = session_cookie(&session_id, state.sessions.ttl()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}
