//! Manual merge.
//!
//! ## Routes
//!
//! - `GET /combine` - Rewrite the combined sheet now

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tally_queue::TriggerSource;

use crate::error::ApiResult;
use crate::server::AppState;

/// Body returned after a successful manual merge.
pub const COMBINED_MESSAGE: &str = "Combined data processed successfully";

/// Creates manual merge routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/combine", get(combine))
}

/// Runs one merge regardless of whether the secondary sheet has data.
pub async fn combine(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.desk.trigger().run_once(TriggerSource::Manual).await?;
    Ok(COMBINED_MESSAGE)
}
