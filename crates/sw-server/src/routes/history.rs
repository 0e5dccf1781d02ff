//! History ledger route handlers.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use sw_core::HistoryRecord;
use sw_store::ledger::DEFAULT_TAIL;

use super::ActionResponse;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Query parameters for listing history.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HistoryParams {
    /// Number of records to return (at most 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_TAIL
}

/// GET /api/history
#[utoipa::path(
    get,
    path = "/api/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Most recent records, newest first", body = Vec<HistoryRecord>)
    )
)]
pub async fn list_history(
    State(ctx): State<AppContext>,
    Query(params): Query<HistoryParams>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Vec<HistoryRecord>>, AppError> {
    let records = ctx
        .ledger
        .tail(params.limit.min(DEFAULT_TAIL))
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))?;
    Ok(Json(records))
}

/// POST /api/history/clear
#[utoipa::path(
    post,
    path = "/api/history/clear",
    responses(
        (status = 200, description = "Records of inactive sources removed", body = ActionResponse)
    )
)]
pub async fn clear_history(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<ActionResponse>, AppError> {
    let active = ctx.state.live_external_ids();
    let removed = ctx
        .ledger
        .clear_inactive(&active)
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))?;
    Ok(Json(ActionResponse::ok(format!(
        "History cleared, {removed} record(s) removed"
    ))))
}
