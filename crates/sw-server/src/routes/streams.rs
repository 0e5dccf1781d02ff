//! Channel status and control route handlers.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde::Deserialize;
use sw_core::ChannelStatus;

use super::{parse_body, ActionResponse};
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Request body for starting a stream.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct StartRequest {
    /// Identifier of the upstream content to relay.
    #[serde(default)]
    pub external_id: Option<String>,
    /// Display title; defaults to `Channel <n>`.
    #[serde(default)]
    pub title: Option<String>,
}

/// GET /api/streams
#[utoipa::path(
    get,
    path = "/api/streams",
    responses(
        (status = 200, description = "Status of every channel", body = BTreeMap<String, ChannelStatus>)
    )
)]
pub async fn list_streams(State(ctx): State<AppContext>) -> Json<BTreeMap<String, ChannelStatus>> {
    Json(ctx.state.all())
}

/// GET /api/streams/{channel}
#[utoipa::path(
    get,
    path = "/api/streams/{channel}",
    params(("channel" = String, Path, description = "Channel name")),
    responses(
        (status = 200, description = "Channel status", body = ChannelStatus),
        (status = 400, description = "Unknown channel")
    )
)]
pub async fn get_stream(
    State(ctx): State<AppContext>,
    Path(channel): Path<String>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<ChannelStatus>, AppError> {
    let status = ctx
        .state
        .resolve(&channel)
        .and_then(|id| ctx.state.get(&id))
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))?;
    Ok(Json(status))
}

/// POST /api/streams/{channel}/start
#[utoipa::path(
    post,
    path = "/api/streams/{channel}/start",
    params(("channel" = String, Path, description = "Channel name")),
    request_body = StartRequest,
    responses(
        (status = 200, description = "Stream started", body = ActionResponse),
        (status = 400, description = "Unknown channel or missing external_id"),
        (status = 500, description = "Worker could not be spawned")
    )
)]
pub async fn start_stream(
    State(ctx): State<AppContext>,
    Path(channel): Path<String>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ActionResponse>, AppError> {
    let with_id = |e: sw_core::Error| AppError::new(e).with_request_id(request_id.0.clone());

    let channel = ctx.state.resolve(&channel).map_err(with_id)?;
    let request: StartRequest = parse_body(&body).map_err(with_id)?;
    let external_id = request
        .external_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| with_id(sw_core::Error::MissingParameter("external_id".into())))?;

    let message = ctx
        .supervisor
        .assign(&channel, &external_id, request.title)
        .await
        .map_err(with_id)?;
    Ok(Json(ActionResponse::ok(message)))
}

/// POST /api/streams/{channel}/stop
#[utoipa::path(
    post,
    path = "/api/streams/{channel}/stop",
    params(("channel" = String, Path, description = "Channel name")),
    responses(
        (status = 200, description = "Stream stopped or was not running", body = ActionResponse),
        (status = 400, description = "Unknown channel")
    )
)]
pub async fn stop_stream(
    State(ctx): State<AppContext>,
    Path(channel): Path<String>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<ActionResponse>, AppError> {
    let with_id = |e: sw_core::Error| AppError::new(e).with_request_id(request_id.0.clone());

    let channel = ctx.state.resolve(&channel).map_err(with_id)?;
    let outcome = ctx.supervisor.stop(&channel).await.map_err(with_id)?;
    Ok(Json(ActionResponse::ok(outcome.message(&channel))))
}
