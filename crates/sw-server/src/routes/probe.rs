//! Source probing route handler.

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use serde::Deserialize;
use sw_core::ProbeResult;

use super::parse_body;
use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Request body for probing a source.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct ProbeRequest {
    #[serde(default)]
    pub external_id: Option<String>,
}

/// POST /api/probe
#[utoipa::path(
    post,
    path = "/api/probe",
    request_body = ProbeRequest,
    responses(
        (status = 200, description = "Codec composition of the source", body = ProbeResult),
        (status = 400, description = "Missing external_id"),
        (status = 502, description = "Source unavailable after retries")
    )
)]
pub async fn probe_stream(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Json<ProbeResult>, AppError> {
    let with_id = |e: sw_core::Error| AppError::new(e).with_request_id(request_id.0.clone());

    let request: ProbeRequest = parse_body(&body).map_err(with_id)?;
    let external_id = request
        .external_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| with_id(sw_core::Error::MissingParameter("external_id".into())))?;

    let result = ctx.prober.probe(&external_id).await.map_err(with_id)?;
    Ok(Json(result))
}
